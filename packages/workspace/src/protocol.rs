//! JSON messages exchanged with editor clients over the sync socket
//!
//! Every message is an object with a kebab-case `type` tag and camelCase
//! fields.

use crate::error::SessionError;
use pen_adapters::{AdapterError, AdapterMetadata};
use pen_common::{FileMap, ProjectConfig, Settings};
use pen_compiler::RenderError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Client → server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Update {
        filename: String,
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    Rename {
        old_filename: String,
        new_filename: String,
        new_type: String,
    },
    Delete {
        filename: String,
    },
    EditorSettings {
        filename: String,
        settings: Settings,
    },
    Format {
        filename: String,
    },
    Minify {
        filename: String,
    },
    Compile {
        filename: String,
        target: String,
    },
    Save {
        files: FileMap,
    },
    Render,
    #[serde(rename_all = "camelCase")]
    StartTemplate {
        template_id: String,
    },
    SaveConfig {
        config: Value,
    },
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Update { .. } => "update",
            ClientMessage::Rename { .. } => "rename",
            ClientMessage::Delete { .. } => "delete",
            ClientMessage::EditorSettings { .. } => "editor-settings",
            ClientMessage::Format { .. } => "format",
            ClientMessage::Minify { .. } => "minify",
            ClientMessage::Compile { .. } => "compile",
            ClientMessage::Save { .. } => "save",
            ClientMessage::Render => "render",
            ClientMessage::StartTemplate { .. } => "start-template",
            ClientMessage::SaveConfig { .. } => "save-config",
        }
    }
}

/// Server → client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Full state, sent once on connect
    #[serde(rename_all = "camelCase")]
    Init {
        config: ProjectConfig,
        root_path: String,
        files: FileMap,
        adapters: Vec<AdapterMetadata>,
    },
    UpdateAck {
        filename: String,
    },
    /// Another client changed a file
    Update {
        filename: String,
        content: String,
    },
    /// Editor list or settings changed
    SyncEditors {
        config: ProjectConfig,
        files: FileMap,
        adapters: Vec<AdapterMetadata>,
    },
    /// A file changed on disk outside the session
    ExternalUpdate {
        filename: String,
        content: String,
    },
    Preview {
        html: String,
        /// Unix milliseconds
        timestamp: i64,
    },
    ToastError(ToastError),
    /// Project replaced wholesale; clients drop local editor state
    #[serde(rename_all = "camelCase")]
    Reload {
        config: ProjectConfig,
        root_path: String,
        files: FileMap,
        adapters: Vec<AdapterMetadata>,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Init { .. } => "init",
            ServerMessage::UpdateAck { .. } => "update-ack",
            ServerMessage::Update { .. } => "update",
            ServerMessage::SyncEditors { .. } => "sync-editors",
            ServerMessage::ExternalUpdate { .. } => "external-update",
            ServerMessage::Preview { .. } => "preview",
            ServerMessage::ToastError(_) => "toast-error",
            ServerMessage::Reload { .. } => "reload",
        }
    }
}

/// Structured error shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToastError {
    pub filename: Option<String>,
    pub name: String,
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl ToastError {
    pub fn from_error(filename: Option<&str>, err: &SessionError) -> Self {
        let adapter_error = match err {
            SessionError::Adapter(e) => Some(e),
            SessionError::Render(RenderError::Adapter(e)) => Some(e),
            _ => None,
        };

        match adapter_error {
            Some(e) => {
                let mut toast = Self::from_adapter_error(e);
                if toast.filename.is_none() {
                    toast.filename = filename.map(str::to_string);
                }
                toast
            }
            None => Self {
                filename: filename.map(str::to_string),
                name: "Error".to_string(),
                message: err.to_string(),
                line: None,
                column: None,
            },
        }
    }

    pub fn from_adapter_error(err: &AdapterError) -> Self {
        let (line, column) = err.position();
        Self {
            filename: err.filename().map(str::to_string),
            name: err.name().to_string(),
            message: err.to_string(),
            line,
            column,
        }
    }
}

/// Project root for display, with the home directory shown as `~`
pub fn display_root(root: &Path) -> String {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    abbreviate_home(root, home.as_deref())
}

fn abbreviate_home(root: &Path, home: Option<&Path>) -> String {
    let relative = home
        .filter(|home| !home.as_os_str().is_empty())
        .and_then(|home| root.strip_prefix(home).ok());
    match relative {
        Some(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Some(rest) => format!("~/{}", rest.display()),
        None => root.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pen_adapters::CompileError;
    use serde_json::json;

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "rename",
            "oldFilename": "a.js",
            "newFilename": "b.ts",
            "newType": "typescript"
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Rename {
                old_filename: "a.js".into(),
                new_filename: "b.ts".into(),
                new_type: "typescript".into(),
            }
        );

        let msg: ClientMessage = serde_json::from_value(json!({ "type": "start-template", "templateId": "react" })).unwrap();
        assert_eq!(msg.kind(), "start-template");

        let msg: ClientMessage = serde_json::from_value(json!({ "type": "render" })).unwrap();
        assert_eq!(msg, ClientMessage::Render);
    }

    #[test]
    fn test_unknown_message_type_rejected() {
        assert!(serde_json::from_value::<ClientMessage>(json!({ "type": "import-folder" })).is_err());
    }

    #[test]
    fn test_toast_wire_format() {
        let err = AdapterError::from(CompileError::new("scss", "style.scss", "expected \";\"").at(3, 7));
        let msg = ServerMessage::ToastError(ToastError::from_adapter_error(&err));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "toast-error",
                "filename": "style.scss",
                "name": "CompileError",
                "message": "expected \";\"",
                "line": 3,
                "column": 7
            })
        );
    }

    #[test]
    fn test_preview_and_ack_tags() {
        let ack = serde_json::to_value(ServerMessage::UpdateAck { filename: "a".into() }).unwrap();
        assert_eq!(ack, json!({ "type": "update-ack", "filename": "a" }));

        let preview = ServerMessage::Preview {
            html: "<p></p>".into(),
            timestamp: 1,
        };
        assert_eq!(serde_json::to_value(&preview).unwrap()["type"], "preview");
        assert_eq!(preview.kind(), "preview");
    }

    #[test]
    fn test_home_prefix_matches_whole_components() {
        let home = Some(Path::new("/home/al"));
        assert_eq!(abbreviate_home(Path::new("/home/al/pens/demo"), home), "~/pens/demo");
        assert_eq!(abbreviate_home(Path::new("/home/al"), home), "~");
        assert_eq!(abbreviate_home(Path::new("/home/alice/demo"), home), "/home/alice/demo");
        assert_eq!(abbreviate_home(Path::new("/srv/demo"), None), "/srv/demo");
    }

    #[test]
    fn test_display_root_unchanged_outside_home() {
        assert_eq!(display_root(Path::new("/definitely/not/home")), "/definitely/not/home");
    }
}
