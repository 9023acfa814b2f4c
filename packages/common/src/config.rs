use crate::error::ConfigError;
use crate::files::is_project_relative;
use crate::filesystem::FileSystem;
use crate::result::ConfigResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub const CONFIG_FILENAME: &str = ".pen.config.json";

/// Flat per-editor settings object, merged over adapter defaults
pub type Settings = serde_json::Map<String, Value>;

/// Pen project file format (`.pen.config.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    /// Editors in user order; rendering re-orders them by type class
    #[serde(default)]
    pub editors: Vec<EditorEntry>,

    #[serde(default)]
    pub global_resources: GlobalResources,

    /// Per-project bare specifier → URL overrides for the CDN rewriter
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub import_overrides: BTreeMap<String, String>,

    /// Re-render and broadcast a preview after every mutation
    #[serde(default = "default_auto_run", skip_serializing_if = "is_true")]
    pub auto_run: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewOptions>,

    /// Keys this version does not know about, kept so saves round-trip
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorEntry {
    /// Adapter (dialect) id, e.g. `typescript`
    #[serde(rename = "type")]
    pub adapter: String,

    pub filename: String,

    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalResources {
    #[serde(default)]
    pub scripts: Vec<String>,

    #[serde(default)]
    pub styles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inject_dev_tools: Option<bool>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_auto_run() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

impl EditorEntry {
    pub fn new(adapter: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            filename: filename.into(),
            settings: Settings::new(),
        }
    }
}

impl ProjectConfig {
    /// Create an empty project
    pub fn default_named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            editors: Vec::new(),
            global_resources: GlobalResources::default(),
            import_overrides: BTreeMap::new(),
            auto_run: true,
            preview: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: ProjectConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load `.pen.config.json` from a project root
    pub fn load(fs: &dyn FileSystem, root: &Path) -> ConfigResult<Self> {
        let content = fs.read_to_string(&root.join(CONFIG_FILENAME))?;
        Self::from_json(&content)
    }

    pub fn save(&self, fs: &dyn FileSystem, root: &Path) -> ConfigResult<()> {
        fs.write(&root.join(CONFIG_FILENAME), &self.to_json_pretty()?)?;
        Ok(())
    }

    /// Check the structural invariants of the project file
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }
        if self.version.trim().is_empty() {
            return Err(ConfigError::MissingVersion);
        }

        let mut seen = HashSet::new();
        for (index, editor) in self.editors.iter().enumerate() {
            if editor.adapter.trim().is_empty() {
                return Err(ConfigError::MissingEditorType { index });
            }
            if editor.filename.trim().is_empty() {
                return Err(ConfigError::MissingEditorFilename { index });
            }
            if !is_project_relative(&editor.filename) {
                return Err(ConfigError::FilenameOutsideProject(editor.filename.clone()));
            }
            if !seen.insert(editor.filename.as_str()) {
                return Err(ConfigError::DuplicateFilename(editor.filename.clone()));
            }
        }
        Ok(())
    }

    pub fn editor(&self, filename: &str) -> Option<&EditorEntry> {
        self.editors.iter().find(|e| e.filename == filename)
    }

    pub fn editor_mut(&mut self, filename: &str) -> Option<&mut EditorEntry> {
        self.editors.iter_mut().find(|e| e.filename == filename)
    }

    /// Shallow-merge a JSON object over this config (top-level keys replace)
    pub fn merge_json(&mut self, patch: &Value) -> ConfigResult<()> {
        let Value::Object(patch) = patch else {
            return Err(ConfigError::InvalidPatch);
        };

        let mut current = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => return Err(ConfigError::InvalidPatch),
        };
        for (key, value) in patch {
            current.insert(key.clone(), value.clone());
        }

        let merged: ProjectConfig = serde_json::from_value(Value::Object(current))?;
        merged.validate()?;
        *self = merged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MockFileSystem;
    use serde_json::json;

    const SAMPLE: &str = r#"{
        "name": "demo",
        "version": "1.0.0",
        "editors": [
            { "type": "html", "filename": "index.html", "settings": {} },
            { "type": "typescript", "filename": "script.ts", "settings": { "target": "ES2022" } }
        ],
        "globalResources": { "scripts": ["https://cdn.example/lib.js"], "styles": [] },
        "importOverrides": { "vue": "https://example.com/vue.js" },
        "theme": "dark"
    }"#;

    #[test]
    fn test_parse_config() {
        let config = ProjectConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.name, "demo");
        assert_eq!(config.editors.len(), 2);
        assert_eq!(config.editors[1].adapter, "typescript");
        assert_eq!(config.editors[1].settings["target"], json!("ES2022"));
        assert_eq!(config.global_resources.scripts.len(), 1);
        assert_eq!(config.import_overrides["vue"], "https://example.com/vue.js");
        assert!(config.auto_run);
    }

    #[test]
    fn test_unknown_keys_round_trip() {
        let config = ProjectConfig::from_json(SAMPLE).unwrap();
        let json = config.to_json_pretty().unwrap();
        assert!(json.contains("\"theme\": \"dark\""));
        assert!(!json.contains("autoRun"));
    }

    #[test]
    fn test_duplicate_filenames_rejected() {
        let mut config = ProjectConfig::default_named("dup");
        config.editors.push(EditorEntry::new("css", "style.css"));
        config.editors.push(EditorEntry::new("sass", "style.css"));

        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateFilename(name)) if name == "style.css"
        ));
    }

    #[test]
    fn test_filenames_outside_project_rejected() {
        let mut config = ProjectConfig::default_named("x");
        config.editors.push(EditorEntry::new("markdown", "../etc/secret"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FilenameOutsideProject(name)) if name == "../etc/secret"
        ));

        let mut config = ProjectConfig::default_named("x");
        let patch = json!({ "editors": [{ "type": "css", "filename": "/etc/passwd" }] });
        assert!(config.merge_json(&patch).is_err());
        assert!(config.editors.is_empty());
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut config = ProjectConfig::default_named("x");
        config.editors.push(EditorEntry::new("", "a.js"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEditorType { index: 0 })
        ));

        let config = ProjectConfig::default_named("  ");
        assert!(matches!(config.validate(), Err(ConfigError::MissingName)));
    }

    #[test]
    fn test_merge_json_patch() {
        let mut config = ProjectConfig::from_json(SAMPLE).unwrap();
        config
            .merge_json(&json!({ "name": "renamed", "autoRun": false }))
            .unwrap();

        assert_eq!(config.name, "renamed");
        assert!(!config.auto_run);
        assert_eq!(config.editors.len(), 2);

        assert!(config.merge_json(&json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_load_and_save() {
        let fs = MockFileSystem::new();
        let root = Path::new("/project");
        fs.add_file(root.join(CONFIG_FILENAME), SAMPLE);

        let mut config = ProjectConfig::load(&fs, root).unwrap();
        config.name = "saved".to_string();
        config.save(&fs, root).unwrap();

        let reloaded = ProjectConfig::load(&fs, root).unwrap();
        assert_eq!(reloaded.name, "saved");
        assert_eq!(reloaded, config);
    }
}
