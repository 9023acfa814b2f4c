//! Starter projects for `start-template`
//!
//! A template directory holds one sub-directory per template, each with a
//! `.pen.config.json` carrying a `template` block and the editors' files:
//!
//! ```text
//! templates/
//!   react/
//!     .pen.config.json   { "name": ..., "template": { "title": "React" }, "editors": [...] }
//!     index.html
//!     app.jsx
//! ```

use crate::error::{SessionError, SessionResult};
use pen_common::{load_file_map, FileMap, FileSystem, ProjectConfig, CONFIG_FILENAME};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Listing entry for template pickers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    /// Adapter ids of the template's editors
    pub editors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectTemplate {
    pub summary: TemplateSummary,
    /// Config with the `template` block removed
    pub config: ProjectConfig,
    pub files: FileMap,
}

pub trait TemplateProvider: Send + Sync {
    fn list(&self) -> SessionResult<Vec<TemplateSummary>>;

    fn load(&self, id: &str) -> SessionResult<ProjectTemplate>;
}

/// Templates read from a directory on disk
pub struct DirTemplateProvider {
    dir: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl DirTemplateProvider {
    pub fn new(dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self { dir: dir.into(), fs }
    }

    fn ids(&self) -> SessionResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            if self.fs.exists(&entry.path().join(CONFIG_FILENAME)) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl TemplateProvider for DirTemplateProvider {
    fn list(&self) -> SessionResult<Vec<TemplateSummary>> {
        let mut summaries = Vec::new();
        for id in self.ids()? {
            match self.load(&id) {
                Ok(template) => summaries.push(template.summary),
                Err(e) => tracing::warn!(template = %id, error = %e, "Skipping unreadable template"),
            }
        }
        Ok(summaries)
    }

    fn load(&self, id: &str) -> SessionResult<ProjectTemplate> {
        if id.is_empty() || id.contains(&['/', '\\'][..]) || id.starts_with('.') {
            return Err(SessionError::UnknownTemplate(id.to_string()));
        }
        let dir = self.dir.join(id);
        let config_path = dir.join(CONFIG_FILENAME);
        if !self.fs.exists(&config_path) {
            return Err(SessionError::UnknownTemplate(id.to_string()));
        }

        let mut config = ProjectConfig::from_json(&self.fs.read_to_string(&config_path)?)?;
        let Some(meta) = config.extra.remove("template") else {
            return Err(SessionError::UnknownTemplate(id.to_string()));
        };

        let text = |key: &str| meta.get(key).and_then(Value::as_str).map(str::to_string);
        let icon = self.fs.read_to_string(&dir.join("icon.svg")).unwrap_or_default();
        let files = load_file_map(self.fs.as_ref(), &dir, &config);

        Ok(ProjectTemplate {
            summary: TemplateSummary {
                id: id.to_string(),
                title: text("title").unwrap_or_else(|| id.to_string()),
                description: text("description").unwrap_or_default(),
                icon,
                editors: config.editors.iter().map(|e| e.adapter.clone()).collect(),
            },
            config,
            files,
        })
    }
}
