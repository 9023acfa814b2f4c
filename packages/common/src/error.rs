use thiserror::Error;

/// Errors raised while loading, validating or persisting a project file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config must have a name")]
    MissingName,

    #[error("Config must have a version")]
    MissingVersion,

    #[error("Editor #{index} must have a type")]
    MissingEditorType { index: usize },

    #[error("Editor #{index} must have a filename")]
    MissingEditorFilename { index: usize },

    #[error("Editor filename must stay inside the project: {0}")]
    FilenameOutsideProject(String),

    #[error("Duplicate editor filename: {0}")]
    DuplicateFilename(String),

    #[error("Config patch must be a JSON object")]
    InvalidPatch,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}
