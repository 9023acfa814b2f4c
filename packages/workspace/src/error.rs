use pen_adapters::{AdapterError, RegistryError};
use pen_common::ConfigError;
use pen_compiler::RenderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to watch project: {0}")]
    Watch(#[from] notify::Error),

    #[error("Invalid filename: {0}")]
    InvalidPath(String),

    #[error("No editor for file: {0}")]
    UnknownFile(String),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Templates are not available in this session")]
    NoTemplates,
}

pub type SessionResult<T> = Result<T, SessionError>;
