use pen_adapters::{AdapterError, CompileError, RegistryError};
use pen_sourcemap::SourceMapError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Invalid rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    SourceMap(#[from] SourceMapError),
}

impl RenderError {
    /// Compile failure details when an adapter rejected its source
    pub fn compile_error(&self) -> Option<&CompileError> {
        match self {
            RenderError::Adapter(AdapterError::Compile(err)) => Some(err),
            _ => None,
        }
    }
}

impl From<CompileError> for RenderError {
    fn from(err: CompileError) -> Self {
        RenderError::Adapter(AdapterError::Compile(err))
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
