use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type AdapterResult<T> = Result<T, AdapterError>;
pub type RegistryResult<T> = Result<T, RegistryError>;

/// A dialect compiler rejected the source of one editor
///
/// `line` and `column` are 1-based when present.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    pub adapter_id: String,
    pub filename: String,
    pub title: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl CompileError {
    pub fn new(
        adapter_id: impl Into<String>,
        filename: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            adapter_id: adapter_id.into(),
            filename: filename.into(),
            title: "Compilation Error".to_string(),
            line: None,
            column: None,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Position from a byte offset into `source`
    pub fn at_offset(self, source: &str, offset: usize) -> Self {
        let (line, column) = pen_sourcemap::offset_to_position(source, offset);
        self.at(line, column)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// The beautifier could not make sense of the source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot format {filename}: {message}")]
pub struct FormatError {
    pub adapter_id: String,
    pub filename: String,
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl FormatError {
    pub fn new(
        adapter_id: impl Into<String>,
        filename: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            filename: filename.into(),
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub fn at_offset(mut self, source: &str, offset: usize) -> Self {
        let (line, column) = pen_sourcemap::offset_to_position(source, offset);
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Adapter '{adapter_id}' does not support {operation}")]
    Unsupported {
        adapter_id: String,
        operation: String,
    },
}

impl AdapterError {
    pub fn unsupported(adapter_id: &str, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            adapter_id: adapter_id.to_string(),
            operation: operation.into(),
        }
    }

    /// Short error class name shown to users
    pub fn name(&self) -> &'static str {
        match self {
            Self::Compile(_) => "CompileError",
            Self::Format(_) => "FormatError",
            Self::Unsupported { .. } => "UnsupportedOperation",
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Compile(e) => Some(&e.filename),
            Self::Format(e) => Some(&e.filename),
            Self::Unsupported { .. } => None,
        }
    }

    /// 1-based (line, column), when the compiler reported one
    pub fn position(&self) -> (Option<u32>, Option<u32>) {
        match self {
            Self::Compile(e) => (e.line, e.column),
            Self::Format(e) => (e.line, e.column),
            Self::Unsupported { .. } => (None, None),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown adapter: {0}")]
    UnknownAdapter(String),
}
