use crate::error::ConfigError;

/// Result type for project configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
