use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceMapError {
    #[error("Invalid source map: {0}")]
    Map(#[from] sourcemap::Error),

    #[error("Source map is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type SourceMapResult<T> = Result<T, SourceMapError>;
