use thiserror::Error;

/// Result type for asset loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors produced while reading splat clouds, models and textures.
///
/// Loading failures are never fatal to the renderer: callers log them and
/// carry on with whatever did load.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("missing required property `{0}`")]
    MissingProperty(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
}

impl LoadError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        LoadError::Parse {
            line,
            message: message.into(),
        }
    }
}
