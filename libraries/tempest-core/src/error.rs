/// Core error types for Tempest
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type shared by every sample source
#[derive(Error, Debug)]
pub enum CoreError {
    /// Decoding failed while reading samples
    #[error("Decode error: {0}")]
    Decode(String),

    /// Seek target could not be reached
    #[error("Seek error: {0}")]
    Seek(String),

    /// The source format cannot be handled by this stage
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Track loading/unloading failed
    #[error("Track error: {0}")]
    Track(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a seek error
    pub fn seek(msg: impl Into<String>) -> Self {
        Self::Seek(msg.into())
    }

    /// Create a track error
    pub fn track(msg: impl Into<String>) -> Self {
        Self::Track(msg.into())
    }
}
