/// Audio-specific errors
use tempest_core::CoreError;
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio error types
#[derive(Error, Debug)]
pub enum AudioError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoding error (unreadable or corrupt stream)
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Seek error
    #[error("Seek error: {0}")]
    SeekError(String),

    /// Resampler construction or processing failed
    #[error("Resampling error: {0}")]
    Resample(String),

    /// FFT length is not a usable power of two
    #[error("Invalid FFT size: {0} (must be a power of two >= 64)")]
    InvalidFftSize(usize),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<AudioError> for CoreError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::SeekError(msg) => CoreError::Seek(msg),
            AudioError::UnsupportedFormat(msg) => CoreError::UnsupportedFormat(msg),
            AudioError::Io(e) => CoreError::Io(e),
            other => CoreError::Decode(other.to_string()),
        }
    }
}

impl From<CoreError> for AudioError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Seek(msg) => AudioError::SeekError(msg),
            CoreError::UnsupportedFormat(msg) => AudioError::UnsupportedFormat(msg),
            CoreError::Io(e) => AudioError::Io(e),
            other => AudioError::DecodeError(other.to_string()),
        }
    }
}
