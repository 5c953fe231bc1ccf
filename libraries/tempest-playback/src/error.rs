//! Error types for the playback engine

use tempest_audio::AudioError;
use thiserror::Error;

/// Errors raised while selecting or driving an output device
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The configured device no longer exists
    #[error("Output device not found: {0}")]
    DeviceNotFound(String),

    /// The requested output backend is not usable on this system
    #[error("Output backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Listing devices failed
    #[error("Device enumeration failed: {0}")]
    Enumeration(String),

    /// Building or controlling the output stream failed
    #[error("Failed to build output stream: {0}")]
    StreamBuild(String),
}

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The track could not be decoded; callers should skip to the next one
    #[error("Decode error: {0}")]
    Decode(#[from] AudioError),

    /// Output device failure
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// No output sink exists (device initialization failed earlier)
    #[error("No output sink available")]
    NoSink,

    /// Settings cannot be applied
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// The control thread has shut down
    #[error("Control thread is gone")]
    ControlThreadGone,
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
