/// Desktop output errors
use tempest_playback::{DeviceError, PlaybackError};
use thiserror::Error;

/// Result type for desktop output operations
pub type Result<T> = std::result::Result<T, DesktopError>;

/// Errors raised by the CPAL layer
#[derive(Debug, Error)]
pub enum DesktopError {
    /// Device with the given name not found
    #[error("Audio device '{0}' not found")]
    DeviceNotFound(String),

    /// The host reports no output device at all
    #[error("No audio output devices found")]
    NoDevice,

    /// Host not available on this system
    #[error("Audio backend '{0}' is not available")]
    BackendUnavailable(&'static str),

    /// Failed to enumerate devices
    #[error("Failed to enumerate audio devices: {0}")]
    Enumeration(String),

    /// Failed to query a device's stream configuration
    #[error("Failed to read device configuration: {0}")]
    Config(String),

    /// Failed to build output stream
    #[error("Failed to build output stream: {0}")]
    StreamBuild(String),

    /// Failed to start the stream
    #[error("Failed to play stream: {0}")]
    Play(String),

    /// Failed to pause the stream
    #[error("Failed to pause stream: {0}")]
    Pause(String),

    /// The source cannot be rendered by this device
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The audio or control thread could not be started or has exited
    #[error("Thread error: {0}")]
    Thread(String),

    /// Engine-level failure
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

impl From<cpal::BuildStreamError> for DesktopError {
    fn from(err: cpal::BuildStreamError) -> Self {
        DesktopError::StreamBuild(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for DesktopError {
    fn from(err: cpal::PlayStreamError) -> Self {
        DesktopError::Play(err.to_string())
    }
}

impl From<cpal::PauseStreamError> for DesktopError {
    fn from(err: cpal::PauseStreamError) -> Self {
        DesktopError::Pause(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for DesktopError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        DesktopError::Config(err.to_string())
    }
}

impl From<cpal::DevicesError> for DesktopError {
    fn from(err: cpal::DevicesError) -> Self {
        DesktopError::Enumeration(err.to_string())
    }
}

impl From<DesktopError> for DeviceError {
    fn from(err: DesktopError) -> Self {
        match err {
            DesktopError::DeviceNotFound(name) => DeviceError::DeviceNotFound(name),
            DesktopError::NoDevice => {
                DeviceError::DeviceNotFound(tempest_playback::SYSTEM_DEFAULT_DEVICE_ID.to_string())
            }
            DesktopError::BackendUnavailable(name) => {
                DeviceError::BackendUnavailable(name.to_string())
            }
            DesktopError::Enumeration(msg) => DeviceError::Enumeration(msg),
            other => DeviceError::StreamBuild(other.to_string()),
        }
    }
}
