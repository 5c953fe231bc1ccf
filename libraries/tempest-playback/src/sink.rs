//! Output sink abstraction
//!
//! A sink pulls samples from a `WaveSource` on its own audio thread and
//! renders them to a device. The engine owns exactly one active sink; during
//! a crossfade the outgoing sink is handed to the crossfade controller.

use crate::error::DeviceError;
use serde::{Deserialize, Serialize};
use tempest_core::{SharedVolume, WaveSource};

/// Identifies a sink instance in control messages
pub type SinkId = u64;

/// Playback state of a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// A device output stream
///
/// Contract:
/// - `initialize` replaces the current source and leaves the sink stopped
///   without posting a stop notification
/// - `stop` posts `ControlMessage::SinkStopped` when the sink was playing or
///   paused
/// - reaching the end of the source stops the sink and posts
///   `ControlMessage::SinkStopped` once
/// - dropping the sink releases the device without posting anything
pub trait OutputSink: Send {
    /// Unique id of this sink instance
    fn id(&self) -> SinkId;

    /// Id of the device actually opened
    fn device_id(&self) -> &str;

    /// Install a new source
    ///
    /// # Errors
    /// Returns an error if the device cannot render the source's format
    fn initialize(&mut self, source: Box<dyn WaveSource>) -> Result<(), DeviceError>;

    /// Start or resume rendering
    ///
    /// # Errors
    /// Returns an error if the stream cannot be started
    fn play(&mut self) -> Result<(), DeviceError>;

    /// Pause rendering, keeping the position
    ///
    /// # Errors
    /// Returns an error if the stream cannot be paused
    fn pause(&mut self) -> Result<(), DeviceError>;

    /// Stop rendering
    ///
    /// # Errors
    /// Returns an error if the stream cannot be stopped
    fn stop(&mut self) -> Result<(), DeviceError>;

    fn state(&self) -> PlaybackState;

    /// Volume cell applied by the audio thread
    fn volume(&self) -> SharedVolume;

    /// Whether a source is installed
    fn has_source(&self) -> bool;
}
