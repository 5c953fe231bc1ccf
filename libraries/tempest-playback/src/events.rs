//! Engine events
//!
//! Notifications for the UI and the surrounding application. Everything
//! observable about the engine is announced here:
//! - Track lifecycle (changed, finished, failed to open)
//! - Play/pause/stop state
//! - Position updates, driven by the pipeline's block notifications
//! - Crossfade start and completion
//! - Output devices that could not be opened

use crate::settings::EngineSettings;
use crate::sink::PlaybackState;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A new track was opened and is ready to play
    TrackChanged {
        /// File of the new track
        path: PathBuf,
    },

    /// The current track ended
    ///
    /// Emitted on natural end of stream and at the start of a crossfade,
    /// never after a manual stop. The application reacts by opening the next
    /// track.
    TrackFinished,

    /// The sink's state changed
    PlaybackStateChanged {
        state: PlaybackState,
        /// False while a pause fade-out is running
        is_playing: bool,
    },

    /// Periodic position update, whole seconds
    PositionChanged { elapsed_secs: u64, total_secs: u64 },

    /// Volume level changed (0.0 to 1.0)
    VolumeChanged { volume: f32 },

    /// A source is available for the spectrum visualizer
    StartVisualization,

    /// The engine rewrote its settings (device fallback); persist them
    SettingsChanged { settings: EngineSettings },

    /// An output device could not be opened
    ///
    /// During a crossfade the current track keeps playing on its own output
    /// and finishes normally instead.
    OutputFailed { message: String },

    /// A track could not be decoded; skip to the next one
    TrackOpenFailed { path: PathBuf, message: String },

    /// The outgoing track started fading out
    CrossfadeStarted {
        /// Fade length in seconds
        duration_secs: u64,
    },

    /// The outgoing track finished fading and was released
    CrossfadeCompleted,
}
