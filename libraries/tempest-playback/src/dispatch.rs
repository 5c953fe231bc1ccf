//! Control thread messaging
//!
//! All engine state is mutated on a single control thread. Audio threads,
//! fade workers and device watchers never touch the engine; they post a
//! `ControlMessage` through a `Dispatcher` and the control loop handles it.

use crate::fader::FadeId;
use crate::settings::EngineSettings;
use crate::sink::SinkId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tempest_audio::EqualizerSettings;
use tempest_core::Track;

/// Requests from the application
pub enum EngineCommand {
    OpenTrack(Arc<dyn Track>),
    TogglePlayPause,
    Play,
    Pause,
    StopPlayback,
    KickTrack,
    SetVolume(f32),
    Seek(Duration),
    SetEqualizerBand { index: usize, value: f32 },
    SetEqualizer(EqualizerSettings),
    ApplySettings(EngineSettings),
    /// Recreate the sink on the configured device, keeping playback state
    UpdateSoundOut,
    Shutdown,
}

impl fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenTrack(track) => f.debug_tuple("OpenTrack").field(&track.path()).finish(),
            Self::TogglePlayPause => f.write_str("TogglePlayPause"),
            Self::Play => f.write_str("Play"),
            Self::Pause => f.write_str("Pause"),
            Self::StopPlayback => f.write_str("StopPlayback"),
            Self::KickTrack => f.write_str("KickTrack"),
            Self::SetVolume(volume) => f.debug_tuple("SetVolume").field(volume).finish(),
            Self::Seek(position) => f.debug_tuple("Seek").field(position).finish(),
            Self::SetEqualizerBand { index, value } => f
                .debug_struct("SetEqualizerBand")
                .field("index", index)
                .field("value", value)
                .finish(),
            Self::SetEqualizer(settings) => f.debug_tuple("SetEqualizer").field(settings).finish(),
            Self::ApplySettings(settings) => {
                f.debug_tuple("ApplySettings").field(settings).finish()
            }
            Self::UpdateSoundOut => f.write_str("UpdateSoundOut"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Everything the control loop reacts to
#[derive(Debug)]
pub enum ControlMessage {
    Command(EngineCommand),
    /// A pipeline's block tap fired
    BlockRead { session: u64 },
    /// A sink stopped (manually or at end of stream)
    SinkStopped { sink: SinkId },
    /// A play/pause fade ran to completion
    FadeCompleted { fade: FadeId },
    /// The crossfade-out of the outgoing sink ran to completion
    CrossfadeOutCompleted { fade: FadeId },
    /// The system default output device changed
    DefaultDeviceChanged { device_id: String },
    /// Rebuild the sink after a device change settled
    RebuildSink,
}

impl From<EngineCommand> for ControlMessage {
    fn from(command: EngineCommand) -> Self {
        Self::Command(command)
    }
}

/// Posts messages to the control thread
#[derive(Debug, Clone)]
pub struct Dispatcher {
    sender: Sender<ControlMessage>,
}

impl Dispatcher {
    /// Post a message; returns false once the control loop is gone
    pub fn post(&self, message: impl Into<ControlMessage>) -> bool {
        self.sender.send(message.into()).is_ok()
    }
}

/// Create the control channel
pub fn control_channel() -> (Dispatcher, Receiver<ControlMessage>) {
    let (sender, receiver) = unbounded();
    (Dispatcher { sender }, receiver)
}
