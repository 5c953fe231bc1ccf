//! Tempest Playback
//!
//! Platform-agnostic playback engine for Tempest.
//!
//! This crate provides:
//! - `PlaybackEngine`, the play/pause/stop state machine
//! - Fade-in/fade-out on play and pause, aborting a pause mid-fade
//! - Crossfading into the next track near the end of the current one
//! - Output device listing with a "system default" entry and fallback when
//!   the configured device disappears
//! - Following the system default device while playing
//!
//! # Architecture
//!
//! `tempest-playback` does not talk to an audio API. Output devices and
//! sinks are provided through the `OutputDevices` and `OutputSink` traits
//! (see `tempest-audio-desktop` for the CPAL implementation).
//!
//! All engine state lives on one control thread. Audio threads, fade
//! workers and device watchers communicate with it by posting
//! `ControlMessage`s through a `Dispatcher`:
//!
//! ```rust,no_run
//! use tempest_playback::{control_channel, EngineCommand, EngineSettings, FileOpener, PlaybackEngine};
//! # fn example(devices: Box<dyn tempest_playback::OutputDevices>) -> tempest_playback::Result<()> {
//! let (dispatcher, receiver) = control_channel();
//! let mut engine = PlaybackEngine::new(
//!     EngineSettings::default(),
//!     devices,
//!     Box::new(FileOpener),
//!     dispatcher.clone(),
//! )?;
//! let events = engine.subscribe();
//!
//! std::thread::spawn(move || engine.run(receiver));
//! dispatcher.post(EngineCommand::SetVolume(0.8));
//! dispatcher.post(EngineCommand::Shutdown);
//! # drop(events);
//! # Ok(())
//! # }
//! ```

pub mod crossfade;
pub mod device;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod fader;
pub mod settings;
pub mod sink;

pub use crossfade::CrossfadeController;
pub use device::{
    DeviceDescriptor, DeviceGroup, DeviceManager, DeviceSelector, DeviceWatch, OutputDevices,
    SinkCreation, SinkRequest, SYSTEM_DEFAULT_DEVICE_NAME,
};
pub use dispatch::{control_channel, ControlMessage, Dispatcher, EngineCommand};
pub use engine::{
    should_begin_crossfade, FileOpener, PlaybackEngine, SourceOpener,
    CROSSFADE_MIN_REMAINDER_SECS, DEVICE_SETTLE_DELAY,
};
pub use error::{DeviceError, PlaybackError, Result};
pub use events::EngineEvent;
pub use fader::{FadeCurve, FadeId, VolumeFader};
pub use settings::{EngineSettings, OutputMode, SYSTEM_DEFAULT_DEVICE_ID};
pub use sink::{OutputSink, PlaybackState, SinkId};
