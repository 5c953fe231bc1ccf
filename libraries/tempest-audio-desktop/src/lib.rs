//! Desktop audio output for Tempest using CPAL
//!
//! This crate implements the `tempest-playback` output seams on top of CPAL
//! and packages the engine into a ready-to-use runtime.
//!
//! # Features
//!
//! - Two output modes on the platform host: low latency (fixed buffer sized
//!   from the latency setting) and compatibility (driver defaults)
//! - Device enumeration and lookup by name
//! - `CpalSink`: one audio thread per sink, any common device sample format,
//!   conversion to the device rate
//! - Following the system default device by polling
//! - `DesktopEngine`: the playback engine on its own control thread
//!
//! # Example
//!
//! ```no_run
//! use tempest_audio_desktop::DesktopEngine;
//! use tempest_playback::{EngineCommand, EngineEvent, EngineSettings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DesktopEngine::spawn(EngineSettings::default())?;
//! engine.open_file("/music/song.flac")?;
//! engine.send(EngineCommand::Play)?;
//!
//! for event in engine.events() {
//!     if event == EngineEvent::TrackFinished {
//!         break;
//!     }
//! }
//! engine.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod device;
mod error;
mod output;
mod platform;
mod runtime;
pub mod watcher;

pub use error::{DesktopError, Result};
pub use output::{map_channels, CpalSink};
pub use platform::CpalDevices;
pub use runtime::DesktopEngine;
pub use watcher::DefaultDeviceWatcher;
