//! Tempest Core
//!
//! Platform-agnostic building blocks shared by the Tempest playback crates.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Audio Types**: `SampleRate`, `AudioFormat`
//! - **Core Traits**: `WaveSource` (pull-based sample streams), `Track`
//! - **Shared State**: `SharedVolume`, the lock-free gain cell read by output sinks
//! - **Error Handling**: Unified `CoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use tempest_core::{AudioFormat, SampleRate, SharedVolume};
//!
//! let format = AudioFormat::new(SampleRate::CD_QUALITY, 2, 16);
//! assert_eq!(format.frames_to_secs(44_100), 1.0);
//!
//! let volume = SharedVolume::new(0.5);
//! volume.set(1.7);
//! assert_eq!(volume.get(), 1.0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;
pub mod volume;

pub use error::{CoreError, Result};
pub use traits::{Track, WaveSource};
pub use types::{AudioFormat, FileTrack, SampleRate};
pub use volume::SharedVolume;
