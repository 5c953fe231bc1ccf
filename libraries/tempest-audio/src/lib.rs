//! Tempest Audio
//!
//! Decoding, sample rate conversion, equalization and analysis stages that
//! make up a playback pipeline.
//!
//! This crate provides:
//! - Streaming decoding via Symphonia (MP3, FLAC, OGG, WAV, AAC)
//! - High-quality resampling via rubato
//! - A 10-band graphic equalizer adjustable while playing
//! - Notification taps for position updates and spectrum feeds
//! - An FFT `SampleAnalyzer` for visualizers
//! - `PipelineBuilder`, which stacks all of the above
//!
//! # Example: Building a pipeline
//!
//! ```rust,no_run
//! use tempest_audio::{PipelineBuilder, PipelineHooks, PipelineOptions};
//! use std::path::Path;
//!
//! # fn example() -> tempest_audio::Result<()> {
//! let builder = PipelineBuilder::new(PipelineOptions::default());
//! let pipeline = builder.build(Path::new("/music/song.flac"), PipelineHooks::default())?;
//!
//! // Boost the 1 kHz band while the source plays elsewhere
//! pipeline.handle.equalizer.set_band_gain(5, 6.0);
//! println!("Output rate: {} Hz", pipeline.handle.format.sample_rate.as_hz());
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
mod convert;
mod decoder;
pub mod effects;
mod error;
pub mod notify;
pub mod pipeline;
pub mod resampling;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use analyzer::{AnalyzerHandle, SampleAnalyzer, DEFAULT_FFT_SIZE};
pub use convert::BitDepthStage;
pub use decoder::SymphoniaSource;
pub use effects::{EqualizerHandle, EqualizerSettings};
pub use error::{AudioError, Result};
pub use notify::{NotifyGate, SampleObserver};
pub use pipeline::{
    Pipeline, PipelineBuilder, PipelineHandle, PipelineHooks, PipelineOptions, PlaybackPosition,
    RatePolicy,
};
pub use resampling::{ResampleStage, ResamplingQuality};
