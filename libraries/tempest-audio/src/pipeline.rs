//! Playback pipeline construction
//!
//! A pipeline is a stack of `WaveSource` stages, each wrapping the previous:
//!
//! ```text
//! decoder -> [resampler] -> equalizer -> sample tap -> block tap -> bit depth -> position reporter
//! ```
//!
//! The assembled source is handed to an output sink and read on its audio
//! thread. Everything the control thread needs afterwards (equalizer gains,
//! position, seek requests, detaching notifications) goes through the cloneable
//! `PipelineHandle`, never through the source itself.

use crate::convert::BitDepthStage;
use crate::decoder::SymphoniaSource;
use crate::effects::{EqualizerHandle, EqualizerStage};
use crate::error::Result;
use crate::notify::{BlockCallback, BlockTap, NotifyGate, SampleObserver, SampleTap};
use crate::resampling::{ResampleStage, ResamplingQuality};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempest_core::{AudioFormat, WaveSource};

/// Sources below this rate are upgraded under `RatePolicy::Auto`
pub const AUTO_MIN_SAMPLE_RATE: u32 = 44_100;

/// Default interval between block notifications
pub const DEFAULT_BLOCK_INTERVAL_MS: u32 = 100;

/// How the pipeline picks its output sample rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatePolicy {
    /// Keep the native rate unless it is below 44.1 kHz
    Auto,
    /// Always keep the native rate
    Passthrough,
    /// Always convert to this rate
    Fixed(u32),
}

impl RatePolicy {
    /// Interpret the settings value: negative = auto, 0 = passthrough, else forced
    pub fn from_setting(value: i32) -> Self {
        match value {
            v if v < 0 => Self::Auto,
            0 => Self::Passthrough,
            v => Self::Fixed(v.unsigned_abs()),
        }
    }

    /// Output rate for a source with the given native rate
    pub fn resolve(self, native_rate: u32) -> u32 {
        match self {
            Self::Auto if native_rate < AUTO_MIN_SAMPLE_RATE => AUTO_MIN_SAMPLE_RATE,
            Self::Auto | Self::Passthrough => native_rate,
            Self::Fixed(rate) => rate,
        }
    }
}

/// Pipeline construction options
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub rate: RatePolicy,
    /// Final quantization depth (8, 16, 24 or 32 for float)
    pub bits_per_sample: u16,
    /// Milliseconds of audio between block notifications
    pub block_interval_ms: u32,
    pub quality: ResamplingQuality,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            rate: RatePolicy::Auto,
            bits_per_sample: 32,
            block_interval_ms: DEFAULT_BLOCK_INTERVAL_MS,
            quality: ResamplingQuality::default(),
        }
    }
}

/// Callbacks wired into a pipeline's taps
#[derive(Default)]
pub struct PipelineHooks {
    /// Fired every `block_interval_ms` of audio read
    pub on_block: Option<BlockCallback>,
    /// Receives every block after equalization
    pub sample_observer: Option<Arc<dyn SampleObserver>>,
}

const NO_SEEK: u64 = u64::MAX;

#[derive(Debug)]
struct PositionState {
    position: AtomicU64,
    length: AtomicU64,
    seek_request: AtomicU64,
}

/// Position and length of a pipeline, readable from any thread
///
/// Seeks requested here are applied by the audio thread on its next read;
/// the reported position jumps immediately.
#[derive(Debug, Clone)]
pub struct PlaybackPosition {
    state: Arc<PositionState>,
}

impl PlaybackPosition {
    fn new(position: u64, length: u64) -> Self {
        Self {
            state: Arc::new(PositionState {
                position: AtomicU64::new(position),
                length: AtomicU64::new(length),
                seek_request: AtomicU64::new(NO_SEEK),
            }),
        }
    }

    /// Current position in output frames
    pub fn position(&self) -> u64 {
        self.state.position.load(Ordering::Acquire)
    }

    /// Total length in output frames (0 when unknown)
    pub fn length(&self) -> u64 {
        self.state.length.load(Ordering::Acquire)
    }

    /// Ask the audio thread to seek; returns the clamped target
    pub fn request_seek(&self, frame: u64) -> u64 {
        let length = self.length();
        let target = if length > 0 { frame.min(length) } else { frame };
        self.state.seek_request.store(target, Ordering::Release);
        self.state.position.store(target, Ordering::Release);
        target
    }

    fn take_seek(&self) -> Option<u64> {
        match self.state.seek_request.swap(NO_SEEK, Ordering::AcqRel) {
            NO_SEEK => None,
            frame => Some(frame),
        }
    }

    fn publish(&self, position: u64, length: u64) {
        self.state.position.store(position, Ordering::Release);
        self.state.length.store(length, Ordering::Release);
    }
}

/// Control-side view of an assembled pipeline
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    /// Format delivered to the sink
    pub format: AudioFormat,
    /// Format produced by the decoder
    pub native_format: AudioFormat,
    pub equalizer: EqualizerHandle,
    pub position: PlaybackPosition,
    pub gate: NotifyGate,
}

impl PipelineHandle {
    /// Position as wall-clock time
    pub fn elapsed(&self) -> Duration {
        self.format.frames_to_duration(self.position.position())
    }

    /// Length as wall-clock time
    pub fn duration(&self) -> Duration {
        self.format.frames_to_duration(self.position.length())
    }

    /// Stop the taps from notifying; audio keeps flowing
    pub fn detach_notifications(&self) {
        self.gate.detach();
    }
}

/// An assembled pipeline: the source for the sink plus its control handle
pub struct Pipeline {
    pub source: Box<dyn WaveSource>,
    pub handle: PipelineHandle,
}

/// Outermost stage: applies pending seeks and publishes position
struct PositionReporter {
    inner: Box<dyn WaveSource>,
    position: PlaybackPosition,
}

impl PositionReporter {
    fn apply_pending_seek(&mut self) {
        if let Some(frame) = self.position.take_seek() {
            if let Err(e) = self.inner.set_position(frame) {
                tracing::warn!("Seek to frame {} failed: {}", frame, e);
            }
        }
    }

    fn publish(&self) {
        self.position
            .publish(self.inner.position(), self.inner.length());
    }
}

impl WaveSource for PositionReporter {
    fn format(&self) -> AudioFormat {
        self.inner.format()
    }

    fn read(&mut self, buffer: &mut [f32]) -> tempest_core::Result<usize> {
        self.apply_pending_seek();
        let read = self.inner.read(buffer)?;
        self.publish();
        Ok(read)
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn length(&self) -> u64 {
        self.inner.length()
    }

    fn set_position(&mut self, frame: u64) -> tempest_core::Result<()> {
        self.position.take_seek();
        self.inner.set_position(frame)?;
        self.publish();
        Ok(())
    }
}

/// Builds playback pipelines with fixed options
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    options: PipelineOptions,
}

impl PipelineBuilder {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Decode `path` and assemble the full chain
    ///
    /// # Errors
    /// `FileNotFound`/`DecodeError` if the file cannot be opened, `Resample`
    /// or `UnsupportedFormat` if a stage cannot be configured. Stages opened
    /// before the failure are dropped.
    pub fn build(&self, path: &Path, hooks: PipelineHooks) -> Result<Pipeline> {
        let decoder = SymphoniaSource::open(path)?;
        self.assemble(Box::new(decoder), hooks)
    }

    /// Assemble the chain on top of an already opened source
    pub fn assemble(&self, decoder: Box<dyn WaveSource>, hooks: PipelineHooks) -> Result<Pipeline> {
        let native_format = decoder.format();
        let native_rate = native_format.sample_rate.as_hz();
        let output_rate = self.options.rate.resolve(native_rate);

        let mut source: Box<dyn WaveSource> = if output_rate == native_rate {
            decoder
        } else {
            Box::new(ResampleStage::new(decoder, output_rate, self.options.quality)?)
        };

        let equalizer = EqualizerHandle::new();
        source = Box::new(EqualizerStage::new(source, equalizer.clone()));

        let gate = NotifyGate::new();
        if let Some(observer) = hooks.sample_observer {
            source = Box::new(SampleTap::new(source, observer, gate.clone()));
        }
        if let Some(callback) = hooks.on_block {
            source = Box::new(BlockTap::new(
                source,
                self.options.block_interval_ms,
                callback,
                gate.clone(),
            ));
        }

        source = Box::new(BitDepthStage::new(source, self.options.bits_per_sample)?);

        let position = PlaybackPosition::new(source.position(), source.length());
        let format = source.format();
        let source: Box<dyn WaveSource> = Box::new(PositionReporter {
            inner: source,
            position: position.clone(),
        });

        tracing::info!(
            native_rate,
            output_rate,
            bits = format.bits_per_sample,
            "Pipeline assembled"
        );

        Ok(Pipeline {
            source,
            handle: PipelineHandle {
                format,
                native_format,
                equalizer,
                position,
                gate,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_policy_from_setting() {
        assert_eq!(RatePolicy::from_setting(-1), RatePolicy::Auto);
        assert_eq!(RatePolicy::from_setting(0), RatePolicy::Passthrough);
        assert_eq!(RatePolicy::from_setting(48_000), RatePolicy::Fixed(48_000));
    }

    #[test]
    fn auto_policy_only_upgrades_low_rates() {
        assert_eq!(RatePolicy::Auto.resolve(22_050), 44_100);
        assert_eq!(RatePolicy::Auto.resolve(44_100), 44_100);
        assert_eq!(RatePolicy::Auto.resolve(96_000), 96_000);
        assert_eq!(RatePolicy::Passthrough.resolve(8_000), 8_000);
        assert_eq!(RatePolicy::Fixed(48_000).resolve(44_100), 48_000);
    }

    #[test]
    fn seek_request_clamps_to_length() {
        let position = PlaybackPosition::new(0, 1_000);
        assert_eq!(position.request_seek(5_000), 1_000);
        assert_eq!(position.position(), 1_000);
        assert_eq!(position.take_seek(), Some(1_000));
        assert_eq!(position.take_seek(), None);
    }
}
