//! Engine settings
//!
//! Owned by the application; the engine receives a copy at construction and
//! whenever the user changes something (`apply_settings`).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tempest_audio::{PipelineOptions, RatePolicy, ResamplingQuality};

/// Device id meaning "follow the system default endpoint"
pub const SYSTEM_DEFAULT_DEVICE_ID: &str = "-0";

/// Output backend flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Fixed small buffer sized from `latency_ms`
    #[default]
    LowLatency,
    /// Driver default buffer and stream configuration
    Compatibility,
}

impl OutputMode {
    /// Human-readable backend name
    pub fn display_name(&self) -> &'static str {
        match self {
            OutputMode::LowLatency => "Low latency",
            OutputMode::Compatibility => "Compatibility",
        }
    }
}

/// Settings read by the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// -1 = upgrade sources below 44.1 kHz, 0 = native rate, >0 = forced rate
    pub sample_rate: i32,
    /// Bit depth handed to the sink (8, 16, 24 or 32 for float)
    pub wave_source_bits: u16,
    pub sound_out_mode: OutputMode,
    /// Backend device id, or "-0" for the system default
    pub sound_out_device_id: String,
    pub latency_ms: u32,
    pub crossfade_enabled: bool,
    pub crossfade_duration_secs: u32,
    /// Play/pause fade length
    pub fade_duration_ms: u32,
    /// Interval between fader volume writes
    pub fade_tick_ms: u32,
    /// Milliseconds of audio between position updates
    pub block_notify_interval: u32,
    /// Spectrum analyzer FFT length (power of two)
    pub fft_size: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sample_rate: -1,
            wave_source_bits: 16,
            sound_out_mode: OutputMode::LowLatency,
            sound_out_device_id: SYSTEM_DEFAULT_DEVICE_ID.to_string(),
            latency_ms: 100,
            crossfade_enabled: false,
            crossfade_duration_secs: 4,
            fade_duration_ms: 500,
            fade_tick_ms: 50,
            block_notify_interval: 100,
            fft_size: 4096,
        }
    }
}

impl EngineSettings {
    /// Whether the configured device is "system default"
    pub fn uses_system_default(&self) -> bool {
        self.sound_out_device_id == SYSTEM_DEFAULT_DEVICE_ID
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.fade_duration_ms))
    }

    pub fn fade_tick(&self) -> Duration {
        Duration::from_millis(u64::from(self.fade_tick_ms.max(1)))
    }

    /// Options for building playback pipelines
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            rate: RatePolicy::from_setting(self.sample_rate),
            bits_per_sample: self.wave_source_bits,
            block_interval_ms: self.block_notify_interval.max(1),
            quality: ResamplingQuality::Balanced,
        }
    }

    /// Whether switching from `self` to `other` requires a new sink
    pub fn device_differs(&self, other: &Self) -> bool {
        self.sound_out_mode != other.sound_out_mode
            || self.sound_out_device_id != other.sound_out_device_id
            || self.latency_ms != other.latency_ms
    }

    /// Whether switching from `self` to `other` requires rebuilding the pipeline
    pub fn pipeline_differs(&self, other: &Self) -> bool {
        self.sample_rate != other.sample_rate
            || self.wave_source_bits != other.wave_source_bits
            || self.block_notify_interval != other.block_notify_interval
    }
}
