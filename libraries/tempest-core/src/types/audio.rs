/// Audio-related types
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleRate(pub u32);

impl SampleRate {
    /// Common sample rates
    pub const CD_QUALITY: Self = Self(44_100);
    pub const DVD_QUALITY: Self = Self(48_000);

    /// Create a new sample rate
    #[must_use]
    pub fn new(hz: u32) -> Self {
        Self(hz)
    }

    /// Get the sample rate as Hz
    pub fn as_hz(&self) -> u32 {
        self.0
    }
}

/// Audio format information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate
    pub sample_rate: SampleRate,

    /// Number of channels (1 = mono, 2 = stereo, etc.)
    pub channels: u16,

    /// Bits per sample the stream is quantized to
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// Create a new audio format
    pub fn new(sample_rate: SampleRate, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Stereo float format at the given rate
    pub fn stereo_float(sample_rate: SampleRate) -> Self {
        Self::new(sample_rate, 2, 32)
    }

    /// Copy of this format with a different sample rate
    #[must_use]
    pub fn with_sample_rate(self, sample_rate: SampleRate) -> Self {
        Self {
            sample_rate,
            ..self
        }
    }

    /// Copy of this format with a different bit depth
    #[must_use]
    pub fn with_bits_per_sample(self, bits_per_sample: u16) -> Self {
        Self {
            bits_per_sample,
            ..self
        }
    }

    /// Number of interleaved samples in one frame
    pub fn channel_count(&self) -> usize {
        usize::from(self.channels.max(1))
    }

    /// Convert a frame count to seconds
    pub fn frames_to_secs(&self, frames: u64) -> f64 {
        let rate = self.sample_rate.as_hz();
        if rate == 0 {
            return 0.0;
        }
        frames as f64 / f64::from(rate)
    }

    /// Convert a frame count to a `Duration`
    pub fn frames_to_duration(&self, frames: u64) -> Duration {
        Duration::from_secs_f64(self.frames_to_secs(frames))
    }

    /// Convert a `Duration` to the nearest frame
    pub fn duration_to_frames(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * f64::from(self.sample_rate.as_hz())).round() as u64
    }
}
