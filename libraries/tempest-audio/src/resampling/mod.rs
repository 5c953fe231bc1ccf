//! Sample rate conversion stage
//!
//! Wraps a `WaveSource` and converts it to a target rate using rubato.
//! Positions reported by the stage are in output frames; seeks are mapped
//! back to the input rate and reset the resampler's filter state.

mod rubato_backend;

pub use rubato_backend::RubatoResampler;

use crate::error::{AudioError, Result};
use std::collections::VecDeque;
use tempest_core::{AudioFormat, SampleRate, WaveSource};

/// Frames pulled from the inner source per refill
const READ_CHUNK_FRAMES: usize = 1024;

/// Resampling quality presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResamplingQuality {
    /// Polynomial interpolation, lowest CPU
    Fast,

    /// Sinc, 128 taps, 95% passband
    #[default]
    Balanced,

    /// Sinc, 256 taps, 99% passband
    High,

    /// Sinc, 512 taps, 99.5% passband
    Maximum,
}

/// Pipeline stage converting its inner source to `output_rate`
pub struct ResampleStage {
    inner: Box<dyn WaveSource>,
    resampler: RubatoResampler,
    format: AudioFormat,
    input_rate: u32,
    output: VecDeque<f32>,
    scratch: Vec<f32>,
    input_finished: bool,
    position: u64,
}

impl ResampleStage {
    /// Wrap `inner`, converting to `output_rate`
    ///
    /// # Errors
    /// Returns `Resample` if the rates or channel count are unusable
    pub fn new(
        inner: Box<dyn WaveSource>,
        output_rate: u32,
        quality: ResamplingQuality,
    ) -> Result<Self> {
        let in_format = inner.format();
        let input_rate = in_format.sample_rate.as_hz();
        if input_rate == 0 || output_rate == 0 {
            return Err(AudioError::Resample(format!(
                "Invalid rate conversion {} -> {}",
                input_rate, output_rate
            )));
        }

        let channels = in_format.channel_count();
        let resampler = RubatoResampler::new(input_rate, output_rate, channels, quality)?;
        let position = scale(inner.position(), input_rate, output_rate);

        tracing::debug!(input_rate, output_rate, ?quality, "Resampler inserted");

        Ok(Self {
            inner,
            resampler,
            format: in_format.with_sample_rate(SampleRate::new(output_rate)),
            input_rate,
            output: VecDeque::new(),
            scratch: vec![0.0; READ_CHUNK_FRAMES * channels],
            input_finished: false,
            position,
        })
    }

    fn refill(&mut self) -> Result<()> {
        let read = self.inner.read(&mut self.scratch)?;
        if read == 0 {
            self.output.extend(self.resampler.flush()?);
            self.input_finished = true;
        } else {
            self.output.extend(self.resampler.process(&self.scratch[..read])?);
        }
        Ok(())
    }
}

impl WaveSource for ResampleStage {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> tempest_core::Result<usize> {
        let channels = self.format.channel_count();
        let wanted = buffer.len() - buffer.len() % channels;

        while self.output.len() < wanted && !self.input_finished {
            self.refill()?;
        }

        let count = self.output.len().min(wanted);
        let count = count - count % channels;
        for (dst, src) in buffer[..count].iter_mut().zip(self.output.drain(..count)) {
            *dst = src;
        }

        self.position += (count / channels) as u64;
        Ok(count)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> u64 {
        scale(
            self.inner.length(),
            self.input_rate,
            self.format.sample_rate.as_hz(),
        )
    }

    fn set_position(&mut self, frame: u64) -> tempest_core::Result<()> {
        let output_rate = self.format.sample_rate.as_hz();
        self.inner
            .set_position(scale(frame, output_rate, self.input_rate))?;
        self.resampler.reset();
        self.output.clear();
        self.input_finished = false;
        self.position = scale(self.inner.position(), self.input_rate, output_rate);
        Ok(())
    }
}

fn scale(frames: u64, from_rate: u32, to_rate: u32) -> u64 {
    if from_rate == to_rate || from_rate == 0 {
        return frames;
    }
    ((u128::from(frames) * u128::from(to_rate)) / u128::from(from_rate)) as u64
}
