//! Rubato resampler backend
//!
//! Buffers interleaved input until a full chunk is available, deinterleaves,
//! runs rubato and trims the filter delay so output stays time-aligned.

use super::ResamplingQuality;
use crate::error::{AudioError, Result};
use rubato::{
    FastFixedIn, PolynomialDegree, Resampler as _, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use std::collections::VecDeque;

enum Engine {
    Fast(FastFixedIn<f32>),
    Sinc(SincFixedIn<f32>),
}

/// Interleaved-in, interleaved-out wrapper around rubato's fixed-input resamplers
pub struct RubatoResampler {
    engine: Engine,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    input_buffer: VecDeque<f32>,
    /// Output frames still to drop for filter delay
    delay_remaining: usize,
    frames_in: u64,
    frames_out: u64,
}

impl RubatoResampler {
    /// Create a new rubato resampler
    pub fn new(
        input_rate: u32,
        output_rate: u32,
        channels: usize,
        quality: ResamplingQuality,
    ) -> Result<Self> {
        if channels == 0 || channels > 8 {
            return Err(AudioError::Resample(format!(
                "Invalid channel count: {}",
                channels
            )));
        }

        let ratio = f64::from(output_rate) / f64::from(input_rate);
        let chunk_size = match quality {
            ResamplingQuality::Fast | ResamplingQuality::Balanced => 1024,
            ResamplingQuality::High => 2048,
            ResamplingQuality::Maximum => 4096,
        };

        let engine = match quality {
            ResamplingQuality::Fast => Engine::Fast(
                FastFixedIn::new(ratio, 1.0, PolynomialDegree::Cubic, chunk_size, channels)
                    .map_err(|e| {
                        AudioError::Resample(format!("FastFixedIn creation failed: {}", e))
                    })?,
            ),
            _ => Engine::Sinc(
                SincFixedIn::<f32>::new(
                    ratio,
                    1.0,
                    Self::quality_to_params(quality),
                    chunk_size,
                    channels,
                )
                .map_err(|e| AudioError::Resample(format!("SincFixedIn creation failed: {}", e)))?,
            ),
        };

        let mut resampler = Self {
            engine,
            input_rate,
            output_rate,
            channels,
            input_buffer: VecDeque::new(),
            delay_remaining: 0,
            frames_in: 0,
            frames_out: 0,
        };
        resampler.delay_remaining = resampler.output_delay();
        Ok(resampler)
    }

    fn quality_to_params(quality: ResamplingQuality) -> SincInterpolationParameters {
        let (sinc_len, f_cutoff, oversampling_factor, window) = match quality {
            ResamplingQuality::Fast => (64, 0.9, 128, WindowFunction::Blackman),
            ResamplingQuality::Balanced => (128, 0.95, 256, WindowFunction::BlackmanHarris),
            ResamplingQuality::High => (256, 0.99, 512, WindowFunction::BlackmanHarris),
            ResamplingQuality::Maximum => (512, 0.995, 1024, WindowFunction::BlackmanHarris2),
        };
        SincInterpolationParameters {
            sinc_len,
            f_cutoff,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor,
            window,
        }
    }

    /// Input rate in Hz
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Output rate in Hz
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    fn input_frames_next(&self) -> usize {
        match &self.engine {
            Engine::Fast(r) => r.input_frames_next(),
            Engine::Sinc(r) => r.input_frames_next(),
        }
    }

    /// Filter latency in output frames
    pub fn output_delay(&self) -> usize {
        match &self.engine {
            Engine::Fast(r) => r.output_delay(),
            Engine::Sinc(r) => r.output_delay(),
        }
    }

    /// Resample interleaved input, returning whatever output is ready
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() % self.channels != 0 {
            return Err(AudioError::Resample(format!(
                "Input buffer size {} is not a multiple of channel count {}",
                input.len(),
                self.channels
            )));
        }
        if self.input_rate == self.output_rate {
            return Ok(input.to_vec());
        }

        self.frames_in += (input.len() / self.channels) as u64;
        self.input_buffer.extend(input.iter().copied());

        let mut output = Vec::new();
        loop {
            let needed_frames = self.input_frames_next();
            let needed_samples = needed_frames * self.channels;
            if self.input_buffer.len() < needed_samples {
                break;
            }

            let chunk: Vec<f32> = self.input_buffer.drain(..needed_samples).collect();
            let planar = self.deinterleave(&chunk);
            let produced = match &mut self.engine {
                Engine::Fast(r) => r.process(&planar, None),
                Engine::Sinc(r) => r.process(&planar, None),
            }
            .map_err(|e| AudioError::Resample(e.to_string()))?;
            self.emit(&produced, &mut output);
        }

        Ok(output)
    }

    /// Drain buffered input and the filter tail at end of stream
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        if self.input_rate == self.output_rate {
            return Ok(self.input_buffer.drain(..).collect());
        }

        let mut output = Vec::new();
        let remaining: Vec<f32> = self.input_buffer.drain(..).collect();
        if !remaining.is_empty() {
            let planar = self.deinterleave(&remaining);
            let produced = match &mut self.engine {
                Engine::Fast(r) => r.process_partial(Some(planar.as_slice()), None),
                Engine::Sinc(r) => r.process_partial(Some(planar.as_slice()), None),
            }
            .map_err(|e| AudioError::Resample(e.to_string()))?;
            self.emit(&produced, &mut output);
        }

        let expected =
            (self.frames_in as f64 * f64::from(self.output_rate) / f64::from(self.input_rate))
                .round() as u64;
        while self.frames_out < expected {
            let before = self.frames_out;
            let produced = match &mut self.engine {
                Engine::Fast(r) => r.process_partial(None::<&[Vec<f32>]>, None),
                Engine::Sinc(r) => r.process_partial(None::<&[Vec<f32>]>, None),
            }
            .map_err(|e| AudioError::Resample(e.to_string()))?;
            self.emit(&produced, &mut output);
            if self.frames_out == before {
                break;
            }
        }

        // Partial chunks are zero padded; drop anything past the true end
        if self.frames_out > expected {
            let excess = (self.frames_out - expected) as usize * self.channels;
            output.truncate(output.len().saturating_sub(excess));
            self.frames_out = expected;
        }

        Ok(output)
    }

    /// Clear buffered input and filter state
    pub fn reset(&mut self) {
        match &mut self.engine {
            Engine::Fast(r) => r.reset(),
            Engine::Sinc(r) => r.reset(),
        }
        self.input_buffer.clear();
        self.delay_remaining = self.output_delay();
        self.frames_in = 0;
        self.frames_out = 0;
    }

    fn deinterleave(&self, interleaved: &[f32]) -> Vec<Vec<f32>> {
        let frames = interleaved.len() / self.channels;
        let mut planar = vec![Vec::with_capacity(frames); self.channels];
        for frame in interleaved.chunks_exact(self.channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                planar[ch].push(sample);
            }
        }
        planar
    }

    fn emit(&mut self, planar: &[Vec<f32>], output: &mut Vec<f32>) {
        let frames = planar.first().map_or(0, Vec::len);
        let skip = self.delay_remaining.min(frames);
        self.delay_remaining -= skip;

        output.reserve((frames - skip) * self.channels);
        for i in skip..frames {
            for channel in planar {
                output.push(channel[i]);
            }
        }
        self.frames_out += (frames - skip) as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let v = (i as f32 * 0.01).sin() * 0.5;
                [v, v]
            })
            .collect()
    }

    #[test]
    fn output_length_follows_ratio() {
        let mut resampler =
            RubatoResampler::new(22_050, 44_100, 2, ResamplingQuality::Balanced).unwrap();
        let input = ramp(22_050);

        let mut output = Vec::new();
        for chunk in input.chunks(1000) {
            output.extend(resampler.process(chunk).unwrap());
        }
        output.extend(resampler.flush().unwrap());

        assert_eq!(output.len() / 2, 44_100);
    }

    #[test]
    fn equal_rates_pass_through() {
        let mut resampler =
            RubatoResampler::new(44_100, 44_100, 2, ResamplingQuality::Fast).unwrap();
        let input = ramp(100);
        assert_eq!(resampler.process(&input).unwrap(), input);
    }

    #[test]
    fn rejects_partial_frames() {
        let mut resampler =
            RubatoResampler::new(44_100, 48_000, 2, ResamplingQuality::High).unwrap();
        assert!(resampler.process(&[0.0; 3]).is_err());
    }

    #[test]
    fn rejects_zero_channels() {
        assert!(RubatoResampler::new(44_100, 48_000, 0, ResamplingQuality::Fast).is_err());
    }
}
