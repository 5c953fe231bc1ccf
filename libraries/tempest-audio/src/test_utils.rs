//! Test utilities
//!
//! Synthetic sources and WAV fixtures for exercising pipelines and engines
//! without real media files or audio hardware.

use std::f32::consts::PI;
use std::path::Path;
use tempest_core::{AudioFormat, SampleRate, WaveSource};

/// Seekable stereo sine tone of fixed length
#[derive(Debug, Clone)]
pub struct ToneSource {
    format: AudioFormat,
    frequency: f32,
    amplitude: f32,
    length: u64,
    position: u64,
}

impl ToneSource {
    /// Tone at `sample_rate` lasting `duration_secs`
    pub fn new(sample_rate: u32, frequency: f32, duration_secs: f64) -> Self {
        Self {
            format: AudioFormat::stereo_float(SampleRate::new(sample_rate)),
            frequency,
            amplitude: 0.5,
            length: (f64::from(sample_rate) * duration_secs).round() as u64,
            position: 0,
        }
    }

    /// Change the peak amplitude
    #[must_use]
    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }
}

impl WaveSource for ToneSource {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> tempest_core::Result<usize> {
        let remaining = self.length.saturating_sub(self.position) as usize;
        let frames = (buffer.len() / 2).min(remaining);
        let rate = self.format.sample_rate.as_hz() as f32;

        for (i, frame) in buffer[..frames * 2].chunks_exact_mut(2).enumerate() {
            let t = (self.position + i as u64) as f32 / rate;
            let s = (2.0 * PI * self.frequency * t).sin() * self.amplitude;
            frame[0] = s;
            frame[1] = s;
        }

        self.position += frames as u64;
        Ok(frames * 2)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn set_position(&mut self, frame: u64) -> tempest_core::Result<()> {
        self.position = frame.min(self.length);
        Ok(())
    }
}

/// Write a 16-bit PCM sine WAV file
pub fn write_wav(
    path: &Path,
    sample_rate: u32,
    channels: u16,
    duration_secs: f32,
    frequency: f32,
) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    let frames = (sample_rate as f32 * duration_secs) as u32;
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let s = ((2.0 * PI * frequency * t).sin() * 0.5 * f32::from(i16::MAX)) as i16;
        for _ in 0..channels {
            writer.write_sample(s)?;
        }
    }
    writer.finalize()
}

/// Read a source to the end, returning every sample
pub fn drain(source: &mut dyn WaveSource) -> tempest_core::Result<Vec<f32>> {
    let mut all = Vec::new();
    let mut buffer = vec![0.0; 4096];
    loop {
        let read = source.read(&mut buffer)?;
        if read == 0 {
            return Ok(all);
        }
        all.extend_from_slice(&buffer[..read]);
    }
}
