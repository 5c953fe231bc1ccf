/// Final bit-depth conversion stage
///
/// Samples stay `f32` on the wire, but are quantized to the grid of the
/// requested integer depth so the sink hears exactly what a fixed-point
/// stream of that depth would carry. 32 bits means float passthrough.
use crate::error::{AudioError, Result};
use tempest_core::{AudioFormat, WaveSource};

/// Quantizes its inner source to 8, 16, 24 or 32 (float) bits
pub struct BitDepthStage {
    inner: Box<dyn WaveSource>,
    bits: u16,
    /// Largest positive integer code, 0 for float passthrough
    full_scale: f32,
}

impl BitDepthStage {
    /// # Errors
    /// `UnsupportedFormat` for any depth other than 8, 16, 24 or 32
    pub fn new(inner: Box<dyn WaveSource>, bits: u16) -> Result<Self> {
        let full_scale = match bits {
            8 => 127.0,
            16 => 32_767.0,
            24 => 8_388_607.0,
            32 => 0.0,
            other => {
                return Err(AudioError::UnsupportedFormat(format!(
                    "{} bits per sample",
                    other
                )))
            }
        };
        Ok(Self {
            inner,
            bits,
            full_scale,
        })
    }
}

impl WaveSource for BitDepthStage {
    fn format(&self) -> AudioFormat {
        self.inner.format().with_bits_per_sample(self.bits)
    }

    fn read(&mut self, buffer: &mut [f32]) -> tempest_core::Result<usize> {
        let read = self.inner.read(buffer)?;
        if self.full_scale > 0.0 {
            let scale = self.full_scale;
            for sample in &mut buffer[..read] {
                *sample = (sample.clamp(-1.0, 1.0) * scale).round() / scale;
            }
        }
        Ok(read)
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn length(&self) -> u64 {
        self.inner.length()
    }

    fn set_position(&mut self, frame: u64) -> tempest_core::Result<()> {
        self.inner.set_position(frame)
    }
}
