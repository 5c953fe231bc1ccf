/// 10-band graphic equalizer
///
/// Octave-spaced peaking filters at the ISO center frequencies. Gains live in
/// an `EqualizerHandle` so the control thread can move sliders while the
/// audio thread processes; the processor picks up changes at the next block.
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tempest_core::{AudioFormat, WaveSource};

/// Number of equalizer bands
pub const BAND_COUNT: usize = 10;

/// ISO standard 10-band center frequencies (Hz)
pub const ISO_10_BAND_FREQUENCIES: [f32; BAND_COUNT] = [
    31.5, 63.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Maximum boost/cut per band
pub const MAX_GAIN_DB: f32 = 20.0;

/// Q for one-octave bandwidth
const OCTAVE_Q: f32 = 1.41;

#[derive(Debug, Clone)]
struct BiquadBand {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    // State (stereo)
    x1_l: f32,
    x2_l: f32,
    y1_l: f32,
    y2_l: f32,
    x1_r: f32,
    x2_r: f32,
    y1_r: f32,
    y2_r: f32,

    frequency: f32,
    gain_db: f32,
}

impl BiquadBand {
    fn new(frequency: f32) -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x1_l: 0.0,
            x2_l: 0.0,
            y1_l: 0.0,
            y2_l: 0.0,
            x1_r: 0.0,
            x2_r: 0.0,
            y1_r: 0.0,
            y2_r: 0.0,
            frequency,
            gain_db: 0.0,
        }
    }

    fn update_coefficients(&mut self, sample_rate: f32) {
        if sample_rate < 1.0 || self.gain_db.abs() < 0.01 {
            self.b0 = 1.0;
            self.b1 = 0.0;
            self.b2 = 0.0;
            self.a1 = 0.0;
            self.a2 = 0.0;
            return;
        }

        let a = 10.0_f32.powf(self.gain_db / 40.0);
        // Keep the band below Nyquist for low source rates
        let freq = self.frequency.min(sample_rate * 0.45);
        let omega = 2.0 * PI * freq / sample_rate;
        let (sin_omega, cos_omega) = omega.sin_cos();
        let alpha = sin_omega / (2.0 * OCTAVE_Q);

        let a0 = 1.0 + alpha / a;
        self.b0 = (1.0 + alpha * a) / a0;
        self.b1 = (-2.0 * cos_omega) / a0;
        self.b2 = (1.0 - alpha * a) / a0;
        self.a1 = (-2.0 * cos_omega) / a0;
        self.a2 = (1.0 - alpha / a) / a0;
    }

    #[inline]
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let mut out_l = self.b0 * left + self.b1 * self.x1_l + self.b2 * self.x2_l
            - self.a1 * self.y1_l
            - self.a2 * self.y2_l;
        if out_l.abs() < 1e-15 {
            out_l = 0.0;
        }
        self.x2_l = self.x1_l;
        self.x1_l = left;
        self.y2_l = self.y1_l;
        self.y1_l = out_l;

        let mut out_r = self.b0 * right + self.b1 * self.x1_r + self.b2 * self.x2_r
            - self.a1 * self.y1_r
            - self.a2 * self.y2_r;
        if out_r.abs() < 1e-15 {
            out_r = 0.0;
        }
        self.x2_r = self.x1_r;
        self.x1_r = right;
        self.y2_r = self.y1_r;
        self.y1_r = out_r;

        (out_l, out_r)
    }

    fn reset(&mut self) {
        self.x1_l = 0.0;
        self.x2_l = 0.0;
        self.y1_l = 0.0;
        self.y2_l = 0.0;
        self.x1_r = 0.0;
        self.x2_r = 0.0;
        self.y1_r = 0.0;
        self.y2_r = 0.0;
    }
}

#[derive(Debug)]
struct SharedGains {
    gains: [AtomicU32; BAND_COUNT],
    dirty: AtomicBool,
}

/// Thread-safe handle to a live equalizer's band gains
#[derive(Debug, Clone)]
pub struct EqualizerHandle {
    shared: Arc<SharedGains>,
}

impl EqualizerHandle {
    /// New handle with all bands flat
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SharedGains {
                gains: std::array::from_fn(|_| AtomicU32::new(0.0_f32.to_bits())),
                dirty: AtomicBool::new(false),
            }),
        }
    }

    /// Set one band's gain in dB (clamped to ±20 dB)
    ///
    /// Out-of-range indices are ignored.
    pub fn set_band_gain(&self, index: usize, gain_db: f32) {
        if let Some(slot) = self.shared.gains.get(index) {
            let gain = if gain_db.is_nan() {
                0.0
            } else {
                gain_db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB)
            };
            slot.store(gain.to_bits(), Ordering::Relaxed);
            self.shared.dirty.store(true, Ordering::Release);
        }
    }

    /// Set all band gains at once
    pub fn set_gains(&self, gains: &[f32; BAND_COUNT]) {
        for (index, gain) in gains.iter().enumerate() {
            self.set_band_gain(index, *gain);
        }
    }

    /// Current gain of one band
    pub fn band_gain(&self, index: usize) -> Option<f32> {
        self.shared
            .gains
            .get(index)
            .map(|slot| f32::from_bits(slot.load(Ordering::Relaxed)))
    }

    /// Snapshot of every band gain
    pub fn gains(&self) -> [f32; BAND_COUNT] {
        std::array::from_fn(|i| f32::from_bits(self.shared.gains[i].load(Ordering::Relaxed)))
    }

    fn take_dirty(&self) -> bool {
        self.shared.dirty.swap(false, Ordering::AcqRel)
    }
}

impl Default for EqualizerHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Stereo 10-band equalizer processor
pub struct GraphicEq {
    bands: Vec<BiquadBand>,
    sample_rate: u32,
    handle: EqualizerHandle,
}

impl GraphicEq {
    /// Create an equalizer driven by `handle`
    pub fn new(sample_rate: u32, handle: EqualizerHandle) -> Self {
        let mut eq = Self {
            bands: ISO_10_BAND_FREQUENCIES
                .iter()
                .map(|&f| BiquadBand::new(f))
                .collect(),
            sample_rate,
            handle,
        };
        eq.sync_gains();
        eq
    }

    /// Handle controlling this equalizer
    pub fn handle(&self) -> &EqualizerHandle {
        &self.handle
    }

    fn sync_gains(&mut self) {
        let gains = self.handle.gains();
        let sr = self.sample_rate as f32;
        for (band, gain) in self.bands.iter_mut().zip(gains) {
            band.gain_db = gain;
            band.update_coefficients(sr);
        }
    }

    /// Process an interleaved stereo buffer in place
    pub fn process(&mut self, buffer: &mut [f32]) {
        if self.handle.take_dirty() {
            self.sync_gains();
        }

        for chunk in buffer.chunks_exact_mut(2) {
            let (mut left, mut right) = (chunk[0], chunk[1]);
            for band in &mut self.bands {
                (left, right) = band.process(left, right);
            }
            chunk[0] = left;
            chunk[1] = right;
        }
    }

    /// Clear filter history (after seeking)
    pub fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
    }
}

/// Equalizer stage of a playback pipeline
pub struct EqualizerStage {
    inner: Box<dyn WaveSource>,
    eq: GraphicEq,
}

impl EqualizerStage {
    /// Wrap `inner`; band gains follow `handle`
    pub fn new(inner: Box<dyn WaveSource>, handle: EqualizerHandle) -> Self {
        let rate = inner.format().sample_rate.as_hz();
        Self {
            inner,
            eq: GraphicEq::new(rate, handle),
        }
    }
}

impl WaveSource for EqualizerStage {
    fn format(&self) -> AudioFormat {
        self.inner.format()
    }

    fn read(&mut self, buffer: &mut [f32]) -> tempest_core::Result<usize> {
        let read = self.inner.read(buffer)?;
        if self.inner.format().channels == 2 {
            self.eq.process(&mut buffer[..read]);
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
        self.inner.set_position(frame)?;
        self.eq.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::tests::{generate_sine, rms};

    #[test]
    fn iso_frequencies_are_octaves() {
        for pair in ISO_10_BAND_FREQUENCIES.windows(2) {
            let ratio = pair[1] / pair[0];
            assert!((ratio - 2.0).abs() < 0.05, "ratio {}", ratio);
        }
    }

    #[test]
    fn handle_clamps_gain() {
        let handle = EqualizerHandle::new();
        handle.set_band_gain(0, 35.0);
        handle.set_band_gain(1, -35.0);
        handle.set_band_gain(42, 3.0);
        assert_eq!(handle.band_gain(0), Some(20.0));
        assert_eq!(handle.band_gain(1), Some(-20.0));
        assert_eq!(handle.band_gain(42), None);
    }

    #[test]
    fn flat_eq_is_transparent() {
        let mut eq = GraphicEq::new(44_100, EqualizerHandle::new());
        let input = generate_sine(1000.0, 44_100, 0.1);
        let mut buffer = input.clone();
        eq.process(&mut buffer);
        assert_eq!(buffer, input);
    }

    #[test]
    fn boost_raises_band_level() {
        let handle = EqualizerHandle::new();
        let mut eq = GraphicEq::new(44_100, handle.clone());
        let mut buffer = generate_sine(1000.0, 44_100, 0.5);
        let before = rms(&buffer);

        handle.set_band_gain(5, 12.0);
        eq.process(&mut buffer);

        // Skip the filter's settling time
        let after = rms(&buffer[buffer.len() / 2..]);
        assert!(after > before * 2.0, "before {} after {}", before, after);
    }

    #[test]
    fn changes_apply_on_next_block() {
        let handle = EqualizerHandle::new();
        let mut eq = GraphicEq::new(48_000, handle.clone());
        let mut first = generate_sine(63.0, 48_000, 0.2);
        let reference = first.clone();
        eq.process(&mut first);
        assert_eq!(first, reference);

        handle.set_band_gain(1, -20.0);
        let mut second = generate_sine(63.0, 48_000, 0.5);
        eq.process(&mut second);
        assert!(rms(&second[second.len() / 2..]) < rms(&reference) * 0.5);
    }
}
