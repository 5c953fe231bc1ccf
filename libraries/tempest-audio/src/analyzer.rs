//! Spectrum analysis for visualizers
//!
//! `SampleAnalyzer` keeps the most recent `fft_size` mono samples in a ring
//! and computes a Hann-windowed magnitude spectrum on demand. Feeding and
//! reading are decoupled: the audio thread pushes samples as blocks pass
//! through the pipeline, the UI polls `compute_fft` at its own frame rate.

use crate::error::{AudioError, Result};
use crate::notify::SampleObserver;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::{Arc, Mutex};
use tempest_core::AudioFormat;

/// Default FFT length
pub const DEFAULT_FFT_SIZE: usize = 4096;

/// Nyquist frequency assumed before any source has been opened
pub const DEFAULT_NYQUIST_HZ: f32 = 22_050.0;

/// Rolling-window FFT analyzer
pub struct SampleAnalyzer {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    ring: Vec<f32>,
    write_index: usize,
    channels: usize,
    sample_rate: Option<u32>,
    scratch: Vec<Complex<f32>>,
}

impl SampleAnalyzer {
    /// Create an analyzer with the given FFT length
    ///
    /// # Errors
    /// `InvalidFftSize` unless `fft_size` is a power of two of at least 64
    pub fn new(fft_size: usize) -> Result<Self> {
        if fft_size < 64 || !fft_size.is_power_of_two() {
            return Err(AudioError::InvalidFftSize(fft_size));
        }

        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);
        let window = (0..fft_size)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / fft_size as f32).cos())
            .collect();

        Ok(Self {
            fft_size,
            fft,
            window,
            ring: vec![0.0; fft_size],
            write_index: 0,
            channels: 2,
            sample_rate: None,
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
        })
    }

    /// FFT length
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Prepare for a new source: adopts its channel count and rate, clears history
    pub fn initialize(&mut self, format: AudioFormat) {
        self.channels = format.channel_count();
        self.sample_rate = Some(format.sample_rate.as_hz());
        self.ring.fill(0.0);
        self.write_index = 0;
    }

    /// Forget the current source; the nyquist falls back to the default
    pub fn clear(&mut self) {
        self.sample_rate = None;
        self.ring.fill(0.0);
        self.write_index = 0;
    }

    /// Push one stereo pair (mixed down to mono)
    pub fn add_samples(&mut self, left: f32, right: f32) {
        let mono = if self.channels >= 2 {
            (left + right) * 0.5
        } else {
            left
        };
        self.ring[self.write_index] = mono;
        self.write_index = (self.write_index + 1) % self.fft_size;
    }

    /// Push an interleaved block
    pub fn add_block(&mut self, samples: &[f32], channels: usize) {
        match channels {
            0 => {}
            1 => {
                for &s in samples {
                    self.add_samples(s, s);
                }
            }
            n => {
                for frame in samples.chunks_exact(n) {
                    self.add_samples(frame[0], frame[1]);
                }
            }
        }
    }

    /// Write magnitude bins of the most recent window into `output`
    ///
    /// Fills `min(output.len(), fft_size)` bins and zeroes the rest. Calling it
    /// repeatedly without new samples yields identical results.
    pub fn compute_fft(&mut self, output: &mut [f32]) {
        for i in 0..self.fft_size {
            // Oldest sample first
            let sample = self.ring[(self.write_index + i) % self.fft_size];
            self.scratch[i] = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let scale = 2.0 / self.fft_size as f32;
        let bins = output.len().min(self.fft_size);
        for (out, bin) in output[..bins].iter_mut().zip(&self.scratch) {
            *out = bin.norm() * scale;
        }
        output[bins..].fill(0.0);
    }

    /// Half the current source rate, or 22050 Hz without a source
    pub fn nyquist(&self) -> f32 {
        self.sample_rate
            .map_or(DEFAULT_NYQUIST_HZ, |rate| rate as f32 / 2.0)
    }

    /// Map a frequency to its FFT bin, clamped to `0..=fft_size / 2`
    pub fn frequency_to_bin_index(&self, frequency_hz: f32) -> usize {
        let half = self.fft_size / 2;
        if frequency_hz.is_nan() || frequency_hz <= 0.0 {
            return 0;
        }
        let index = (frequency_hz / self.nyquist() * half as f32).round();
        (index as usize).min(half)
    }
}

/// Shareable analyzer, fed from the audio thread and polled by the UI
#[derive(Clone)]
pub struct AnalyzerHandle {
    inner: Arc<Mutex<SampleAnalyzer>>,
}

impl AnalyzerHandle {
    pub fn new(analyzer: SampleAnalyzer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(analyzer)),
        }
    }

    /// Reinitialize for a new source format
    pub fn initialize(&self, format: AudioFormat) {
        if let Ok(mut analyzer) = self.inner.lock() {
            analyzer.initialize(format);
        }
    }

    /// Drop the current source's history
    pub fn clear(&self) {
        if let Ok(mut analyzer) = self.inner.lock() {
            analyzer.clear();
        }
    }

    /// See [`SampleAnalyzer::compute_fft`]
    pub fn compute_fft(&self, output: &mut [f32]) {
        match self.inner.lock() {
            Ok(mut analyzer) => analyzer.compute_fft(output),
            Err(_) => output.fill(0.0),
        }
    }

    /// See [`SampleAnalyzer::frequency_to_bin_index`]
    pub fn frequency_to_bin_index(&self, frequency_hz: f32) -> usize {
        self.inner
            .lock()
            .map_or(0, |analyzer| analyzer.frequency_to_bin_index(frequency_hz))
    }

    /// Swap in an analyzer of a different FFT length, keeping the source format
    ///
    /// # Errors
    /// `InvalidFftSize` if `fft_size` is rejected by [`SampleAnalyzer::new`]
    pub fn resize(&self, fft_size: usize) -> Result<()> {
        let mut fresh = SampleAnalyzer::new(fft_size)?;
        if let Ok(mut analyzer) = self.inner.lock() {
            fresh.channels = analyzer.channels;
            fresh.sample_rate = analyzer.sample_rate;
            *analyzer = fresh;
        }
        Ok(())
    }

    pub fn fft_size(&self) -> usize {
        self.inner
            .lock()
            .map_or(DEFAULT_FFT_SIZE, |analyzer| analyzer.fft_size())
    }
}

impl SampleObserver for AnalyzerHandle {
    fn on_samples(&self, samples: &[f32], channels: usize) {
        // Never wait on the UI from the audio thread; a skipped block only
        // delays the spectrum by one block
        if let Ok(mut analyzer) = self.inner.try_lock() {
            analyzer.add_block(samples, channels);
        }
    }
}
