/// Notification taps
///
/// Pass-through pipeline stages that report what flows through them:
/// `SampleTap` hands every block to a `SampleObserver` (the spectrum
/// analyzer), `BlockTap` fires a callback each time a fixed amount of audio
/// has been read (position updates). Both stop notifying once their
/// `NotifyGate` is detached, which lets a session that is being crossfaded
/// out keep playing without driving the engine any more.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempest_core::{AudioFormat, WaveSource};

/// Receives every block of interleaved samples read through a `SampleTap`
///
/// Called on the audio thread: implementations must not block.
pub trait SampleObserver: Send + Sync {
    /// Observe one block
    fn on_samples(&self, samples: &[f32], channels: usize);
}

/// Shared on/off switch for a pipeline's taps
#[derive(Debug, Clone)]
pub struct NotifyGate {
    attached: Arc<AtomicBool>,
}

impl NotifyGate {
    /// New, attached gate
    pub fn new() -> Self {
        Self {
            attached: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Stop all taps sharing this gate from notifying
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    /// Whether notifications are still delivered
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

impl Default for NotifyGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Stage feeding each block to a `SampleObserver`
pub struct SampleTap {
    inner: Box<dyn WaveSource>,
    observer: Arc<dyn SampleObserver>,
    gate: NotifyGate,
}

impl SampleTap {
    pub fn new(
        inner: Box<dyn WaveSource>,
        observer: Arc<dyn SampleObserver>,
        gate: NotifyGate,
    ) -> Self {
        Self {
            inner,
            observer,
            gate,
        }
    }
}

impl WaveSource for SampleTap {
    fn format(&self) -> AudioFormat {
        self.inner.format()
    }

    fn read(&mut self, buffer: &mut [f32]) -> tempest_core::Result<usize> {
        let read = self.inner.read(buffer)?;
        if read > 0 && self.gate.is_attached() {
            let channels = self.inner.format().channel_count();
            self.observer.on_samples(&buffer[..read], channels);
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

/// Callback fired by a `BlockTap`
pub type BlockCallback = Box<dyn FnMut() + Send>;

/// Stage firing a callback every `interval_ms` of audio read
///
/// Fires at most once per `read`, so a large read spanning several intervals
/// produces a single notification.
pub struct BlockTap {
    inner: Box<dyn WaveSource>,
    callback: BlockCallback,
    gate: NotifyGate,
    interval_frames: u64,
    accumulated: u64,
}

impl BlockTap {
    pub fn new(
        inner: Box<dyn WaveSource>,
        interval_ms: u32,
        callback: BlockCallback,
        gate: NotifyGate,
    ) -> Self {
        let rate = u64::from(inner.format().sample_rate.as_hz());
        let interval_frames = (rate * u64::from(interval_ms) / 1000).max(1);
        Self {
            inner,
            callback,
            gate,
            interval_frames,
            accumulated: 0,
        }
    }

    /// Frames of audio between notifications
    pub fn interval_frames(&self) -> u64 {
        self.interval_frames
    }
}

impl WaveSource for BlockTap {
    fn format(&self) -> AudioFormat {
        self.inner.format()
    }

    fn read(&mut self, buffer: &mut [f32]) -> tempest_core::Result<usize> {
        let read = self.inner.read(buffer)?;
        let channels = self.inner.format().channel_count();
        self.accumulated += (read / channels) as u64;

        if self.accumulated >= self.interval_frames {
            self.accumulated %= self.interval_frames;
            if self.gate.is_attached() {
                (self.callback)();
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
        self.accumulated = 0;
        self.inner.set_position(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ToneSource;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct Collect(Mutex<Vec<f32>>);

    impl SampleObserver for Collect {
        fn on_samples(&self, samples: &[f32], _channels: usize) {
            self.0.lock().unwrap().extend_from_slice(samples);
        }
    }

    fn counting_tap(interval_ms: u32) -> (BlockTap, Arc<AtomicUsize>, NotifyGate) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let gate = NotifyGate::new();
        let tap = BlockTap::new(
            Box::new(ToneSource::new(1_000, 50.0, 10.0)),
            interval_ms,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            gate.clone(),
        );
        (tap, fired, gate)
    }

    #[test]
    fn block_tap_fires_per_interval() {
        let (mut tap, fired, _gate) = counting_tap(100);
        assert_eq!(tap.interval_frames(), 100);

        // 50 frames per read: every second read crosses the interval
        let mut buffer = vec![0.0; 100];
        for _ in 0..10 {
            tap.read(&mut buffer).unwrap();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn block_tap_fires_once_for_large_reads() {
        let (mut tap, fired, _gate) = counting_tap(100);
        let mut buffer = vec![0.0; 2_000];
        tap.read(&mut buffer).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detached_gate_silences_taps() {
        let (mut tap, fired, gate) = counting_tap(100);
        gate.detach();
        let mut buffer = vec![0.0; 400];
        for _ in 0..5 {
            assert_eq!(tap.read(&mut buffer).unwrap(), 400);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn sample_tap_passes_audio_through() {
        let observer = Arc::new(Collect(Mutex::new(Vec::new())));
        let mut tap = SampleTap::new(
            Box::new(ToneSource::new(8_000, 440.0, 0.01)),
            observer.clone(),
            NotifyGate::new(),
        );

        let mut buffer = vec![0.0; 64];
        let read = tap.read(&mut buffer).unwrap();
        assert_eq!(observer.0.lock().unwrap().as_slice(), &buffer[..read]);
    }
}
