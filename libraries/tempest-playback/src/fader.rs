//! Volume fading
//!
//! A fade ramps a sink's `SharedVolume` from one level to another on a
//! worker thread. The fader runs one fade at a time: starting a new fade
//! cancels the running one and waits for its worker to exit. Completion is
//! reported through a callback, which only runs when the fade was not
//! cancelled.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempest_core::SharedVolume;

/// Fade curve type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FadeCurve {
    /// Linear ramp
    Linear,

    /// Sine law; an equal-power pair keeps perceived loudness constant
    #[default]
    EqualPower,
}

impl FadeCurve {
    /// Calculate the fade gain at a given position
    ///
    /// # Arguments
    /// * `position` - Normalized position in the fade (0.0 to 1.0)
    /// * `fade_out` - If true, calculates fade-out gain; if false, fade-in gain
    ///
    /// # Returns
    /// Gain multiplier (0.0 to 1.0)
    #[inline]
    pub fn calculate_gain(&self, position: f32, fade_out: bool) -> f32 {
        let position = position.clamp(0.0, 1.0);
        let t = if fade_out { 1.0 - position } else { position };

        match self {
            FadeCurve::Linear => t,
            FadeCurve::EqualPower => (t * PI * 0.5).sin(),
        }
    }
}

/// Identifies one fade started by a `VolumeFader`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FadeId(u64);

struct RunningFade {
    cancel: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    started: Instant,
    duration: Duration,
}

/// Ramps a `SharedVolume` over time
pub struct VolumeFader {
    tick: Duration,
    curve: FadeCurve,
    next_id: u64,
    running: Option<RunningFade>,
}

impl VolumeFader {
    /// Fader writing a new level every `tick`
    pub fn new(tick: Duration, curve: FadeCurve) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
            curve,
            next_id: 0,
            running: None,
        }
    }

    pub fn curve(&self) -> FadeCurve {
        self.curve
    }

    /// Tick used by fades started from now on
    pub fn set_tick(&mut self, tick: Duration) {
        self.tick = tick.max(Duration::from_millis(1));
    }

    /// Ramp from silence up to `target`
    pub fn fade_in<F>(
        &mut self,
        volume: SharedVolume,
        target: f32,
        duration: Duration,
        on_complete: F,
    ) -> FadeId
    where
        F: FnOnce(FadeId) + Send + 'static,
    {
        self.ramp(volume, 0.0, target, duration, on_complete)
    }

    /// Ramp from `from` down to silence
    pub fn fade_out<F>(
        &mut self,
        volume: SharedVolume,
        from: f32,
        duration: Duration,
        on_complete: F,
    ) -> FadeId
    where
        F: FnOnce(FadeId) + Send + 'static,
    {
        self.ramp(volume, from, 0.0, duration, on_complete)
    }

    /// Ramp from the current level to `target`
    pub fn fade_to<F>(
        &mut self,
        volume: SharedVolume,
        target: f32,
        duration: Duration,
        on_complete: F,
    ) -> FadeId
    where
        F: FnOnce(FadeId) + Send + 'static,
    {
        let from = volume.get();
        self.ramp(volume, from, target, duration, on_complete)
    }

    fn ramp<F>(
        &mut self,
        volume: SharedVolume,
        from: f32,
        to: f32,
        duration: Duration,
        on_complete: F,
    ) -> FadeId
    where
        F: FnOnce(FadeId) + Send + 'static,
    {
        self.cancel_fading();
        self.wait_for_cancel();

        self.next_id += 1;
        let id = FadeId(self.next_id);
        let cancel = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));

        let steps = (duration.as_millis() / self.tick.as_millis().max(1)).max(1) as u32;
        let step_length = duration / steps;
        let curve = self.curve;

        volume.set(from);

        let worker = {
            let cancel = cancel.clone();
            let done = done.clone();
            thread::Builder::new()
                .name("tempest-fader".into())
                .spawn(move || {
                    for step in 1..=steps {
                        thread::sleep(step_length);
                        if cancel.load(Ordering::Acquire) {
                            return;
                        }
                        let t = step as f32 / steps as f32;
                        let level = if to >= from {
                            from + (to - from) * curve.calculate_gain(t, false)
                        } else {
                            to + (from - to) * curve.calculate_gain(t, true)
                        };
                        volume.set(level);
                    }
                    done.store(true, Ordering::Release);
                    on_complete(id);
                })
        };

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("Failed to spawn fader thread: {}", e);
                None
            }
        };

        self.running = Some(RunningFade {
            cancel,
            done,
            worker,
            started: Instant::now(),
            duration,
        });
        id
    }

    /// Whether a fade is running and has not been cancelled
    pub fn is_fading(&self) -> bool {
        self.running.as_ref().is_some_and(|fade| {
            fade.worker.is_some()
                && !fade.done.load(Ordering::Acquire)
                && !fade.cancel.load(Ordering::Acquire)
        })
    }

    /// Time left on the running fade, zero when idle
    pub fn remaining(&self) -> Duration {
        match &self.running {
            Some(fade) if self.is_fading() => fade.duration.saturating_sub(fade.started.elapsed()),
            _ => Duration::ZERO,
        }
    }

    /// Ask the running fade to stop; the volume stays where it is
    pub fn cancel_fading(&self) {
        if let Some(fade) = &self.running {
            fade.cancel.store(true, Ordering::Release);
        }
    }

    /// Block until the running fade's worker has exited
    pub fn wait_for_cancel(&mut self) {
        if let Some(mut fade) = self.running.take() {
            if let Some(worker) = fade.worker.take() {
                if worker.join().is_err() {
                    tracing::warn!("Fader thread panicked");
                }
            }
        }
    }
}

impl Drop for VolumeFader {
    fn drop(&mut self) {
        self.cancel_fading();
        self.wait_for_cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn fader() -> VolumeFader {
        VolumeFader::new(Duration::from_millis(5), FadeCurve::Linear)
    }

    #[test]
    fn curves_hit_endpoints() {
        for curve in [FadeCurve::Linear, FadeCurve::EqualPower] {
            assert!((curve.calculate_gain(0.0, false)).abs() < 1e-6);
            assert!((curve.calculate_gain(1.0, false) - 1.0).abs() < 1e-6);
            assert!((curve.calculate_gain(0.0, true) - 1.0).abs() < 1e-6);
            assert!((curve.calculate_gain(1.0, true)).abs() < 1e-6);
        }
    }

    #[test]
    fn equal_power_keeps_constant_power() {
        let curve = FadeCurve::EqualPower;
        for i in 0..=10 {
            let t = i as f32 / 10.0;
            let out = curve.calculate_gain(t, true);
            let inc = curve.calculate_gain(t, false);
            assert!((out * out + inc * inc - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn fade_in_reaches_target_and_completes() {
        let mut fader = fader();
        let volume = SharedVolume::new(1.0);
        let (tx, rx) = unbounded();

        let id = fader.fade_in(volume.clone(), 0.8, Duration::from_millis(30), move |id| {
            tx.send(id).ok();
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), id);
        assert!((volume.get() - 0.8).abs() < 1e-6);
        assert!(!fader.is_fading());
    }

    #[test]
    fn fade_out_reaches_silence() {
        let mut fader = fader();
        let volume = SharedVolume::new(0.6);
        let (tx, rx) = unbounded();

        fader.fade_out(volume.clone(), 0.6, Duration::from_millis(20), move |id| {
            tx.send(id).ok();
        });
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(volume.get(), 0.0);
    }

    #[test]
    fn cancelled_fade_never_completes() {
        let mut fader = fader();
        let volume = SharedVolume::new(1.0);
        let (tx, rx) = unbounded();

        fader.fade_out(volume.clone(), 1.0, Duration::from_secs(5), move |id| {
            tx.send(id).ok();
        });
        assert!(fader.is_fading());
        let remaining = fader.remaining();
        assert!(remaining > Duration::from_secs(4) && remaining <= Duration::from_secs(5));

        fader.cancel_fading();
        assert!(!fader.is_fading());
        fader.wait_for_cancel();

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert!(volume.get() > 0.0);
        assert_eq!(fader.remaining(), Duration::ZERO);
    }

    #[test]
    fn new_fade_replaces_running_one() {
        let mut fader = fader();
        let volume = SharedVolume::new(1.0);
        let (tx, rx) = unbounded();
        let first_tx = tx.clone();

        let first = fader.fade_out(volume.clone(), 1.0, Duration::from_secs(5), move |id| {
            first_tx.send(id).ok();
        });
        let second = fader.fade_to(volume.clone(), 1.0, Duration::from_millis(10), move |id| {
            tx.send(id).ok();
        });

        assert_ne!(first, second);
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), second);
        assert!((volume.get() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_duration_fade_jumps_to_target() {
        let mut fader = fader();
        let volume = SharedVolume::new(0.0);
        let (tx, rx) = unbounded();

        fader.fade_to(volume.clone(), 0.5, Duration::ZERO, move |id| {
            tx.send(id).ok();
        });
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!((volume.get() - 0.5).abs() < 1e-6);
    }
}
