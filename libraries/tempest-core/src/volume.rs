/// Lock-free volume cell shared between the control thread and audio callbacks
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Linear gain in `[0.0, 1.0]`, stored as raw `f32` bits
///
/// Clones share the same cell, so a fader can ramp the value while the
/// audio callback reads it without locking.
#[derive(Debug, Clone)]
pub struct SharedVolume {
    bits: Arc<AtomicU32>,
}

impl SharedVolume {
    /// Create a cell holding `level` (clamped)
    pub fn new(level: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(clamp(level).to_bits())),
        }
    }

    /// Current gain
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Set gain, clamped to `[0.0, 1.0]`
    pub fn set(&self, level: f32) {
        self.bits.store(clamp(level).to_bits(), Ordering::Relaxed);
    }

    /// Whether two handles point at the same cell
    pub fn same_cell(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bits, &other.bits)
    }
}

impl Default for SharedVolume {
    fn default() -> Self {
        Self::new(1.0)
    }
}

fn clamp(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}
