//! Property-based tests for engine decisions

use proptest::prelude::*;
use tempest_playback::{
    should_begin_crossfade, EngineSettings, FadeCurve, CROSSFADE_MIN_REMAINDER_SECS,
};

fn settings(duration: u32) -> EngineSettings {
    EngineSettings {
        crossfade_enabled: true,
        crossfade_duration_secs: duration,
        ..EngineSettings::default()
    }
}

proptest! {
    #[test]
    fn never_starts_while_crossfading(
        duration in 1u32..20,
        total in 0u64..1000,
        elapsed in 0u64..1000,
    ) {
        prop_assert!(!should_begin_crossfade(&settings(duration), elapsed, total, true));
    }

    #[test]
    fn starts_only_inside_window(
        duration in 1u32..20,
        total in 0u64..1000,
        elapsed in 0u64..1000,
    ) {
        let elapsed = elapsed.min(total);
        let begins = should_begin_crossfade(&settings(duration), elapsed, total, false);
        let remaining = total - elapsed;
        let long_enough = total as i64 - i64::from(duration) > CROSSFADE_MIN_REMAINDER_SECS;
        prop_assert_eq!(begins, long_enough && remaining <= u64::from(duration));
    }

    #[test]
    fn disabled_never_starts(total in 0u64..1000, elapsed in 0u64..1000) {
        let settings = EngineSettings::default();
        prop_assert!(!should_begin_crossfade(&settings, elapsed, total, false));
    }

    #[test]
    fn fade_gains_stay_in_unit_range(position in -1.0f32..2.0, fade_out in any::<bool>()) {
        for curve in [FadeCurve::Linear, FadeCurve::EqualPower] {
            let gain = curve.calculate_gain(position, fade_out);
            prop_assert!((0.0..=1.0).contains(&gain), "{:?} gave {}", curve, gain);
        }
    }

    #[test]
    fn fade_in_is_monotonic(a in 0.0f32..1.0, b in 0.0f32..1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        for curve in [FadeCurve::Linear, FadeCurve::EqualPower] {
            prop_assert!(curve.calculate_gain(lo, false) <= curve.calculate_gain(hi, false) + 1e-6);
        }
    }
}
