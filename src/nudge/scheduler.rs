use crate::clock::TimestampMs;
use crate::drift::{DriftState, DriftTuning};
use crate::settings::EffectiveSettings;

/// True once the cooldown since the last nudge has elapsed, or if none fired yet.
pub fn cooldown_elapsed(
    state: &DriftState,
    settings: &EffectiveSettings,
    now_ms: TimestampMs,
) -> bool {
    match state.last_nudge_at_ms {
        None => true,
        Some(last) => now_ms.saturating_sub(last) >= settings.cooldown_ms() as i64,
    }
}

pub fn should_nudge(state: &DriftState, settings: &EffectiveSettings, now_ms: TimestampMs) -> bool {
    state.accumulated_drift_ms >= settings.drift_threshold_ms()
        && cooldown_elapsed(state, settings, now_ms)
}

/// Stamp the nudge time and drop the accumulator to a fraction of the
/// threshold, so continued passivity re-triggers once the cooldown expires.
pub fn on_nudge_fired(
    mut state: DriftState,
    settings: &EffectiveSettings,
    now_ms: TimestampMs,
    tuning: &DriftTuning,
) -> DriftState {
    state.last_nudge_at_ms = Some(now_ms);
    let reset = settings.drift_threshold_ms() as f64 * tuning.reset_ratio.clamp(0.0, 1.0);
    state.accumulated_drift_ms = reset.round() as u64;
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nudge::Tone;

    fn settings() -> EffectiveSettings {
        EffectiveSettings::new(Tone::Gentle, 15, 30)
    }

    fn state_with(drift_ms: u64, last_nudge: Option<TimestampMs>) -> DriftState {
        let mut state = DriftState::new(0);
        state.accumulated_drift_ms = drift_ms;
        state.last_nudge_at_ms = last_nudge;
        state
    }

    #[test]
    fn below_threshold_never_fires() {
        let settings = settings();
        assert!(!should_nudge(&state_with(899_999, None), &settings, 10_000_000));
        assert!(!should_nudge(&state_with(0, None), &settings, 10_000_000));
    }

    #[test]
    fn never_fired_satisfies_cooldown() {
        assert!(should_nudge(&state_with(900_000, None), &settings(), 0));
    }

    #[test]
    fn cooldown_blocks_until_elapsed() {
        let settings = settings();
        let state = state_with(950_000, Some(1_000_000));
        assert!(!should_nudge(&state, &settings, 1_000_000));
        assert!(!should_nudge(&state, &settings, 2_799_999));
        assert!(should_nudge(&state, &settings, 2_800_000));
    }

    #[test]
    fn fire_resets_to_sixty_percent() {
        let settings = settings();
        let fired = on_nudge_fired(
            state_with(912_345, None),
            &settings,
            4_242,
            &DriftTuning::default(),
        );
        assert_eq!(fired.accumulated_drift_ms, 540_000);
        assert_eq!(fired.last_nudge_at_ms, Some(4_242));
    }

    #[test]
    fn immediately_after_fire_is_suppressed() {
        let settings = settings();
        let tuning = DriftTuning::default();
        let mut state = on_nudge_fired(state_with(900_000, None), &settings, 100, &tuning);
        state.accumulated_drift_ms = 1_000_000;
        assert!(!should_nudge(&state, &settings, 100));
        assert!(!should_nudge(&state, &settings, 100 + 1_799_999));
        assert!(should_nudge(&state, &settings, 100 + 1_800_000));
    }
}
