use super::state::{BehaviorSample, DriftState, DriftTuning, PageMode};

/// High scroll rate with little typing.
pub fn is_passive(behavior: &BehaviorSample, tuning: &DriftTuning) -> bool {
    behavior.scroll_per_min >= tuning.passive_scroll_per_min
        && behavior.key_per_min <= tuning.passive_key_per_min
}

/// Accumulates drift while the page is drift-prone and the user is passive,
/// otherwise decays it `decay_rate` times faster, never below zero.
pub fn update(
    mut state: DriftState,
    elapsed_ms: u64,
    mode: PageMode,
    behavior: &BehaviorSample,
    tuning: &DriftTuning,
) -> DriftState {
    if mode == PageMode::Drift && is_passive(behavior, tuning) {
        state.accumulated_drift_ms = state.accumulated_drift_ms.saturating_add(elapsed_ms);
    } else {
        let decay = elapsed_ms.saturating_mul(tuning.decay_rate);
        state.accumulated_drift_ms = state.accumulated_drift_ms.saturating_sub(decay);
    }
    state.last_observed_mode = mode;
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passive() -> BehaviorSample {
        BehaviorSample::new(5.0, 2.0, 0.0)
    }

    fn with_drift(ms: u64) -> DriftState {
        let mut state = DriftState::new(0);
        state.accumulated_drift_ms = ms;
        state
    }

    #[test]
    fn accumulates_when_drift_and_passive() {
        let tuning = DriftTuning::default();
        let next = update(with_drift(1_000), 5_000, PageMode::Drift, &passive(), &tuning);
        assert_eq!(next.accumulated_drift_ms, 6_000);
        assert_eq!(next.last_observed_mode, PageMode::Drift);
    }

    #[test]
    fn good_mode_decays_twice_as_fast() {
        let tuning = DriftTuning::default();
        let next = update(with_drift(30_000), 5_000, PageMode::Good, &passive(), &tuning);
        assert_eq!(next.accumulated_drift_ms, 20_000);
    }

    #[test]
    fn decay_clamps_at_zero() {
        let tuning = DriftTuning::default();
        let next = update(with_drift(4_000), 5_000, PageMode::Good, &passive(), &tuning);
        assert_eq!(next.accumulated_drift_ms, 0);
    }

    #[test]
    fn typing_breaks_passivity() {
        let tuning = DriftTuning::default();
        let active = BehaviorSample::new(40.0, 3.0, 0.0);
        assert!(!is_passive(&active, &tuning));

        let next = update(with_drift(10_000), 5_000, PageMode::Drift, &active, &tuning);
        assert_eq!(next.accumulated_drift_ms, 0);
    }

    #[test]
    fn clicks_do_not_affect_passivity() {
        let tuning = DriftTuning::default();
        assert!(is_passive(&BehaviorSample::new(6.0, 0.0, 500.0), &tuning));
        assert!(!is_passive(&BehaviorSample::new(4.0, 0.0, 500.0), &tuning));
    }

    #[test]
    fn unknown_mode_decays() {
        let tuning = DriftTuning::default();
        let next = update(
            with_drift(50_000),
            5_000,
            PageMode::Unknown,
            &BehaviorSample::default(),
            &tuning,
        );
        assert_eq!(next.accumulated_drift_ms, 40_000);
    }

    #[test]
    fn never_negative_over_mixed_sequence() {
        let tuning = DriftTuning::default();
        let mut state = DriftState::new(0);
        let steps = [
            (PageMode::Drift, passive(), 5_000),
            (PageMode::Good, passive(), 7_000),
            (PageMode::Drift, BehaviorSample::default(), 60_000),
            (PageMode::Drift, passive(), 1),
            (PageMode::Unknown, passive(), 0),
            (PageMode::Good, passive(), u64::MAX / 2),
        ];
        for (mode, behavior, elapsed) in steps {
            state = update(state, elapsed, mode, &behavior, &tuning);
            assert!(state.accumulated_drift_ms <= u64::MAX / 2);
        }
        assert_eq!(state.accumulated_drift_ms, 0);
    }
}
