use serde::{Deserialize, Serialize};

use crate::clock::TimestampMs;

/// Page classification reported by the content layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PageMode {
    Good,
    Drift,
    #[serde(other)]
    Unknown,
}

impl Default for PageMode {
    fn default() -> Self {
        PageMode::Unknown
    }
}

/// Interaction rates over the last minute for one context.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BehaviorSample {
    pub scroll_per_min: f64,
    pub key_per_min: f64,
    /// Observed but not part of the passivity predicate.
    pub click_per_min: f64,
}

impl BehaviorSample {
    pub fn new(scroll_per_min: f64, key_per_min: f64, click_per_min: f64) -> Self {
        Self {
            scroll_per_min,
            key_per_min,
            click_per_min,
        }
    }

    /// Negative or non-finite rates are treated as zero.
    pub fn sanitized(self) -> Self {
        fn clean(value: f64) -> f64 {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                0.0
            }
        }

        Self {
            scroll_per_min: clean(self.scroll_per_min),
            key_per_min: clean(self.key_per_min),
            click_per_min: clean(self.click_per_min),
        }
    }
}

/// Heuristic constants for accumulation, decay and post-nudge reset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriftTuning {
    /// Decay speed relative to accumulation.
    pub decay_rate: u64,
    /// Fraction of the threshold the accumulator is set to after a nudge.
    pub reset_ratio: f64,
    /// Minimum scrolls per minute to count as passive.
    pub passive_scroll_per_min: f64,
    /// Maximum keys per minute to still count as passive.
    pub passive_key_per_min: f64,
}

impl Default for DriftTuning {
    fn default() -> Self {
        Self {
            decay_rate: 2,
            reset_ratio: 0.6,
            passive_scroll_per_min: 5.0,
            passive_key_per_min: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriftState {
    pub accumulated_drift_ms: u64,
    /// `None` until the first nudge for this context.
    pub last_nudge_at_ms: Option<TimestampMs>,
    pub last_tick_at_ms: TimestampMs,
    pub last_observed_mode: PageMode,
}

impl DriftState {
    pub fn new(now_ms: TimestampMs) -> Self {
        Self {
            accumulated_drift_ms: 0,
            last_nudge_at_ms: None,
            last_tick_at_ms: now_ms,
            last_observed_mode: PageMode::Unknown,
        }
    }

    /// Advance `last_tick_at_ms` to `now_ms` and return the elapsed time.
    /// A clock that went backwards yields zero.
    pub fn mark_tick(&mut self, now_ms: TimestampMs) -> u64 {
        let elapsed = now_ms.saturating_sub(self.last_tick_at_ms).max(0) as u64;
        self.last_tick_at_ms = now_ms;
        elapsed
    }
}
