use serde::{Deserialize, Serialize};

use crate::clock::TimestampMs;

/// Rough minutes saved per early exit.
pub const MINUTES_PER_EARLY_EXIT: u64 = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyCounters {
    pub week_start_ms: TimestampMs,
    pub nudges_fired_weekly: u64,
    pub early_exits_weekly: u64,
    pub last_nudge_shown_ms: Option<TimestampMs>,
}

impl WeeklyCounters {
    pub fn fresh(week_start_ms: TimestampMs) -> Self {
        Self {
            week_start_ms,
            nudges_fired_weekly: 0,
            early_exits_weekly: 0,
            last_nudge_shown_ms: None,
        }
    }

    pub fn summary(&self) -> WeeklySummary {
        WeeklySummary {
            nudges: self.nudges_fired_weekly,
            early_exits: self.early_exits_weekly,
            estimated_minutes: self.early_exits_weekly * MINUTES_PER_EARLY_EXIT,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklySummary {
    pub nudges: u64,
    pub early_exits: u64,
    pub estimated_minutes: u64,
}
