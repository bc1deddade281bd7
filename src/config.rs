use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::drift::DriftTuning;

pub const DEBUG_ENV_VAR: &str = "FOCUS_NUDGE_DEBUG";

/// Engine configuration with tunable cadence and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Cadence of the tick loop.
    pub tick_interval_ms: u64,

    /// Upper bound on one sample request to the content layer.
    pub sample_timeout_ms: u64,

    /// URL prefix of the monitored site.
    pub site_prefix: String,

    pub tuning: DriftTuning,

    /// Log every tick outcome, not just nudges and failures.
    pub debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            sample_timeout_ms: 10_000,
            site_prefix: "https://www.linkedin.com/".into(),
            tuning: DriftTuning::default(),
            debug: false,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config from {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid engine config in {}", path.display()))?;
        Ok(config.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        let debug_env = std::env::var(DEBUG_ENV_VAR)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        self.debug |= debug_env;
        self
    }

    /// Zero falls back to one millisecond so the interval stays valid.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms.max(1))
    }
}
