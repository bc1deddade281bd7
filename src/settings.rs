use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::clock::TimestampMs;
use crate::nudge::Tone;

const MIN_MINUTES: u32 = 1;
const MAX_MINUTES: u32 = 120;
const MINUTE_MS: u64 = 60_000;

const BASIC_TONE: Tone = Tone::Gentle;
const BASIC_DRIFT_THRESHOLD_MIN: u32 = 15;
const BASIC_COOLDOWN_MIN: u32 = 30;

const DEFAULT_DRIFT_THRESHOLD_MIN: u32 = 15;
const DEFAULT_COOLDOWN_MIN: u32 = 10;

/// Settings the engine actually runs with, resolved against the plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub tone: Tone,
    pub drift_threshold_min: u32,
    pub cooldown_min: u32,
}

impl EffectiveSettings {
    pub fn new(tone: Tone, drift_threshold_min: u32, cooldown_min: u32) -> Self {
        Self {
            tone,
            drift_threshold_min,
            cooldown_min,
        }
    }

    pub fn basic() -> Self {
        Self::new(BASIC_TONE, BASIC_DRIFT_THRESHOLD_MIN, BASIC_COOLDOWN_MIN)
    }

    pub fn drift_threshold_ms(&self) -> u64 {
        u64::from(self.drift_threshold_min) * MINUTE_MS
    }

    pub fn cooldown_ms(&self) -> u64 {
        u64::from(self.cooldown_min) * MINUTE_MS
    }
}

/// What the user picked on the options page. Tone is kept as a raw id so a
/// tampered or stale value survives a round trip and is only validated on read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserSettings {
    pub tone: String,
    pub drift_threshold_min: u32,
    pub cooldown_min: u32,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            tone: Tone::Gentle.as_str().into(),
            drift_threshold_min: DEFAULT_DRIFT_THRESHOLD_MIN,
            cooldown_min: DEFAULT_COOLDOWN_MIN,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Stripe,
    Dev,
    Basic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatus {
    pub is_pro: bool,
    pub source: PlanSource,
}

/// Outcome of a license check performed outside this crate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LicenseVerdict {
    pub valid: bool,
    pub is_pro: bool,
    pub checked_at_ms: TimestampMs,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
struct StoredSettings {
    enabled: bool,
    user: UserSettings,
    dev_pro: bool,
    license: Option<LicenseVerdict>,
}

impl Default for StoredSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            user: UserSettings::default(),
            dev_pro: false,
            license: None,
        }
    }
}

/// JSON-backed settings and plan state. `path == None` keeps everything in memory.
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<StoredSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            StoredSettings::default()
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(StoredSettings::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoredSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoredSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, apply: impl FnOnce(&mut StoredSettings)) -> Result<()> {
        let mut guard = self.write();
        apply(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &StoredSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    pub fn is_enabled(&self) -> bool {
        self.read().enabled
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|data| data.enabled = enabled)
    }

    pub fn user_settings(&self) -> UserSettings {
        self.read().user.clone()
    }

    pub fn save_user_settings(&self, settings: UserSettings) -> Result<()> {
        self.update(|data| data.user = settings)
    }

    /// A valid Pro license wins over the developer toggle.
    pub fn plan(&self) -> PlanStatus {
        let data = self.read();
        if matches!(data.license, Some(verdict) if verdict.valid && verdict.is_pro) {
            return PlanStatus {
                is_pro: true,
                source: PlanSource::Stripe,
            };
        }
        if data.dev_pro {
            return PlanStatus {
                is_pro: true,
                source: PlanSource::Dev,
            };
        }
        PlanStatus {
            is_pro: false,
            source: PlanSource::Basic,
        }
    }

    /// Only flips the developer toggle; a recorded license verdict is kept.
    pub fn set_pro_dev(&self, is_pro: bool) -> Result<()> {
        self.update(|data| data.dev_pro = is_pro)
    }

    pub fn clear_dev_plan(&self) -> Result<()> {
        self.set_pro_dev(false)
    }

    pub fn record_license_verdict(&self, verdict: LicenseVerdict) -> Result<()> {
        self.update(|data| data.license = Some(verdict))
    }

    /// Basic always gets the hard defaults; Pro gets stored values, validated.
    pub fn effective_settings(&self) -> EffectiveSettings {
        if !self.plan().is_pro {
            return EffectiveSettings::basic();
        }

        let user = self.user_settings();
        EffectiveSettings {
            tone: Tone::from_id(&user.tone),
            drift_threshold_min: clamp_minutes(
                user.drift_threshold_min,
                DEFAULT_DRIFT_THRESHOLD_MIN,
            ),
            cooldown_min: clamp_minutes(user.cooldown_min, DEFAULT_COOLDOWN_MIN),
        }
    }
}

fn clamp_minutes(value: u32, fallback: u32) -> u32 {
    let value = if value == 0 { fallback } else { value };
    value.clamp(MIN_MINUTES, MAX_MINUTES)
}
