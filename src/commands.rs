use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::clock::TimestampMs;
use crate::metrics::WeeklyMetrics;
use crate::settings::{SettingsStore, UserSettings};

/// Messages the popup and options pages send to the background process.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    GetEffectiveSettings,
    GetWeeklySummary,
    ResetWeeklySummary,
    GetPlan,
    #[serde(rename_all = "camelCase")]
    SetProDev { is_pro: bool },
    SetEnabled { enabled: bool },
    SaveSettings { settings: UserSettings },
}

fn ok() -> Value {
    json!({ "ok": true })
}

async fn dispatch(
    request: Request,
    settings: &SettingsStore,
    metrics: &WeeklyMetrics,
    now_ms: TimestampMs,
) -> Result<Value> {
    let value = match request {
        Request::GetEffectiveSettings => serde_json::to_value(settings.effective_settings())?,
        Request::GetWeeklySummary => serde_json::to_value(metrics.weekly_summary(now_ms).await?)?,
        Request::ResetWeeklySummary => {
            metrics.reset_weekly_summary(now_ms).await?;
            ok()
        }
        Request::GetPlan => serde_json::to_value(settings.plan())?,
        Request::SetProDev { is_pro } => {
            settings.set_pro_dev(is_pro)?;
            ok()
        }
        Request::SetEnabled { enabled } => {
            settings.set_enabled(enabled)?;
            ok()
        }
        Request::SaveSettings { settings: user } => {
            settings.save_user_settings(user)?;
            ok()
        }
    };
    Ok(value)
}

/// Answers a request; failures come back as `{"error": ...}`.
pub async fn handle_request(
    request: Request,
    settings: &SettingsStore,
    metrics: &WeeklyMetrics,
    now_ms: TimestampMs,
) -> Value {
    match dispatch(request, settings, metrics, now_ms).await {
        Ok(value) => value,
        Err(err) => json!({ "error": format!("{err:#}") }),
    }
}

/// Same as [`handle_request`] for a raw JSON message.
pub async fn handle_message(
    raw: &str,
    settings: &SettingsStore,
    metrics: &WeeklyMetrics,
    now_ms: TimestampMs,
) -> Value {
    let parsed: Result<Request> = serde_json::from_str(raw).context("unrecognised request");
    match parsed {
        Ok(request) => handle_request(request, settings, metrics, now_ms).await,
        Err(err) => json!({ "error": format!("{err:#}") }),
    }
}
