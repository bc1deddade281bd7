//! Boundary between the engine and the browser runtime it observes.
//!
//! Every call that crosses into the content layer, the tab API or the metrics
//! collaborator returns a [`Delivery`] rather than an error, since failures at
//! these seams (a page still loading, a tab closed mid-request) are routine.

use std::fmt;
use std::future::Future;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::clock::TimestampMs;
use crate::drift::{BehaviorSample, PageMode};
use crate::settings::{EffectiveSettings, SettingsStore};

/// Opaque browser tab/window id, stable for the tab's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub i64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Result of a request across the runtime boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
    Ok(T),
    /// Receiver not ready or gone (page loading, tab closed).
    Unavailable,
    TransportError(String),
}

impl<T> Delivery<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Delivery::Ok(_))
    }
}

impl<T> From<Result<T>> for Delivery<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Delivery::Ok(value),
            Err(err) => Delivery::TransportError(format!("{err:#}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Classification {
    pub mode: PageMode,
    pub confidence: f64,
}

/// Content-script answer to a state request. Every field may be missing;
/// missing parts default to `UNKNOWN` and zero rates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PageReport {
    pub mode: Option<Classification>,
    pub behavior: Option<BehaviorSample>,
    pub url: Option<String>,
}

impl PageReport {
    pub fn page_mode(&self) -> PageMode {
        self.mode.map(|c| c.mode).unwrap_or_default()
    }

    pub fn behavior(&self) -> BehaviorSample {
        self.behavior.unwrap_or_default().sanitized()
    }
}

/// The tab that currently has focus, as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveContext {
    pub id: ContextId,
    pub url: String,
}

/// Per-tab content layer: classification, behaviour counters, overlay.
pub trait ContentBridge: Send + Sync + 'static {
    fn get_state(&self, id: ContextId) -> impl Future<Output = Delivery<PageReport>> + Send;

    fn show_overlay(
        &self,
        id: ContextId,
        message: &str,
    ) -> impl Future<Output = Delivery<()>> + Send;
}

/// Tab queries against the browser.
pub trait BrowserTabs: Send + Sync + 'static {
    fn active_context(&self) -> impl Future<Output = Option<ActiveContext>> + Send;

    fn context_url(&self, id: ContextId) -> impl Future<Output = Delivery<String>> + Send;
}

/// Enabled flag and resolved settings, read fresh on every tick.
pub trait SettingsSource: Send + Sync + 'static {
    fn is_enabled(&self) -> impl Future<Output = bool> + Send;

    fn effective_settings(&self) -> impl Future<Output = EffectiveSettings> + Send;
}

pub trait MetricsSink: Send + Sync + 'static {
    fn record_nudge_shown(&self, at_ms: TimestampMs) -> impl Future<Output = Delivery<()>> + Send;

    /// `Ok(true)` iff a nudge inside the early-exit window was consumed.
    fn maybe_record_early_exit(
        &self,
        at_ms: TimestampMs,
    ) -> impl Future<Output = Delivery<bool>> + Send;
}

impl SettingsSource for SettingsStore {
    async fn is_enabled(&self) -> bool {
        SettingsStore::is_enabled(self)
    }

    async fn effective_settings(&self) -> EffectiveSettings {
        SettingsStore::effective_settings(self)
    }
}

/// Whether a URL belongs to the monitored site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteMatcher {
    prefix: String,
}

impl SiteMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        !self.prefix.is_empty() && url.starts_with(&self.prefix)
    }
}
