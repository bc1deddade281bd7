use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bridge::{BrowserTabs, ContextId, Delivery, MetricsSink, SiteMatcher};
use crate::clock::TimestampMs;
use crate::engine::ContextStore;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Tab lifecycle notifications from the browser runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BrowserEvent {
    /// A tab gained focus.
    Activated { id: ContextId },
    /// A tab finished loading a URL.
    Updated { id: ContextId, url: String },
    Removed { id: ContextId },
}

impl BrowserEvent {
    pub fn context(&self) -> ContextId {
        match self {
            BrowserEvent::Activated { id }
            | BrowserEvent::Updated { id, .. }
            | BrowserEvent::Removed { id } => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCheck {
    /// The context is on the monitored site and is now the tracked one.
    Tracking(ContextId),
    /// Nothing to do for this event.
    Ignored,
    /// The tracked context is still on the site; it only lost focus.
    FalseAlarm(ContextId),
    /// The tracked context left the site or closed. `recorded` is true when
    /// the departure counted as an early exit.
    Departed { id: ContextId, recorded: bool },
}

/// Detects the user leaving the monitored site shortly after a nudge.
pub struct ExitWatcher<B, M> {
    tabs: Arc<B>,
    metrics: Arc<M>,
    store: Arc<ContextStore>,
    site: SiteMatcher,
    tracked: Option<ContextId>,
}

impl<B, M> ExitWatcher<B, M>
where
    B: BrowserTabs,
    M: MetricsSink,
{
    pub fn new(tabs: Arc<B>, metrics: Arc<M>, store: Arc<ContextStore>, site: SiteMatcher) -> Self {
        Self {
            tabs,
            metrics,
            store,
            site,
            tracked: None,
        }
    }

    pub fn tracked(&self) -> Option<ContextId> {
        self.tracked
    }

    pub async fn handle(&mut self, event: &BrowserEvent, now_ms: TimestampMs) -> ExitCheck {
        match event {
            BrowserEvent::Activated { id } => self.on_activated(*id, now_ms).await,
            BrowserEvent::Updated { id, url } => self.on_updated(*id, url, now_ms).await,
            BrowserEvent::Removed { id } => self.on_removed(*id, now_ms).await,
        }
    }

    async fn on_activated(&mut self, id: ContextId, now_ms: TimestampMs) -> ExitCheck {
        let url = match self.tabs.context_url(id).await {
            Delivery::Ok(url) => url,
            _ => {
                log_debug!("activated {} vanished before it could be inspected", id);
                self.tracked = None;
                return ExitCheck::Ignored;
            }
        };

        if self.site.matches(&url) {
            self.tracked = Some(id);
            return ExitCheck::Tracking(id);
        }

        let Some(previous) = self.tracked else {
            return ExitCheck::Ignored;
        };
        if previous == id {
            return self.departed(previous, now_ms).await;
        }

        // Focus moved elsewhere; only count it if the old tab really left.
        match self.tabs.context_url(previous).await {
            Delivery::Ok(previous_url) if self.site.matches(&previous_url) => {
                ExitCheck::FalseAlarm(previous)
            }
            _ => self.departed(previous, now_ms).await,
        }
    }

    async fn on_updated(&mut self, id: ContextId, url: &str, now_ms: TimestampMs) -> ExitCheck {
        if self.site.matches(url) {
            self.tracked = Some(id);
            return ExitCheck::Tracking(id);
        }
        if self.tracked == Some(id) {
            return self.departed(id, now_ms).await;
        }
        ExitCheck::Ignored
    }

    async fn on_removed(&mut self, id: ContextId, now_ms: TimestampMs) -> ExitCheck {
        self.store.remove(id);
        if self.tracked == Some(id) {
            return self.departed(id, now_ms).await;
        }
        ExitCheck::Ignored
    }

    async fn departed(&mut self, id: ContextId, now_ms: TimestampMs) -> ExitCheck {
        self.tracked = None;
        let recorded = match self.metrics.maybe_record_early_exit(now_ms).await {
            Delivery::Ok(recorded) => recorded,
            Delivery::Unavailable => {
                log_warn!("metrics unavailable; departure of {} not evaluated", id);
                false
            }
            Delivery::TransportError(err) => {
                log_warn!("failed to evaluate departure of {}: {}", id, err);
                false
            }
        };
        ExitCheck::Departed { id, recorded }
    }
}
