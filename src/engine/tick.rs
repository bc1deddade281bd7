use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::bridge::{
    ActiveContext, ContentBridge, ContextId, Delivery, MetricsSink, SettingsSource, SiteMatcher,
};
use crate::clock::TimestampMs;
use crate::config::EngineConfig;
use crate::drift::{self, DriftTuning};
use crate::nudge::{self, Tone};

use super::store::ContextStore;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NudgeEvent {
    pub id: Uuid,
    pub context: ContextId,
    pub at_ms: TimestampMs,
    pub tone: Tone,
    pub message: String,
    /// Whether the overlay request reached the page.
    pub delivered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Disabled,
    NoActiveContext,
    /// The content layer gave no data; timing was still advanced.
    SampleUnavailable { id: ContextId },
    /// The context was removed while the tick was in flight.
    ContextGone { id: ContextId },
    Evaluated {
        id: ContextId,
        drift_ms: u64,
        nudge: Option<NudgeEvent>,
    },
}

/// One evaluation step against the foreground context. Owns nothing but the
/// handles it is given; the per-context table lives in [`ContextStore`].
pub struct TickLoop<C, S, M> {
    store: Arc<ContextStore>,
    content: Arc<C>,
    settings: Arc<S>,
    metrics: Arc<M>,
    site: SiteMatcher,
    tuning: DriftTuning,
    sample_timeout: Duration,
}

impl<C, S, M> TickLoop<C, S, M>
where
    C: ContentBridge,
    S: SettingsSource,
    M: MetricsSink,
{
    pub fn new(
        config: &EngineConfig,
        store: Arc<ContextStore>,
        content: Arc<C>,
        settings: Arc<S>,
        metrics: Arc<M>,
    ) -> Self {
        Self {
            store,
            content,
            settings,
            metrics,
            site: SiteMatcher::new(config.site_prefix.clone()),
            tuning: config.tuning,
            sample_timeout: config.sample_timeout(),
        }
    }

    pub fn store(&self) -> &Arc<ContextStore> {
        &self.store
    }

    pub fn settings(&self) -> &Arc<S> {
        &self.settings
    }

    /// `enabled` and `active` are sourced by the caller once per tick; this
    /// never fails, every external hiccup becomes a [`TickOutcome`].
    pub async fn tick_once(
        &self,
        now_ms: TimestampMs,
        enabled: bool,
        active: Option<&ActiveContext>,
    ) -> TickOutcome {
        if !enabled {
            return TickOutcome::Disabled;
        }

        let Some(active) = active.filter(|ctx| self.site.matches(&ctx.url)) else {
            return TickOutcome::NoActiveContext;
        };
        let id = active.id;

        let ticket = self.store.begin_tick(id, now_ms);
        if ticket.created {
            log_debug!("tracking {} ({})", id, active.url);
        }

        let report = tokio::select! {
            biased;
            _ = ticket.cancelled().cancelled() => {
                return TickOutcome::ContextGone { id };
            }
            result = tokio::time::timeout(self.sample_timeout, self.content.get_state(id)) => {
                match result {
                    Ok(Delivery::Ok(report)) => report,
                    Ok(Delivery::Unavailable) => {
                        log_debug!("no sample from {}: content layer not ready", id);
                        return TickOutcome::SampleUnavailable { id };
                    }
                    Ok(Delivery::TransportError(err)) => {
                        log_debug!("no sample from {}: {}", id, err);
                        return TickOutcome::SampleUnavailable { id };
                    }
                    Err(_) => {
                        log_warn!(
                            "sample request to {} timed out (> {}ms)",
                            id,
                            self.sample_timeout.as_millis()
                        );
                        return TickOutcome::SampleUnavailable { id };
                    }
                }
            }
        };

        let mode = report.page_mode();
        let behavior = report.behavior();
        let mut state = drift::update(
            ticket.state.clone(),
            ticket.elapsed_ms,
            mode,
            &behavior,
            &self.tuning,
        );

        let settings = self.settings.effective_settings().await;

        let mut fired = None;
        if nudge::should_nudge(&state, &settings, now_ms) {
            let message = nudge::pick_message(settings.tone.as_str());

            let delivered = match self.content.show_overlay(id, message).await {
                Delivery::Ok(()) => true,
                Delivery::Unavailable => {
                    log_warn!("nudge overlay for {} not delivered: page unavailable", id);
                    false
                }
                Delivery::TransportError(err) => {
                    log_warn!("nudge overlay for {} not delivered: {}", id, err);
                    false
                }
            };

            // Applied even on failed delivery so a broken page is not retried every tick.
            state = nudge::on_nudge_fired(state, &settings, now_ms, &self.tuning);

            if delivered {
                match self.metrics.record_nudge_shown(now_ms).await {
                    Delivery::Ok(()) => {}
                    Delivery::Unavailable => log_warn!("metrics unavailable; nudge not counted"),
                    Delivery::TransportError(err) => {
                        log_warn!("failed to record nudge for {}: {}", id, err)
                    }
                }
            }

            log_info!(
                "nudge fired for {} (tone={}, delivered={})",
                id,
                settings.tone.as_str(),
                delivered
            );

            fired = Some(NudgeEvent {
                id: Uuid::new_v4(),
                context: id,
                at_ms: now_ms,
                tone: settings.tone,
                message: message.to_string(),
                delivered,
            });
        }

        let drift_ms = state.accumulated_drift_ms;
        if !self.store.commit(&ticket, state) {
            log_debug!("{} removed mid-tick; discarding update", id);
            return TickOutcome::ContextGone { id };
        }

        TickOutcome::Evaluated {
            id,
            drift_ms,
            nudge: fired,
        }
    }
}
