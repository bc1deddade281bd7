use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::bridge::{BrowserTabs, ContentBridge, MetricsSink, SettingsSource};
use crate::clock::Clock;

use super::tick::{TickLoop, TickOutcome};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Owns the background task that drives [`TickLoop`] at a fixed cadence.
pub struct TickController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Default for TickController {
    fn default() -> Self {
        Self::new()
    }
}

impl TickController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start<B, C, S, M, K>(
        &mut self,
        engine: Arc<TickLoop<C, S, M>>,
        tabs: Arc<B>,
        clock: Arc<K>,
        interval: Duration,
        verbose: bool,
    ) -> Result<()>
    where
        B: BrowserTabs,
        C: ContentBridge,
        S: SettingsSource,
        M: MetricsSink,
        K: Clock,
    {
        if self.handle.is_some() {
            bail!("tick loop already running");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(
            engine,
            tabs,
            clock,
            interval,
            verbose,
            cancel_token.clone(),
        ));

        info!("tick loop started ({}ms interval)", interval.as_millis());
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("tick loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

async fn tick_loop<B, C, S, M, K>(
    engine: Arc<TickLoop<C, S, M>>,
    tabs: Arc<B>,
    clock: Arc<K>,
    interval: Duration,
    verbose: bool,
    cancel_token: CancellationToken,
) where
    B: BrowserTabs,
    C: ContentBridge,
    S: SettingsSource,
    M: MetricsSink,
    K: Clock,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let enabled = engine.settings().is_enabled().await;
                let active = if enabled { tabs.active_context().await } else { None };
                let outcome = engine.tick_once(clock.now_ms(), enabled, active.as_ref()).await;
                report(&outcome, verbose);
            }
            _ = cancel_token.cancelled() => {
                log_info!("tick loop shutting down");
                break;
            }
        }
    }
}

fn report(outcome: &TickOutcome, verbose: bool) {
    if !verbose {
        return;
    }
    match outcome {
        TickOutcome::Evaluated { id, drift_ms, .. } => {
            log_info!("tick {}: drift {}ms", id, drift_ms);
        }
        other => log_debug!("tick: {:?}", other),
    }
}
