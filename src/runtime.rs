use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::bridge::{BrowserTabs, ContentBridge, SiteMatcher};
use crate::clock::{Clock, TimestampMs};
use crate::commands::{self, Request};
use crate::config::EngineConfig;
use crate::db::Database;
use crate::engine::{ContextStore, TickController, TickLoop, TickOutcome};
use crate::exit_watch::{BrowserEvent, ExitCheck, ExitWatcher};
use crate::metrics::WeeklyMetrics;
use crate::settings::SettingsStore;
use crate::utils::init_logging;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Background-process state: the tick engine, the exit watcher and the
/// collaborators they share.
pub struct NudgeRuntime<B, C> {
    config: EngineConfig,
    settings: Arc<SettingsStore>,
    metrics: Arc<WeeklyMetrics>,
    store: Arc<ContextStore>,
    tabs: Arc<B>,
    engine: Arc<TickLoop<C, SettingsStore, WeeklyMetrics>>,
    watcher: Mutex<ExitWatcher<B, WeeklyMetrics>>,
    controller: Mutex<TickController>,
}

impl<B, C> NudgeRuntime<B, C>
where
    B: BrowserTabs,
    C: ContentBridge,
{
    pub fn new(
        config: EngineConfig,
        settings: Arc<SettingsStore>,
        metrics: Arc<WeeklyMetrics>,
        tabs: Arc<B>,
        content: Arc<C>,
    ) -> Self {
        let store = Arc::new(ContextStore::new());
        let engine = Arc::new(TickLoop::new(
            &config,
            store.clone(),
            content,
            settings.clone(),
            metrics.clone(),
        ));
        let watcher = ExitWatcher::new(
            tabs.clone(),
            metrics.clone(),
            store.clone(),
            SiteMatcher::new(config.site_prefix.clone()),
        );

        Self {
            config,
            settings,
            metrics,
            store,
            tabs,
            engine,
            watcher: Mutex::new(watcher),
            controller: Mutex::new(TickController::new()),
        }
    }

    /// Settings and metrics under `data_dir`; `FOCUS_NUDGE_DEBUG` applies on top of `config`.
    pub fn open(
        config: EngineConfig,
        data_dir: &Path,
        tabs: Arc<B>,
        content: Arc<C>,
    ) -> Result<Self> {
        init_logging();
        let config = config.with_env_overrides();
        log_info!("focus-nudge starting up (data dir {})", data_dir.display());

        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        let database = Database::new(data_dir.join("focus-nudge.sqlite3"))?;

        Ok(Self::new(
            config,
            Arc::new(settings),
            Arc::new(WeeklyMetrics::new(database)),
            tabs,
            content,
        ))
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<WeeklyMetrics> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<ContextStore> {
        &self.store
    }

    pub async fn on_startup(&self, now_ms: TimestampMs) -> Result<()> {
        self.metrics.ensure_week_initialized(now_ms).await
    }

    pub async fn on_install(&self, now_ms: TimestampMs) -> Result<()> {
        self.metrics.ensure_week_initialized(now_ms).await?;
        self.settings.set_enabled(true)
    }

    /// One evaluation, sourcing the enabled flag and focused tab first.
    pub async fn tick(&self, now_ms: TimestampMs) -> TickOutcome {
        let enabled = self.settings.is_enabled();
        let active = if enabled {
            self.tabs.active_context().await
        } else {
            None
        };
        self.engine.tick_once(now_ms, enabled, active.as_ref()).await
    }

    pub async fn handle_browser_event(
        &self,
        event: &BrowserEvent,
        now_ms: TimestampMs,
    ) -> ExitCheck {
        let check = self.watcher.lock().await.handle(event, now_ms).await;
        if let ExitCheck::Departed { id, recorded: true } = check {
            log_info!("{} left the monitored site shortly after a nudge", id);
        }
        check
    }

    pub async fn handle_request(&self, request: Request, now_ms: TimestampMs) -> Value {
        commands::handle_request(request, &self.settings, &self.metrics, now_ms).await
    }

    pub async fn handle_message(&self, raw: &str, now_ms: TimestampMs) -> Value {
        commands::handle_message(raw, &self.settings, &self.metrics, now_ms).await
    }

    pub async fn start<K: Clock>(&self, clock: Arc<K>) -> Result<()> {
        if let Err(err) = self.on_startup(clock.now_ms()).await {
            log_error!("failed to initialise weekly metrics: {err:#}");
        }
        self.controller.lock().await.start(
            self.engine.clone(),
            self.tabs.clone(),
            clock,
            self.config.tick_interval(),
            self.config.debug,
        )
    }

    pub async fn stop(&self) -> Result<()> {
        self.controller.lock().await.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ContextId;
    use crate::testing::{drift_report, FakeContent, FakeTabs};
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};

    const LI: ContextId = ContextId(3);
    const MAIL: ContextId = ContextId(4);
    const T0: TimestampMs = 1_700_000_000_000;

    fn runtime() -> (NudgeRuntime<FakeTabs, FakeContent>, Arc<FakeTabs>, Arc<FakeContent>) {
        let tabs = Arc::new(FakeTabs::default());
        let content = Arc::new(FakeContent::new(drift_report()));
        let runtime = NudgeRuntime::new(
            EngineConfig::default(),
            Arc::new(SettingsStore::in_memory()),
            Arc::new(WeeklyMetrics::new(Database::open_in_memory().unwrap())),
            tabs.clone(),
            content.clone(),
        );
        (runtime, tabs, content)
    }

    #[tokio::test]
    async fn nudge_then_quick_exit_shows_in_weekly_summary() {
        let (runtime, tabs, content) = runtime();
        runtime.on_install(T0).await.unwrap();

        tabs.open(LI, "https://www.linkedin.com/feed/");
        tabs.open(MAIL, "https://mail.example.com/");
        tabs.focus(LI);
        runtime
            .handle_browser_event(&BrowserEvent::Activated { id: LI }, T0)
            .await;

        let mut t = T0;
        let mut nudged_at = None;
        while nudged_at.is_none() && t <= T0 + 1_000_000 {
            if let TickOutcome::Evaluated { nudge: Some(event), .. } = runtime.tick(t).await {
                nudged_at = Some(event.at_ms);
            }
            t += 5_000;
        }
        let nudged_at = nudged_at.expect("nudge should fire");
        assert_eq!(nudged_at, T0 + 900_000);
        assert_eq!(content.overlays().len(), 1);

        tabs.open(LI, "https://news.example.com/");
        tabs.focus(MAIL);
        let check = runtime
            .handle_browser_event(&BrowserEvent::Activated { id: MAIL }, nudged_at + 30_000)
            .await;
        assert_eq!(check, ExitCheck::Departed { id: LI, recorded: true });

        let summary = runtime
            .handle_message(r#"{"type":"GET_WEEKLY_SUMMARY"}"#, nudged_at + 31_000)
            .await;
        assert_eq!(
            summary,
            json!({"nudges": 1, "early_exits": 1, "estimated_minutes": 5})
        );
    }

    #[tokio::test]
    async fn disabled_runtime_does_not_track() {
        let (runtime, tabs, _) = runtime();
        tabs.open(LI, "https://www.linkedin.com/feed/");
        tabs.focus(LI);

        runtime
            .handle_request(Request::SetEnabled { enabled: false }, T0)
            .await;
        assert_eq!(runtime.tick(T0).await, TickOutcome::Disabled);
        assert!(runtime.store().is_empty());

        runtime.on_install(T0).await.unwrap();
        assert!(matches!(runtime.tick(T0 + 5_000).await, TickOutcome::Evaluated { .. }));
    }

    #[tokio::test]
    async fn closing_a_tab_drops_its_state() {
        let (runtime, tabs, _) = runtime();
        tabs.open(LI, "https://www.linkedin.com/feed/");
        tabs.focus(LI);
        runtime.tick(T0).await;
        assert!(runtime.store().contains(LI));

        tabs.close(LI);
        runtime
            .handle_browser_event(&BrowserEvent::Removed { id: LI }, T0 + 1)
            .await;
        runtime
            .handle_browser_event(&BrowserEvent::Removed { id: LI }, T0 + 2)
            .await;
        assert!(!runtime.store().contains(LI));
        assert_eq!(runtime.tick(T0 + 5_000).await, TickOutcome::NoActiveContext);
    }

    struct FixedStepClock(AtomicI64);

    impl Clock for FixedStepClock {
        fn now_ms(&self) -> TimestampMs {
            self.0.fetch_add(5_000, Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_background_loop() {
        let dir =
            std::env::temp_dir().join(format!("focus-nudge-runtime-{}", uuid::Uuid::new_v4()));
        let tabs = Arc::new(FakeTabs::default());
        tabs.open(LI, "https://www.linkedin.com/feed/");
        tabs.focus(LI);
        let runtime = NudgeRuntime::open(
            EngineConfig::default(),
            &dir,
            tabs,
            Arc::new(FakeContent::new(drift_report())),
        )
        .unwrap();

        runtime
            .start(Arc::new(FixedStepClock(AtomicI64::new(T0))))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        runtime.stop().await.unwrap();

        let state = runtime.store().get(LI).unwrap();
        assert!(state.accumulated_drift_ms > 0);
        assert!(dir.join("focus-nudge.sqlite3").exists());

        drop(runtime);
        let _ = std::fs::remove_dir_all(dir);
    }
}
