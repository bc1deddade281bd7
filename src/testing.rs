//! In-memory stand-ins for the browser runtime, used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::bridge::{
    ActiveContext, BrowserTabs, Classification, ContentBridge, ContextId, Delivery, MetricsSink,
    PageReport,
};
use crate::clock::TimestampMs;
use crate::drift::{BehaviorSample, PageMode};

pub fn drift_report() -> PageReport {
    PageReport {
        mode: Some(Classification {
            mode: PageMode::Drift,
            confidence: 0.9,
        }),
        behavior: Some(BehaviorSample::new(5.0, 2.0, 0.0)),
        url: Some("https://www.linkedin.com/feed/".into()),
    }
}

pub struct FakeContent {
    report: Mutex<Delivery<PageReport>>,
    overlay_result: Mutex<Delivery<()>>,
    overlays: Mutex<Vec<(ContextId, String)>>,
    state_requests: AtomicUsize,
    stalled: AtomicBool,
}

impl FakeContent {
    pub fn new(report: PageReport) -> Self {
        Self {
            report: Mutex::new(Delivery::Ok(report)),
            overlay_result: Mutex::new(Delivery::Ok(())),
            overlays: Mutex::new(Vec::new()),
            state_requests: AtomicUsize::new(0),
            stalled: AtomicBool::new(false),
        }
    }

    pub fn set_report(&self, report: Delivery<PageReport>) {
        *self.report.lock().unwrap() = report;
    }

    pub fn set_overlay_result(&self, result: Delivery<()>) {
        *self.overlay_result.lock().unwrap() = result;
    }

    /// Make `get_state` hang until the caller gives up.
    pub fn stall(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn state_requests(&self) -> usize {
        self.state_requests.load(Ordering::SeqCst)
    }

    pub fn overlays(&self) -> Vec<(ContextId, String)> {
        self.overlays.lock().unwrap().clone()
    }
}

impl ContentBridge for FakeContent {
    async fn get_state(&self, _id: ContextId) -> Delivery<PageReport> {
        self.state_requests.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.report.lock().unwrap().clone()
    }

    async fn show_overlay(&self, id: ContextId, message: &str) -> Delivery<()> {
        let result = self.overlay_result.lock().unwrap().clone();
        if result.is_ok() {
            self.overlays.lock().unwrap().push((id, message.to_string()));
        }
        result
    }
}

#[derive(Default)]
pub struct FakeMetrics {
    nudges: Mutex<Vec<TimestampMs>>,
    exits: Mutex<Vec<TimestampMs>>,
    failure: Mutex<Option<String>>,
}

impl FakeMetrics {
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn nudges(&self) -> Vec<TimestampMs> {
        self.nudges.lock().unwrap().clone()
    }

    pub fn exits(&self) -> Vec<TimestampMs> {
        self.exits.lock().unwrap().clone()
    }
}

impl MetricsSink for FakeMetrics {
    async fn record_nudge_shown(&self, at_ms: TimestampMs) -> Delivery<()> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Delivery::TransportError(message);
        }
        self.nudges.lock().unwrap().push(at_ms);
        Delivery::Ok(())
    }

    async fn maybe_record_early_exit(&self, at_ms: TimestampMs) -> Delivery<bool> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Delivery::TransportError(message);
        }
        self.exits.lock().unwrap().push(at_ms);
        Delivery::Ok(true)
    }
}

#[derive(Default)]
pub struct FakeTabs {
    urls: Mutex<HashMap<ContextId, String>>,
    active: Mutex<Option<ContextId>>,
}

impl FakeTabs {
    pub fn open(&self, id: ContextId, url: &str) {
        self.urls.lock().unwrap().insert(id, url.to_string());
    }

    pub fn close(&self, id: ContextId) {
        self.urls.lock().unwrap().remove(&id);
        let mut active = self.active.lock().unwrap();
        if *active == Some(id) {
            *active = None;
        }
    }

    pub fn focus(&self, id: ContextId) {
        *self.active.lock().unwrap() = Some(id);
    }
}

impl BrowserTabs for FakeTabs {
    async fn active_context(&self) -> Option<ActiveContext> {
        let id = (*self.active.lock().unwrap())?;
        let url = self.urls.lock().unwrap().get(&id).cloned()?;
        Some(ActiveContext { id, url })
    }

    async fn context_url(&self, id: ContextId) -> Delivery<String> {
        match self.urls.lock().unwrap().get(&id) {
            Some(url) => Delivery::Ok(url.clone()),
            None => Delivery::Unavailable,
        }
    }
}
