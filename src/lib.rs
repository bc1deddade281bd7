pub mod bridge;
pub mod clock;
pub mod commands;
pub mod config;
pub mod db;
pub mod drift;
pub mod engine;
pub mod exit_watch;
pub mod metrics;
pub mod nudge;
pub mod runtime;
pub mod settings;
pub mod utils;

#[cfg(test)]
mod testing;

pub use bridge::{
    ActiveContext, BrowserTabs, Classification, ContentBridge, ContextId, Delivery, MetricsSink,
    PageReport, SettingsSource, SiteMatcher,
};
pub use clock::{Clock, SystemClock, TimestampMs};
pub use commands::Request;
pub use config::EngineConfig;
pub use drift::{BehaviorSample, DriftState, DriftTuning, PageMode};
pub use engine::{NudgeEvent, TickOutcome};
pub use exit_watch::{BrowserEvent, ExitCheck};
pub use metrics::{WeeklyMetrics, WeeklySummary};
pub use nudge::Tone;
pub use runtime::NudgeRuntime;
pub use settings::{EffectiveSettings, PlanSource, PlanStatus, SettingsStore, UserSettings};
pub use utils::init_logging;
