use chrono::Utc;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> TimestampMs;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        Utc::now().timestamp_millis()
    }
}
