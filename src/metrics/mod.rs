mod types;
mod week;

pub use types::{WeeklyCounters, WeeklySummary, MINUTES_PER_EARLY_EXIT};
pub use week::week_start_ms;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::bridge::{Delivery, MetricsSink};
use crate::clock::TimestampMs;
use crate::db::{to_i64, to_u64, Database};

/// A departure this soon after a nudge counts as an early exit.
pub const EARLY_EXIT_WINDOW_MS: i64 = 120_000;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Weekly nudge and early-exit counters, persisted in SQLite.
#[derive(Clone)]
pub struct WeeklyMetrics {
    db: Database,
}

fn load(conn: &Connection) -> Result<Option<WeeklyCounters>> {
    conn.query_row(
        "SELECT week_start_ms, nudges_fired_weekly, early_exits_weekly, last_nudge_shown_ms
         FROM weekly_metrics WHERE id = 1",
        [],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<i64>>(3)?,
            ))
        },
    )
    .optional()
    .context("failed to read weekly metrics")?
    .map(|(week_start_ms, nudges, exits, last_nudge)| -> Result<WeeklyCounters> {
        Ok(WeeklyCounters {
            week_start_ms,
            nudges_fired_weekly: to_u64(nudges, "nudges_fired_weekly")?,
            early_exits_weekly: to_u64(exits, "early_exits_weekly")?,
            last_nudge_shown_ms: last_nudge,
        })
    })
    .transpose()
}

fn store(conn: &Connection, counters: &WeeklyCounters) -> Result<()> {
    conn.execute(
        "INSERT INTO weekly_metrics
             (id, week_start_ms, nudges_fired_weekly, early_exits_weekly, last_nudge_shown_ms)
         VALUES (1, ?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             week_start_ms = excluded.week_start_ms,
             nudges_fired_weekly = excluded.nudges_fired_weekly,
             early_exits_weekly = excluded.early_exits_weekly,
             last_nudge_shown_ms = excluded.last_nudge_shown_ms",
        params![
            counters.week_start_ms,
            to_i64(counters.nudges_fired_weekly)?,
            to_i64(counters.early_exits_weekly)?,
            counters.last_nudge_shown_ms,
        ],
    )
    .context("failed to write weekly metrics")?;
    Ok(())
}

/// Counters for the week starting at `week_start`, resetting stale ones.
fn current_week(conn: &Connection, week_start: TimestampMs) -> Result<WeeklyCounters> {
    match load(conn)? {
        Some(counters) if counters.week_start_ms == week_start => Ok(counters),
        _ => {
            let fresh = WeeklyCounters::fresh(week_start);
            store(conn, &fresh)?;
            Ok(fresh)
        }
    }
}

/// Apply `change` to this week's counters inside one transaction.
fn modify<T>(
    conn: &mut Connection,
    at_ms: TimestampMs,
    change: impl FnOnce(&mut WeeklyCounters) -> T,
) -> Result<T> {
    let tx = conn.transaction().context("failed to open metrics transaction")?;
    let mut counters = current_week(&tx, week_start_ms(at_ms))?;
    let result = change(&mut counters);
    store(&tx, &counters)?;
    tx.commit().context("failed to commit weekly metrics")?;
    Ok(result)
}

impl WeeklyMetrics {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Reset the counters if `at_ms` falls in a different week than stored.
    pub async fn ensure_week_initialized(&self, at_ms: TimestampMs) -> Result<()> {
        self.db
            .execute(move |conn| modify(conn, at_ms, |_| ()))
            .await
    }

    pub async fn record_nudge_shown(&self, at_ms: TimestampMs) -> Result<()> {
        self.db
            .execute(move |conn| {
                modify(conn, at_ms, |counters| {
                    counters.nudges_fired_weekly += 1;
                    counters.last_nudge_shown_ms = Some(at_ms);
                })
            })
            .await
    }

    /// Counts an early exit if the last nudge was shown within the window
    /// before `exit_ms`, consuming the marker so one nudge counts at most once.
    pub async fn maybe_record_early_exit(&self, exit_ms: TimestampMs) -> Result<bool> {
        let recorded = self
            .db
            .execute(move |conn| {
                modify(conn, exit_ms, |counters| {
                    let Some(shown_at) = counters.last_nudge_shown_ms else {
                        return false;
                    };
                    let since_nudge = exit_ms - shown_at;
                    if since_nudge > 0 && since_nudge <= EARLY_EXIT_WINDOW_MS {
                        counters.early_exits_weekly += 1;
                        counters.last_nudge_shown_ms = None;
                        true
                    } else {
                        false
                    }
                })
            })
            .await?;

        if recorded {
            log_info!("early exit recorded at {}", exit_ms);
        }
        Ok(recorded)
    }

    pub async fn counters(&self, at_ms: TimestampMs) -> Result<WeeklyCounters> {
        self.db
            .execute(move |conn| modify(conn, at_ms, |counters| *counters))
            .await
    }

    pub async fn weekly_summary(&self, at_ms: TimestampMs) -> Result<WeeklySummary> {
        Ok(self.counters(at_ms).await?.summary())
    }

    pub async fn reset_weekly_summary(&self, at_ms: TimestampMs) -> Result<()> {
        self.db
            .execute(move |conn| {
                modify(conn, at_ms, |counters| {
                    *counters = WeeklyCounters::fresh(counters.week_start_ms);
                })
            })
            .await
    }
}

impl MetricsSink for WeeklyMetrics {
    async fn record_nudge_shown(&self, at_ms: TimestampMs) -> Delivery<()> {
        WeeklyMetrics::record_nudge_shown(self, at_ms).await.into()
    }

    async fn maybe_record_early_exit(&self, at_ms: TimestampMs) -> Delivery<bool> {
        WeeklyMetrics::maybe_record_early_exit(self, at_ms).await.into()
    }
}
