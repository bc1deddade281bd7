use chrono::{DateTime, Datelike, Days, Local, TimeZone};

use crate::clock::TimestampMs;

/// Monday 00:00 local time of the week containing `at_ms`.
pub fn week_start_ms(at_ms: TimestampMs) -> TimestampMs {
    let Some(utc) = DateTime::from_timestamp_millis(at_ms) else {
        return at_ms;
    };
    let local = utc.with_timezone(&Local);
    let days_since_monday = u64::from(local.weekday().num_days_from_monday());

    let Some(monday) = local.date_naive().checked_sub_days(Days::new(days_since_monday)) else {
        return at_ms;
    };
    let Some(midnight) = monday.and_hms_opt(0, 0, 0) else {
        return at_ms;
    };

    // A DST gap at midnight has no local instant; fall back to the UTC reading.
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| midnight.and_utc().timestamp_millis())
}
