//! Epoch-millisecond helpers.
//!
//! Subjects and sayings store their timestamps as integer milliseconds since
//! the Unix epoch so lease deadlines compare exactly across writers.

use chrono::{DateTime, TimeZone, Utc};

/// Milliseconds since the Unix epoch.
pub type EpochMillis = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> EpochMillis {
    Utc::now().timestamp_millis()
}

/// Convert epoch milliseconds to a UTC datetime, if representable.
pub fn to_datetime(millis: EpochMillis) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
