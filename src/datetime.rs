//! Date/time utilities.
//!
//! All stores keep timestamps as INTEGER unix milliseconds (UTC), which
//! keeps window comparisons (`start_time <= now < end_time`) plain integer
//! comparisons inside SQLite.

use chrono::{DateTime, TimeZone, Utc};

/// Current time as unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a `DateTime<Utc>` to unix milliseconds.
pub fn to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Convert unix milliseconds to a `DateTime<Utc>`.
///
/// Out-of-range values clamp to the unix epoch.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Format unix milliseconds as RFC3339 for API responses.
pub fn millis_to_rfc3339(millis: i64) -> String {
    from_millis(millis).to_rfc3339()
}
