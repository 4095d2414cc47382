//! Time utilities for SDID.
//!
//! Timestamps are UTC `chrono::DateTime` values. On the wire they are
//! RFC 3339 strings with millisecond precision and a `Z` suffix, the same
//! shape a browser's `Date.prototype.toISOString` produces.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Return the current time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp as RFC 3339 with millisecond precision.
pub fn to_rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp, returning `None` when malformed.
pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Milliseconds since the Unix epoch, used for opaque token prefixes.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// `at + minutes`, saturating at the maximum representable time.
pub fn add_minutes(at: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    at.checked_add_signed(Duration::minutes(minutes))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
