//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds since the Unix epoch, the storage form used by the cache tables
pub fn to_unix_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}
