//! # Time Utilities
//!
//! Wall-clock helpers using chrono. Persisted cache timestamps are Unix milliseconds.

use chrono::Utc;

/// Current time as milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Milliseconds elapsed since `timestamp_ms`.
///
/// Timestamps in the future (clock skew, tampered storage) yield `None` so callers
/// treat them as invalid rather than as infinitely fresh.
pub fn age_millis(timestamp_ms: i64) -> Option<u64> {
    let age = now_millis().checked_sub(timestamp_ms)?;
    u64::try_from(age).ok()
}
