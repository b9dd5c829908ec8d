//! Epoch time helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Convert a `SystemTime` to integer milliseconds since the Unix epoch.
///
/// Times before the epoch yield negative values.
pub fn system_time_to_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_millis() as i64,
        Err(before) => -(before.duration().as_millis() as i64),
    }
}
