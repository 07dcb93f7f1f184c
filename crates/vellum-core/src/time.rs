//! Millisecond timestamps used for Last-Write-Wins ordering.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. Millisecond granularity keeps rapid
/// successive edits ordered, which second-level timestamps would collapse.
pub type Timestamp = u64;

/// Current wall-clock time as a [`Timestamp`].
pub fn now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
