//! The outcome of one sync run

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Counters and failures from one notebook or root sync. Clone, so a
/// coalesced waiter can receive the same report as the run it joined;
/// serializable so observers can log or ship it as structured data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub downloaded: usize,
    pub uploaded: usize,
    pub deleted_remote: usize,
    pub deleted_local: usize,
    /// Entries that diverged on both sides and were auto-resolved by LWW.
    pub conflicts: usize,
    /// True when the run stopped at the cancellation token. A cancelled run
    /// carries exactly one sentinel entry in `errors`.
    pub cancelled: bool,
    /// Per-entry failures. The run keeps going past them; a non-empty list
    /// means the run needs a rerun to fully converge.
    pub errors: Vec<String>,
    pub duration: Duration,
}

impl SyncReport {
    /// A run succeeded when nothing failed and nobody cancelled it.
    pub fn success(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }

    /// Total entries moved or removed by this run.
    pub fn transferred(&self) -> usize {
        self.downloaded + self.uploaded + self.deleted_remote + self.deleted_local
    }
}
