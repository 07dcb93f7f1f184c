//! Sync phases and the progress callback

use serde::{Deserialize, Serialize};

/// Where a sync run currently is. Phases always occur in declaration order;
/// root syncs move no blobs and skip the four transfer phases entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    FetchingManifest,
    Comparing,
    Downloading,
    Uploading,
    DeletingRemote,
    DeletingLocal,
    SavingManifest,
    Idle,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncPhase::FetchingManifest => "fetching_manifest",
            SyncPhase::Comparing => "comparing",
            SyncPhase::Downloading => "downloading",
            SyncPhase::Uploading => "uploading",
            SyncPhase::DeletingRemote => "deleting_remote",
            SyncPhase::DeletingLocal => "deleting_local",
            SyncPhase::SavingManifest => "saving_manifest",
            SyncPhase::Idle => "idle",
        };
        f.write_str(s)
    }
}

/// Progress callback type (phase, entries_done, entries_total).
///
/// Emitted once when a phase starts (with `entries_done = 0`) and again
/// after every processed entry. Phases that move no entries still emit
/// their start event so observers see the full ordering.
pub type ProgressFn = Box<dyn Fn(SyncPhase, u64, u64) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde() {
        for phase in [
            SyncPhase::FetchingManifest,
            SyncPhase::Comparing,
            SyncPhase::Downloading,
            SyncPhase::Uploading,
            SyncPhase::DeletingRemote,
            SyncPhase::DeletingLocal,
            SyncPhase::SavingManifest,
            SyncPhase::Idle,
        ] {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{phase}\""));
        }
    }
}
