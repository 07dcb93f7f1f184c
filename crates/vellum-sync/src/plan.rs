//! Manifest comparison: deciding what moves where
//!
//! The plan is computed from the two manifests before any blob moves, and
//! its decisions line up with the LWW merge: every entry the merge keeps has
//! its blob transferred toward whichever side lacks the winning content, and
//! every entry the merge drops has its orphaned blob deleted.

use uuid::Uuid;

use vellum_core::VellumResult;
use vellum_model::Manifest;
use vellum_store::{artifact, Store};

/// Item ids to move or remove, grouped by direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_download: Vec<Uuid>,
    pub to_upload: Vec<Uuid>,
    pub to_delete_remote: Vec<Uuid>,
    pub to_delete_local: Vec<Uuid>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_download.is_empty()
            && self.to_upload.is_empty()
            && self.to_delete_remote.is_empty()
            && self.to_delete_local.is_empty()
    }

    pub fn total_ops(&self) -> usize {
        self.to_download.len()
            + self.to_upload.len()
            + self.to_delete_remote.len()
            + self.to_delete_local.len()
    }

    /// Upload everything: the remote has no manifest yet.
    pub fn populate_remote(local: &Manifest) -> Self {
        Self {
            to_upload: local.entries.iter().map(|e| e.id).collect(),
            ..Default::default()
        }
    }

    /// Download everything: the cache has no manifest yet.
    pub fn populate_cache(remote: &Manifest) -> Self {
        Self {
            to_download: remote.entries.iter().map(|e| e.id).collect(),
            ..Default::default()
        }
    }
}

/// Compare the cached and remote manifests entry by entry.
///
/// For entries present on both sides, a blob missing from the cache forces a
/// download regardless of timestamps (the recoverable "entry present, blob
/// missing" state left behind by an interrupted write). Otherwise the newer
/// side's content moves to the older side; a timestamp tie with differing
/// content adopts the remote blob, matching the merge's tie rule. Entries on
/// one side only are either fresh (newer than the other side's manifest
/// timestamp, so they propagate) or stale leftovers of a deletion on the
/// other side (so their blob is removed).
pub async fn compare(
    local: &Manifest,
    remote: &Manifest,
    cache: &Store,
) -> VellumResult<SyncPlan> {
    let mut plan = SyncPlan::default();

    for entry in &local.entries {
        match remote.find(entry.id) {
            Some(remote_entry) => {
                let cached_blob = artifact::blob(local.notebook_id, entry.id);
                if !cache.exists(&cached_blob).await? {
                    plan.to_download.push(entry.id);
                } else if remote_entry.last_updated > entry.last_updated {
                    plan.to_download.push(entry.id);
                } else if entry.last_updated > remote_entry.last_updated {
                    plan.to_upload.push(entry.id);
                } else if remote_entry.content_hash != entry.content_hash {
                    plan.to_download.push(entry.id);
                }
            }
            None => {
                if entry.last_updated > remote.last_updated {
                    plan.to_upload.push(entry.id);
                } else {
                    plan.to_delete_local.push(entry.id);
                }
            }
        }
    }

    for entry in &remote.entries {
        if local.find(entry.id).is_none() {
            if entry.last_updated > local.last_updated {
                plan.to_download.push(entry.id);
            } else {
                plan.to_delete_remote.push(entry.id);
            }
        }
    }

    Ok(plan)
}
