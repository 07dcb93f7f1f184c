//! Entry-level last-write-wins merge
//!
//! The same algorithm reconciles the root map and every notebook manifest,
//! so it is written once, generically over [`LwwEntry`]. Deletions carry no
//! tombstones: a collection's `last_updated` is refreshed on every mutation
//! (removals included), and an entry that exists on only one side survives
//! only if it was written after the other side last changed. Anything older
//! than that was deleted over there.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use vellum_core::Timestamp;

/// What the merge needs to know about an entry.
pub trait LwwEntry: Clone {
    fn entry_id(&self) -> Uuid;
    fn updated_at(&self) -> Timestamp;
    /// True when the payloads differ, ignoring timestamps.
    fn content_differs(&self, other: &Self) -> bool;
}

/// Result of merging two entry collections.
#[derive(Debug, Clone)]
pub struct MergeOutcome<E> {
    /// Surviving entries in canonical id order, so both sides converge to
    /// identical structures regardless of their local insertion order.
    pub entries: Vec<E>,
    /// Max of the two collection timestamps.
    pub last_updated: Timestamp,
    /// Entries where both sides held differing content with differing
    /// timestamps. Auto-resolved by LWW, surfaced for reporting.
    pub conflicts: usize,
}

/// Merge two sides of the same collection.
///
/// - Present in both: the strictly newer entry wins; a timestamp tie keeps
///   the remote entry, deterministically, and is not a conflict.
/// - Present on one side only: kept iff its timestamp is strictly newer than
///   the other side's collection timestamp, otherwise it was deleted there.
pub fn merge_entries<E: LwwEntry>(
    local_entries: &[E],
    local_ts: Timestamp,
    remote_entries: &[E],
    remote_ts: Timestamp,
) -> MergeOutcome<E> {
    let remote_by_id: HashMap<Uuid, &E> =
        remote_entries.iter().map(|e| (e.entry_id(), e)).collect();
    let local_ids: HashSet<Uuid> = local_entries.iter().map(|e| e.entry_id()).collect();

    let mut merged: Vec<E> = Vec::new();
    let mut conflicts = 0;

    for local in local_entries {
        match remote_by_id.get(&local.entry_id()) {
            Some(remote) => {
                if local.content_differs(remote) && local.updated_at() != remote.updated_at() {
                    conflicts += 1;
                }
                if local.updated_at() > remote.updated_at() {
                    merged.push(local.clone());
                } else {
                    merged.push((*remote).clone());
                }
            }
            None => {
                if local.updated_at() > remote_ts {
                    merged.push(local.clone());
                }
            }
        }
    }

    for remote in remote_entries {
        if !local_ids.contains(&remote.entry_id()) && remote.updated_at() > local_ts {
            merged.push(remote.clone());
        }
    }

    merged.sort_by_key(LwwEntry::entry_id);

    MergeOutcome {
        entries: merged,
        last_updated: local_ts.max(remote_ts),
        conflicts,
    }
}
