//! The root map: the account's notebook index
//!
//! One map per account, sealed under the map key and stored as `root-map`
//! on both ports. Entries carry their own `last_updated` so two devices can
//! merge their maps entry by entry instead of whole-file.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vellum_core::{now_ms, Timestamp, VellumError, VellumResult};
use vellum_crypto::{open, seal, EncryptedContainer, MapKey};

use crate::merge::{merge_entries, LwwEntry};

/// Current map format version.
pub const MAP_VERSION: u32 = 1;

/// One notebook known to the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry {
    pub id: Uuid,
    pub title: String,
    pub last_updated: Timestamp,
}

impl LwwEntry for MapEntry {
    fn entry_id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> Timestamp {
        self.last_updated
    }

    fn content_differs(&self, other: &Self) -> bool {
        self.title != other.title
    }
}

/// The notebook index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map {
    pub version: u32,
    pub last_updated: Timestamp,
    pub entries: Vec<MapEntry>,
}

impl Map {
    pub fn new() -> Self {
        Self {
            version: MAP_VERSION,
            last_updated: now_ms(),
            entries: Vec::new(),
        }
    }

    pub fn find(&self, id: Uuid) -> Option<&MapEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Next mutation timestamp. Clamped strictly above the current map
    /// timestamp so sequential edits stay ordered even within one
    /// millisecond.
    fn tick(&self) -> Timestamp {
        now_ms().max(self.last_updated + 1)
    }

    /// Register a new notebook. Generates its id and refreshes both the
    /// entry and the map timestamps.
    pub fn add_entry(&mut self, title: impl Into<String>) -> MapEntry {
        let entry = MapEntry {
            id: Uuid::new_v4(),
            title: title.into(),
            last_updated: self.tick(),
        };
        self.last_updated = entry.last_updated;
        self.entries.push(entry.clone());
        entry
    }

    /// Retitle a notebook.
    pub fn update_entry(&mut self, id: Uuid, title: impl Into<String>) -> VellumResult<()> {
        let now = self.tick();
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.title = title.into();
                entry.last_updated = now;
                self.last_updated = now;
                Ok(())
            }
            None => Err(VellumError::NotFound(format!("no notebook {id} in map"))),
        }
    }

    /// Drop a notebook from the index. Refreshing the map timestamp here is
    /// what lets other devices learn about the deletion at merge time.
    pub fn remove_entry(&mut self, id: Uuid) -> bool {
        let before = self.entries.len();
        let stamp = self.tick();
        self.entries.retain(|e| e.id != id);
        let removed = self.entries.len() != before;
        if removed {
            self.last_updated = stamp;
        }
        removed
    }

    /// Structural checks on a map read from a port.
    pub fn validate(&self) -> VellumResult<()> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.id) {
                return Err(VellumError::Validation(format!(
                    "duplicate notebook id {} in map",
                    entry.id
                )));
            }
            if entry.title.is_empty() {
                return Err(VellumError::Validation(format!(
                    "notebook {} has an empty title",
                    entry.id
                )));
            }
        }
        Ok(())
    }

    /// Merge with the remote copy, entry-granular LWW. Returns the merged
    /// map and how many entries diverged on both sides.
    pub fn merge(&self, remote: &Map) -> (Map, usize) {
        let outcome = merge_entries(
            &self.entries,
            self.last_updated,
            &remote.entries,
            remote.last_updated,
        );
        let merged = Map {
            version: self.version.max(remote.version),
            last_updated: outcome.last_updated,
            entries: outcome.entries,
        };
        (merged, outcome.conflicts)
    }

    /// JSON-encode and seal under the map key, producing the packed bytes
    /// stored at `root-map`.
    pub fn seal(&self, key: &MapKey) -> VellumResult<Vec<u8>> {
        let json = serde_json::to_vec(self)
            .map_err(|e| VellumError::Validation(format!("map serialization: {e}")))?;
        Ok(seal(&json, key)?.pack())
    }

    /// Unpack, open under the map key, and decode. `Authentication` means
    /// the key (and so the passphrase) was wrong.
    pub fn open(bytes: &[u8], key: &MapKey) -> VellumResult<Map> {
        let container = EncryptedContainer::unpack(bytes)?;
        let json = open(&container, key)?;
        let map: Map = serde_json::from_slice(&json)
            .map_err(|e| VellumError::Validation(format!("map deserialization: {e}")))?;
        map.validate()?;
        Ok(map)
    }
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}
