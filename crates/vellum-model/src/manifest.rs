//! Notebook manifests: the per-notebook item index
//!
//! A manifest lists every item (document or media) in one notebook together
//! with the content hash and size used for change detection. It is sealed
//! under the notebook key and stored at `notebook/{id}/manifest` on both
//! ports; blobs are uploaded separately, one artifact per item.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vellum_core::{now_ms, Timestamp, VellumError, VellumResult};
use vellum_crypto::{open, seal, EncryptedContainer, NotebookKey};

use crate::merge::{merge_entries, LwwEntry};

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// What an item holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Document,
    Media,
}

/// One item in a notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: Uuid,
    pub kind: ItemKind,
    pub title: String,
    /// `sha256-<hex>` of the plaintext content
    pub content_hash: String,
    /// Plaintext size in bytes
    pub size: u64,
    pub last_updated: Timestamp,
}

impl LwwEntry for ManifestEntry {
    fn entry_id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> Timestamp {
        self.last_updated
    }

    fn content_differs(&self, other: &Self) -> bool {
        self.content_hash != other.content_hash
            || self.title != other.title
            || self.kind != other.kind
    }
}

/// The item index of one notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub notebook_id: Uuid,
    pub notebook_title: String,
    pub last_updated: Timestamp,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(notebook_id: Uuid, notebook_title: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            notebook_id,
            notebook_title: notebook_title.into(),
            last_updated: now_ms(),
            entries: Vec::new(),
        }
    }

    pub fn find(&self, id: Uuid) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Next mutation timestamp. Clamped strictly above the current manifest
    /// timestamp so sequential edits stay ordered even within one
    /// millisecond.
    fn tick(&self) -> Timestamp {
        now_ms().max(self.last_updated + 1)
    }

    /// Add a new item, generating its id.
    pub fn add_entry(
        &mut self,
        kind: ItemKind,
        title: impl Into<String>,
        content_hash: impl Into<String>,
        size: u64,
    ) -> ManifestEntry {
        let entry = ManifestEntry {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            content_hash: content_hash.into(),
            size,
            last_updated: self.tick(),
        };
        self.last_updated = entry.last_updated;
        self.entries.push(entry.clone());
        entry
    }

    /// Rewrite an existing item's metadata after its content changed.
    pub fn update_entry(
        &mut self,
        id: Uuid,
        title: impl Into<String>,
        content_hash: impl Into<String>,
        size: u64,
    ) -> VellumResult<ManifestEntry> {
        let now = self.tick();
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.title = title.into();
                entry.content_hash = content_hash.into();
                entry.size = size;
                entry.last_updated = now;
                self.last_updated = now;
                Ok(entry.clone())
            }
            None => Err(VellumError::NotFound(format!(
                "no item {id} in notebook {}",
                self.notebook_id
            ))),
        }
    }

    /// Add or update in one call. `None` always creates.
    pub fn upsert_entry(
        &mut self,
        id: Option<Uuid>,
        kind: ItemKind,
        title: impl Into<String>,
        content_hash: impl Into<String>,
        size: u64,
    ) -> VellumResult<ManifestEntry> {
        match id {
            Some(id) => self.update_entry(id, title, content_hash, size),
            None => Ok(self.add_entry(kind, title, content_hash, size)),
        }
    }

    /// Drop an item. Refreshing the manifest timestamp here is what lets
    /// other devices learn about the deletion at merge time.
    pub fn remove_entry(&mut self, id: Uuid) -> bool {
        let stamp = self.tick();
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        let removed = self.entries.len() != before;
        if removed {
            self.last_updated = stamp;
        }
        removed
    }

    /// Retitle the notebook itself.
    pub fn rename(&mut self, title: impl Into<String>) {
        self.last_updated = self.tick();
        self.notebook_title = title.into();
    }

    /// Structural checks on a manifest read from a port.
    pub fn validate(&self) -> VellumResult<()> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.id) {
                return Err(VellumError::Validation(format!(
                    "duplicate item id {} in notebook {}",
                    entry.id, self.notebook_id
                )));
            }
            if entry.content_hash.is_empty() {
                return Err(VellumError::Validation(format!(
                    "item {} has no content hash",
                    entry.id
                )));
            }
        }
        Ok(())
    }

    /// Merge with the remote copy, entry-granular LWW. The notebook title
    /// follows the side whose collection timestamp is newer (tie: remote).
    pub fn merge(&self, remote: &Manifest) -> (Manifest, usize) {
        let outcome = merge_entries(
            &self.entries,
            self.last_updated,
            &remote.entries,
            remote.last_updated,
        );
        let notebook_title = if self.last_updated > remote.last_updated {
            self.notebook_title.clone()
        } else {
            remote.notebook_title.clone()
        };
        let merged = Manifest {
            version: self.version.max(remote.version),
            notebook_id: self.notebook_id,
            notebook_title,
            last_updated: outcome.last_updated,
            entries: outcome.entries,
        };
        (merged, outcome.conflicts)
    }

    /// JSON-encode and seal under the notebook key, producing the packed
    /// bytes stored at `notebook/{id}/manifest`.
    pub fn seal(&self, key: &NotebookKey) -> VellumResult<Vec<u8>> {
        let json = serde_json::to_vec(self)
            .map_err(|e| VellumError::Validation(format!("manifest serialization: {e}")))?;
        Ok(seal(&json, key)?.pack())
    }

    /// Unpack, open under the notebook key, and decode.
    pub fn open(bytes: &[u8], key: &NotebookKey) -> VellumResult<Manifest> {
        let container = EncryptedContainer::unpack(bytes)?;
        let json = open(&container, key)?;
        let manifest: Manifest = serde_json::from_slice(&json)
            .map_err(|e| VellumError::Validation(format!("manifest deserialization: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_crypto::{content_hash, KEY_SIZE};

    fn test_key() -> NotebookKey {
        NotebookKey::from_bytes([11u8; KEY_SIZE])
    }

    fn sample_manifest() -> Manifest {
        let mut m = Manifest::new(Uuid::from_u128(1), "Research");
        m.add_entry(ItemKind::Document, "Abstract", content_hash(b"draft one"), 9);
        m.add_entry(ItemKind::Media, "Figure 1", content_hash(b"\x89PNG"), 4);
        m
    }

    #[test]
    fn test_add_and_find() {
        let mut m = Manifest::new(Uuid::new_v4(), "Notes");
        let entry = m.add_entry(ItemKind::Document, "First", "sha256-aa", 10);

        assert_eq!(m.entries.len(), 1);
        assert_eq!(m.find(entry.id).map(|e| e.size), Some(10));
        assert_eq!(m.last_updated, entry.last_updated);
    }

    #[test]
    fn test_update_entry() {
        let mut m = sample_manifest();
        let id = m.entries[0].id;

        let updated = m
            .update_entry(id, "Abstract v2", content_hash(b"draft two"), 9)
            .unwrap();

        assert_eq!(updated.title, "Abstract v2");
        assert_eq!(m.find(id).unwrap().content_hash, content_hash(b"draft two"));
        assert_eq!(m.last_updated, updated.last_updated);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let mut m = sample_manifest();
        let err = m
            .update_entry(Uuid::new_v4(), "x", "sha256-bb", 1)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let mut m = Manifest::new(Uuid::new_v4(), "Notes");

        let created = m
            .upsert_entry(None, ItemKind::Document, "New", "sha256-cc", 3)
            .unwrap();
        assert_eq!(m.entries.len(), 1);

        let updated = m
            .upsert_entry(Some(created.id), ItemKind::Document, "New", "sha256-dd", 4)
            .unwrap();
        assert_eq!(m.entries.len(), 1);
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.content_hash, "sha256-dd");
    }

    #[test]
    fn test_remove_entry_idempotent() {
        let mut m = sample_manifest();
        let id = m.entries[0].id;

        assert!(m.remove_entry(id));
        assert!(!m.remove_entry(id));
        assert_eq!(m.entries.len(), 1);
    }

    #[test]
    fn test_rename_refreshes_timestamp() {
        let mut m = sample_manifest();
        let before = m.last_updated;
        m.rename("Research (archived)");

        assert_eq!(m.notebook_title, "Research (archived)");
        assert!(m.last_updated >= before);
    }

    #[test]
    fn test_validate_duplicate_ids() {
        let mut m = sample_manifest();
        let dup = m.entries[0].clone();
        m.entries.push(dup);

        assert!(matches!(
            m.validate().unwrap_err(),
            VellumError::Validation(_)
        ));
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ItemKind::Document).unwrap();
        assert_eq!(json, "\"document\"");
        let json = serde_json::to_string(&ItemKind::Media).unwrap();
        assert_eq!(json, "\"media\"");
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key();
        let m = sample_manifest();

        let sealed = m.seal(&key).unwrap();
        let opened = Manifest::open(&sealed, &key).unwrap();

        assert_eq!(opened, m);
    }

    #[test]
    fn test_open_wrong_key_is_authentication() {
        let m = sample_manifest();
        let sealed = m.seal(&NotebookKey::from_bytes([1u8; KEY_SIZE])).unwrap();

        let err = Manifest::open(&sealed, &NotebookKey::from_bytes([2u8; KEY_SIZE])).unwrap_err();
        assert!(err.is_authentication());
    }

    #[test]
    fn test_merge_title_follows_newer_side() {
        let id = Uuid::from_u128(1);
        let mut local = Manifest::new(id, "Old name");
        local.last_updated = 100;
        let mut remote = Manifest::new(id, "New name");
        remote.last_updated = 200;

        let (merged, _) = local.merge(&remote);
        assert_eq!(merged.notebook_title, "New name");

        let (merged, _) = remote.merge(&local);
        assert_eq!(merged.notebook_title, "New name");
    }

    #[test]
    fn test_merge_content_conflict_counted() {
        let id = Uuid::from_u128(1);
        let item = Uuid::from_u128(2);

        let mut local = Manifest::new(id, "N");
        local.entries.push(ManifestEntry {
            id: item,
            kind: ItemKind::Document,
            title: "Doc".to_string(),
            content_hash: "sha256-aa".to_string(),
            size: 1,
            last_updated: 300,
        });
        local.last_updated = 300;

        let mut remote = Manifest::new(id, "N");
        remote.entries.push(ManifestEntry {
            id: item,
            kind: ItemKind::Document,
            title: "Doc".to_string(),
            content_hash: "sha256-bb".to_string(),
            size: 2,
            last_updated: 200,
        });
        remote.last_updated = 200;

        let (merged, conflicts) = local.merge(&remote);
        assert_eq!(merged.entries[0].content_hash, "sha256-aa");
        assert_eq!(conflicts, 1);
    }

    #[test]
    fn test_merge_deletion_beats_stale_entry() {
        // Remote deleted the item at 400; local copy is from 250
        let id = Uuid::from_u128(1);
        let item = Uuid::from_u128(2);

        let mut local = Manifest::new(id, "N");
        local.entries.push(ManifestEntry {
            id: item,
            kind: ItemKind::Media,
            title: "Scan".to_string(),
            content_hash: "sha256-aa".to_string(),
            size: 1,
            last_updated: 250,
        });
        local.last_updated = 250;

        let mut remote = Manifest::new(id, "N");
        remote.last_updated = 400;

        let (merged, _) = local.merge(&remote);
        assert!(merged.entries.is_empty());
        assert_eq!(merged.last_updated, 400);
    }
}
