//! Typed byte access to one port, with role-aware error mapping

use opendal::{ErrorKind, Operator};
use tracing::debug;
use uuid::Uuid;

use vellum_core::{VellumError, VellumResult};

use crate::artifact;

/// Which side of the sync pair a store is. Decides how its failures are
/// classified: the cache is local disk (`Storage`), the remote is a network
/// service (`Network`, retryable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreRole {
    Cache,
    Remote,
}

impl StoreRole {
    fn classify(self, context: String, err: opendal::Error) -> VellumError {
        match self {
            StoreRole::Cache => VellumError::Storage(format!("{context}: {err}")),
            StoreRole::Remote => VellumError::Network(format!("{context}: {err}")),
        }
    }
}

/// One blob port speaking the artifact namespace.
#[derive(Debug, Clone)]
pub struct Store {
    op: Operator,
    role: StoreRole,
}

impl Store {
    pub fn new(op: Operator, role: StoreRole) -> Self {
        Self { op, role }
    }

    pub fn role(&self) -> StoreRole {
        self.role
    }

    /// Read an artifact. Absence is `None`, never an error.
    pub async fn get(&self, key: &str) -> VellumResult<Option<Vec<u8>>> {
        match self.op.read(key).await {
            Ok(buf) => Ok(Some(buf.to_bytes().to_vec())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.role.classify(format!("reading {key}"), e)),
        }
    }

    /// Write an artifact, overwriting any previous value.
    pub async fn put(&self, key: &str, bytes: Vec<u8>) -> VellumResult<()> {
        self.op
            .write(key, bytes)
            .await
            .map(|_| ())
            .map_err(|e| self.role.classify(format!("writing {key}"), e))
    }

    /// Delete an artifact, reporting whether it existed.
    pub async fn delete(&self, key: &str) -> VellumResult<bool> {
        let existed = self.exists(key).await?;
        if existed {
            self.op
                .delete(key)
                .await
                .map_err(|e| self.role.classify(format!("deleting {key}"), e))?;
        }
        Ok(existed)
    }

    pub async fn exists(&self, key: &str) -> VellumResult<bool> {
        self.op
            .exists(key)
            .await
            .map_err(|e| self.role.classify(format!("checking {key}"), e))
    }

    /// The item ids with a blob present for this notebook.
    pub async fn list_blobs(&self, notebook_id: Uuid) -> VellumResult<Vec<Uuid>> {
        let prefix = artifact::blob_prefix(notebook_id);
        let entries = self
            .op
            .list(&prefix)
            .await
            .map_err(|e| self.role.classify(format!("listing {prefix}"), e))?;

        let mut ids: Vec<Uuid> = entries
            .iter()
            .filter_map(|entry| artifact::parse_blob_id(entry.path()))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Remove every artifact of one notebook: blobs, manifest, meta.
    pub async fn purge_notebook(&self, notebook_id: Uuid) -> VellumResult<()> {
        for item in self.list_blobs(notebook_id).await? {
            self.delete(&artifact::blob(notebook_id, item)).await?;
        }
        self.delete(&artifact::notebook_manifest(notebook_id)).await?;
        self.delete(&artifact::notebook_meta(notebook_id)).await?;
        debug!(notebook = %notebook_id, role = ?self.role, "purged notebook artifacts");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::memory_store;

    #[tokio::test]
    async fn test_get_absent_is_none() {
        let store = memory_store(StoreRole::Cache).unwrap();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = memory_store(StoreRole::Cache).unwrap();
        store.put("a/key", b"payload".to_vec()).await.unwrap();

        assert_eq!(store.get("a/key").await.unwrap(), Some(b"payload".to_vec()));
        assert!(store.exists("a/key").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = memory_store(StoreRole::Cache).unwrap();
        store.put("k", b"one".to_vec()).await.unwrap();
        store.put("k", b"two".to_vec()).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"two".to_vec()));
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = memory_store(StoreRole::Cache).unwrap();
        store.put("k", b"v".to_vec()).await.unwrap();

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap(), "second delete is a no-op");
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_blobs_parses_and_filters() {
        let store = memory_store(StoreRole::Remote).unwrap();
        let nb = Uuid::from_u128(10);
        let items = [Uuid::from_u128(3), Uuid::from_u128(1), Uuid::from_u128(2)];

        for item in items {
            store
                .put(&artifact::blob(nb, item), b"sealed".to_vec())
                .await
                .unwrap();
        }
        // Non-blob artifacts must not show up in the listing
        store
            .put(&artifact::notebook_manifest(nb), b"m".to_vec())
            .await
            .unwrap();
        store
            .put(&artifact::notebook_meta(nb), b"j".to_vec())
            .await
            .unwrap();

        let listed = store.list_blobs(nb).await.unwrap();
        assert_eq!(
            listed,
            vec![Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)]
        );
    }

    #[tokio::test]
    async fn test_list_blobs_empty_notebook() {
        let store = memory_store(StoreRole::Remote).unwrap();
        assert!(store.list_blobs(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_notebook_leaves_others() {
        let store = memory_store(StoreRole::Cache).unwrap();
        let doomed = Uuid::from_u128(1);
        let kept = Uuid::from_u128(2);

        for nb in [doomed, kept] {
            store
                .put(&artifact::notebook_meta(nb), b"meta".to_vec())
                .await
                .unwrap();
            store
                .put(&artifact::notebook_manifest(nb), b"manifest".to_vec())
                .await
                .unwrap();
            store
                .put(&artifact::blob(nb, Uuid::from_u128(7)), b"blob".to_vec())
                .await
                .unwrap();
        }

        store.purge_notebook(doomed).await.unwrap();

        assert!(!store.exists(&artifact::notebook_meta(doomed)).await.unwrap());
        assert!(!store
            .exists(&artifact::notebook_manifest(doomed))
            .await
            .unwrap());
        assert!(store.list_blobs(doomed).await.unwrap().is_empty());

        assert!(store.exists(&artifact::notebook_meta(kept)).await.unwrap());
        assert_eq!(store.list_blobs(kept).await.unwrap().len(), 1);
    }
}
