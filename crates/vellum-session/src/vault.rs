//! The vault: one account's unlocked session over a cache/remote port pair
//!
//! All methods take `&self`; interior state lives behind tokio sync
//! primitives so notebook operations and sync runs can proceed
//! concurrently. Mutations follow a fixed persistence posture: the cache
//! port write is required, the matching remote write is best-effort and
//! reconciled by the next sync run.

use std::collections::HashMap;

use secrecy::SecretString;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vellum_core::config::{KdfConfig, VellumConfig};
use vellum_core::{VellumError, VellumResult};
use vellum_crypto::{content_hash, open, seal, EncryptedContainer};
use vellum_model::{
    ItemKind, Manifest, ManifestEntry, Map, MapEntry, MapKey, NotebookKey, NotebookMeta, RootMeta,
};
use vellum_store::{artifact, Store};
use vellum_sync::{ProgressFn, SyncEngine, SyncReport};

use crate::blob_cache::BlobCache;
use crate::state::{locked_session, SessionState};

/// Outcome of a full-account sync: the root run plus one report per
/// notebook that was attempted.
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub root: SyncReport,
    pub notebooks: HashMap<Uuid, SyncReport>,
}

impl SyncSummary {
    pub fn success(&self) -> bool {
        self.root.success() && self.notebooks.values().all(SyncReport::success)
    }
}

pub struct Vault {
    cache: Store,
    remote: Store,
    kdf: KdfConfig,
    state: RwLock<SessionState>,
    blobs: Mutex<BlobCache>,
    /// One broadcast sender per sync target currently running; the account
    /// root is keyed by the nil uuid.
    inflight: Mutex<HashMap<Uuid, broadcast::Sender<SyncReport>>>,
}

impl Vault {
    pub fn new(cache: Store, remote: Store, config: &VellumConfig) -> Self {
        Self {
            cache,
            remote,
            kdf: config.kdf.clone(),
            state: RwLock::new(SessionState::Locked),
            blobs: Mutex::new(BlobCache::new(config.session.blob_cache_entries)),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn is_unlocked(&self) -> bool {
        self.state.read().await.is_unlocked()
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Create a brand-new account: generate the map key, wrap it under the
    /// passphrase, and persist the enrollment artifacts. Fails if the vault
    /// already exists on either port.
    pub async fn initialize(&self, passphrase: SecretString) -> VellumResult<()> {
        if self.cache.get(artifact::ROOT_META).await?.is_some() {
            return Err(VellumError::Validation(
                "vault already initialized".to_string(),
            ));
        }
        match self.remote.get(artifact::ROOT_META).await {
            Ok(Some(_)) => {
                return Err(VellumError::Validation(
                    "vault already initialized on the remote; unlock instead".to_string(),
                ));
            }
            Ok(None) => {}
            // An unreachable remote must not block first use; the check is
            // repeated implicitly when sync mirrors the root meta.
            Err(e) => warn!("remote not checked during initialize: {e}"),
        }

        let (meta, map_key) = RootMeta::create(&passphrase, &self.kdf)?;
        let map = Map::new();
        let meta_bytes = meta.to_bytes()?;
        let sealed_map = map.seal(&map_key)?;

        self.cache
            .put(artifact::ROOT_META, meta_bytes.clone())
            .await?;
        self.cache
            .put(artifact::ROOT_MAP, sealed_map.clone())
            .await?;
        self.best_effort_remote_put(artifact::ROOT_META, meta_bytes)
            .await;
        self.best_effort_remote_put(artifact::ROOT_MAP, sealed_map)
            .await;

        *self.state.write().await = SessionState::Unlocked {
            passphrase,
            map_key,
            map,
            notebook_keys: HashMap::new(),
        };
        info!("vault initialized");
        Ok(())
    }

    /// Unlock an existing account. The new state is assembled in locals and
    /// committed in one assignment, so any failure leaves the session
    /// exactly as locked as it was.
    pub async fn unlock(&self, passphrase: SecretString) -> VellumResult<()> {
        let meta_bytes = self
            .fetch_with_fallback(artifact::ROOT_META)
            .await?
            .ok_or_else(|| VellumError::NotFound("vault is not initialized".to_string()))?;
        let meta = RootMeta::from_bytes(&meta_bytes)?;
        let map_key = meta.unlock(&passphrase)?;

        let map_bytes = self
            .fetch_with_fallback(artifact::ROOT_MAP)
            .await?
            .ok_or_else(|| VellumError::NotFound("root map missing from both ports".to_string()))?;
        let map = Map::open(&map_bytes, &map_key)?;

        *self.state.write().await = SessionState::Unlocked {
            passphrase,
            map_key,
            map,
            notebook_keys: HashMap::new(),
        };
        info!("session unlocked");
        Ok(())
    }

    /// Drop all key material and decrypted content. The keys and the
    /// passphrase zeroize on drop; the blob cache is cleared before the
    /// call returns.
    pub async fn lock(&self) {
        *self.state.write().await = SessionState::Locked;
        self.blobs.lock().await.clear();
        info!("session locked");
    }

    // ── Notebooks ───────────────────────────────────────────────────────────

    pub async fn list_notebooks(&self) -> VellumResult<Vec<MapEntry>> {
        match &*self.state.read().await {
            SessionState::Unlocked { map, .. } => Ok(map.entries.clone()),
            SessionState::Locked => Err(locked_session()),
        }
    }

    /// Create an empty notebook: fresh key wrapped under a fresh salt, an
    /// empty manifest, and a new map entry.
    pub async fn create_notebook(&self, title: &str) -> VellumResult<MapEntry> {
        let mut state = self.state.write().await;
        let SessionState::Unlocked {
            passphrase,
            map_key,
            map,
            notebook_keys,
        } = &mut *state
        else {
            return Err(locked_session());
        };

        let mut updated = map.clone();
        let entry = updated.add_entry(title);
        let (meta, key) = NotebookMeta::create(entry.id, passphrase, &self.kdf)?;
        let manifest = Manifest::new(entry.id, title);

        let meta_bytes = meta.to_bytes()?;
        let sealed_manifest = manifest.seal(&key)?;
        let sealed_map = updated.seal(map_key)?;

        self.cache
            .put(&artifact::notebook_meta(entry.id), meta_bytes.clone())
            .await?;
        self.cache
            .put(&artifact::notebook_manifest(entry.id), sealed_manifest.clone())
            .await?;
        self.cache
            .put(artifact::ROOT_MAP, sealed_map.clone())
            .await?;

        self.best_effort_remote_put(&artifact::notebook_meta(entry.id), meta_bytes)
            .await;
        self.best_effort_remote_put(&artifact::notebook_manifest(entry.id), sealed_manifest)
            .await;
        self.best_effort_remote_put(artifact::ROOT_MAP, sealed_map)
            .await;

        *map = updated;
        notebook_keys.insert(entry.id, key);
        info!(notebook = %entry.id, "notebook created");
        Ok(entry)
    }

    /// Rename a notebook in both places its title lives: the map entry and
    /// the manifest header.
    pub async fn rename_notebook(&self, id: Uuid, title: &str) -> VellumResult<()> {
        let key = self.notebook_key(id).await?;

        let mut state = self.state.write().await;
        let SessionState::Unlocked { map_key, map, .. } = &mut *state else {
            return Err(locked_session());
        };

        let mut updated = map.clone();
        updated.update_entry(id, title)?;

        let mut manifest = self.load_manifest(id, &key).await?;
        manifest.rename(title);

        let sealed_manifest = manifest.seal(&key)?;
        let sealed_map = updated.seal(map_key)?;
        self.cache
            .put(&artifact::notebook_manifest(id), sealed_manifest)
            .await?;
        self.cache.put(artifact::ROOT_MAP, sealed_map).await?;

        *map = updated;
        info!(notebook = %id, "notebook renamed");
        Ok(())
    }

    /// Remove a notebook from the account. The map entry goes first (its
    /// refreshed timestamp is what propagates the deletion), then the
    /// notebook's artifacts are purged from the cache; the remote purge is
    /// best-effort.
    pub async fn delete_notebook(&self, id: Uuid) -> VellumResult<()> {
        {
            let mut state = self.state.write().await;
            let SessionState::Unlocked {
                map_key,
                map,
                notebook_keys,
                ..
            } = &mut *state
            else {
                return Err(locked_session());
            };

            let mut updated = map.clone();
            if !updated.remove_entry(id) {
                return Err(VellumError::NotFound(format!("no notebook {id}")));
            }
            let sealed_map = updated.seal(map_key)?;
            self.cache.put(artifact::ROOT_MAP, sealed_map.clone()).await?;
            self.best_effort_remote_put(artifact::ROOT_MAP, sealed_map)
                .await;

            *map = updated;
            notebook_keys.remove(&id);
        }

        self.blobs.lock().await.remove_notebook(id);
        self.cache.purge_notebook(id).await?;
        if let Err(e) = self.remote.purge_notebook(id).await {
            warn!(notebook = %id, "remote purge deferred to next sync: {e}");
        }
        info!(notebook = %id, "notebook deleted");
        Ok(())
    }

    /// Unwrap the notebook's key (cached after the first use) and return
    /// its decrypted manifest. Key material stays inside the session.
    pub async fn open_notebook(&self, id: Uuid) -> VellumResult<Manifest> {
        {
            let state = self.state.read().await;
            let SessionState::Unlocked { map, .. } = &*state else {
                return Err(locked_session());
            };
            if map.find(id).is_none() {
                return Err(VellumError::NotFound(format!("no notebook {id}")));
            }
        }

        let key = self.notebook_key(id).await?;
        self.load_manifest(id, &key).await
    }

    // ── Items ───────────────────────────────────────────────────────────────

    /// Decrypted item content, served from the in-memory cache when warm,
    /// otherwise from the cache port, otherwise from the remote (with
    /// write-back).
    pub async fn get_item(&self, notebook: Uuid, item: Uuid) -> VellumResult<Vec<u8>> {
        if !self.is_unlocked().await {
            return Err(locked_session());
        }
        if let Some(bytes) = self.blobs.lock().await.get(notebook, item) {
            return Ok(bytes);
        }

        let key = self.notebook_key(notebook).await?;
        let sealed = self
            .fetch_with_fallback(&artifact::blob(notebook, item))
            .await?
            .ok_or_else(|| {
                VellumError::NotFound(format!("no stored content for item {item}"))
            })?;
        let container = EncryptedContainer::unpack(&sealed)?;
        let plaintext = open(&container, &key)?;

        self.blobs
            .lock()
            .await
            .insert(notebook, item, plaintext.clone());
        Ok(plaintext)
    }

    /// Write an item: seal the content, record it in the manifest, persist
    /// manifest first and blob second. That order leaves the recoverable
    /// partial state (entry present, blob missing) if interrupted, which
    /// the next sync heals by re-downloading.
    pub async fn put_item(
        &self,
        notebook: Uuid,
        item: Option<Uuid>,
        bytes: Vec<u8>,
        kind: ItemKind,
        title: &str,
    ) -> VellumResult<ManifestEntry> {
        let key = self.notebook_key(notebook).await?;
        let mut manifest = self.load_manifest(notebook, &key).await?;

        let hash = content_hash(&bytes);
        let entry = manifest.upsert_entry(item, kind, title, hash, bytes.len() as u64)?;

        let sealed_manifest = manifest.seal(&key)?;
        let container = seal(&bytes, &key)?;
        self.cache
            .put(&artifact::notebook_manifest(notebook), sealed_manifest)
            .await?;
        self.cache
            .put(&artifact::blob(notebook, entry.id), container.pack())
            .await?;

        self.blobs.lock().await.insert(notebook, entry.id, bytes);
        debug!(notebook = %notebook, item = %entry.id, size = entry.size, "item written");
        Ok(entry)
    }

    /// Remove an item from the manifest and drop its cached blob. A missing
    /// item is a no-op. The remote blob is removed by the next sync run's
    /// delete phase.
    pub async fn delete_item(&self, notebook: Uuid, item: Uuid) -> VellumResult<()> {
        let key = self.notebook_key(notebook).await?;
        let mut manifest = self.load_manifest(notebook, &key).await?;

        if !manifest.remove_entry(item) {
            return Ok(());
        }

        let sealed_manifest = manifest.seal(&key)?;
        self.cache
            .put(&artifact::notebook_manifest(notebook), sealed_manifest)
            .await?;
        self.cache.delete(&artifact::blob(notebook, item)).await?;
        self.blobs.lock().await.remove(notebook, item);
        debug!(notebook = %notebook, item = %item, "item deleted");
        Ok(())
    }

    // ── Sync ────────────────────────────────────────────────────────────────

    /// Reconcile one target with the remote; the nil uuid targets the
    /// account root. Concurrent calls for the same target coalesce: late
    /// callers join the in-flight run and receive its report (without
    /// observing its progress events). A joined run that aborts before
    /// reporting yields `Cancelled`; re-calling surfaces the real error.
    pub async fn sync(
        &self,
        notebook_id: Uuid,
        progress: Option<&ProgressFn>,
        cancel: &CancellationToken,
    ) -> VellumResult<SyncReport> {
        let tx = {
            let mut inflight = self.inflight.lock().await;
            if let Some(tx) = inflight.get(&notebook_id) {
                let mut rx = tx.subscribe();
                drop(inflight);
                debug!(target = %notebook_id, "joining in-flight sync");
                return match rx.recv().await {
                    Ok(report) => Ok(report),
                    Err(_) => Err(VellumError::Cancelled),
                };
            }
            let (tx, _) = broadcast::channel(1);
            inflight.insert(notebook_id, tx.clone());
            tx
        };

        let result = self.run_sync(notebook_id, progress, cancel).await;

        // Remove the entry before sending so every subscriber predates the
        // send; a send after removal can miss no one.
        self.inflight.lock().await.remove(&notebook_id);
        match result {
            Ok(report) => {
                let _ = tx.send(report.clone());
                Ok(report)
            }
            Err(e) => Err(e),
        }
    }

    /// Sync the whole account: the root first (so the merged map is live),
    /// then every notebook in turn. One notebook's failure is recorded in
    /// its report and the loop continues; cancellation stops the loop.
    pub async fn sync_all(
        &self,
        progress: Option<&ProgressFn>,
        cancel: &CancellationToken,
    ) -> VellumResult<SyncSummary> {
        let root = self.sync(Uuid::nil(), progress, cancel).await?;

        let mut notebooks = HashMap::new();
        if !root.cancelled {
            for entry in self.list_notebooks().await? {
                if cancel.is_cancelled() {
                    break;
                }
                match self.sync(entry.id, progress, cancel).await {
                    Ok(report) => {
                        let stop = report.cancelled;
                        notebooks.insert(entry.id, report);
                        if stop {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(notebook = %entry.id, "sync failed: {e}");
                        notebooks.insert(
                            entry.id,
                            SyncReport {
                                errors: vec![e.to_string()],
                                ..SyncReport::default()
                            },
                        );
                    }
                }
            }
        }

        let summary = SyncSummary { root, notebooks };
        info!(
            notebooks = summary.notebooks.len(),
            success = summary.success(),
            "account sync finished"
        );
        Ok(summary)
    }

    async fn run_sync(
        &self,
        target: Uuid,
        progress: Option<&ProgressFn>,
        cancel: &CancellationToken,
    ) -> VellumResult<SyncReport> {
        let engine = SyncEngine::new(self.cache.clone(), self.remote.clone());
        if target.is_nil() {
            let map_key = {
                match &*self.state.read().await {
                    SessionState::Unlocked { map_key, .. } => map_key.clone(),
                    SessionState::Locked => return Err(locked_session()),
                }
            };
            let report = engine.sync_root(&map_key, progress, cancel).await?;
            if !report.cancelled {
                self.adopt_merged_map(&map_key).await?;
            }
            Ok(report)
        } else {
            let key = self.notebook_key(target).await?;
            let report = engine.sync_notebook(target, &key, progress, cancel).await?;
            // Downloaded or locally-deleted blobs make cached plaintext stale
            if report.downloaded > 0 || report.deleted_local > 0 {
                self.blobs.lock().await.remove_notebook(target);
            }
            Ok(report)
        }
    }

    /// Reload the merged map from the cache port into the session and clean
    /// up after notebooks that were deleted on another device.
    async fn adopt_merged_map(&self, map_key: &MapKey) -> VellumResult<()> {
        let bytes = self
            .cache
            .get(artifact::ROOT_MAP)
            .await?
            .ok_or_else(|| VellumError::NotFound("root map missing after sync".to_string()))?;
        let merged = Map::open(&bytes, map_key)?;

        let vanished: Vec<Uuid> = {
            let mut state = self.state.write().await;
            match &mut *state {
                SessionState::Unlocked {
                    map, notebook_keys, ..
                } => {
                    let vanished: Vec<Uuid> = map
                        .entries
                        .iter()
                        .map(|e| e.id)
                        .filter(|id| merged.find(*id).is_none())
                        .collect();
                    for id in &vanished {
                        notebook_keys.remove(id);
                    }
                    *map = merged;
                    vanished
                }
                SessionState::Locked => Vec::new(),
            }
        };

        for id in vanished {
            info!(notebook = %id, "notebook removed elsewhere, clearing local copy");
            self.blobs.lock().await.remove_notebook(id);
            if let Err(e) = self.cache.purge_notebook(id).await {
                warn!(notebook = %id, "cache purge failed: {e}");
            }
        }
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────────────

    /// The notebook's decrypted key, unwrapping and caching it on first use.
    async fn notebook_key(&self, notebook: Uuid) -> VellumResult<NotebookKey> {
        let passphrase = {
            let state = self.state.read().await;
            match &*state {
                SessionState::Locked => return Err(locked_session()),
                SessionState::Unlocked {
                    notebook_keys,
                    passphrase,
                    ..
                } => {
                    if let Some(key) = notebook_keys.get(&notebook) {
                        return Ok(key.clone());
                    }
                    passphrase.clone()
                }
            }
        };

        // Argon2 work happens outside any lock
        let meta_bytes = self
            .fetch_with_fallback(&artifact::notebook_meta(notebook))
            .await?
            .ok_or_else(|| VellumError::NotFound(format!("no meta for notebook {notebook}")))?;
        let meta = NotebookMeta::from_bytes(&meta_bytes)?;
        let key = meta.unlock(&passphrase)?;

        let mut state = self.state.write().await;
        if let SessionState::Unlocked { notebook_keys, .. } = &mut *state {
            notebook_keys.insert(notebook, key.clone());
        }
        Ok(key)
    }

    async fn load_manifest(&self, notebook: Uuid, key: &NotebookKey) -> VellumResult<Manifest> {
        let bytes = self
            .fetch_with_fallback(&artifact::notebook_manifest(notebook))
            .await?
            .ok_or_else(|| {
                VellumError::NotFound(format!("no manifest for notebook {notebook}"))
            })?;
        Manifest::open(&bytes, key)
    }

    /// Read from the cache port, falling back to the remote. A remote hit
    /// is written back so the next read is local.
    async fn fetch_with_fallback(&self, key: &str) -> VellumResult<Option<Vec<u8>>> {
        if let Some(bytes) = self.cache.get(key).await? {
            return Ok(Some(bytes));
        }
        match self.remote.get(key).await? {
            Some(bytes) => {
                if let Err(e) = self.cache.put(key, bytes.clone()).await {
                    warn!(key, "write-back failed: {e}");
                }
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    async fn best_effort_remote_put(&self, key: &str, bytes: Vec<u8>) {
        if let Err(e) = self.remote.put(key, bytes).await {
            warn!(key, "remote write deferred to next sync: {e}");
        }
    }
}
