//! The reconciliation engine
//!
//! One run per notebook (or per account root): fetch both manifests, plan,
//! move blobs one at a time, then persist the merged manifest to both ports.
//! The merged manifest is saved only after the transfers, so an interrupted
//! run leaves at worst orphaned-but-valid blobs and a rerun converges.
//! Per-entry failures are collected in the report and the run keeps going;
//! a run aborts with an error only when it cannot establish the manifests
//! at all.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vellum_core::{VellumError, VellumResult};
use vellum_model::{Manifest, Map, MapKey, NotebookKey};
use vellum_store::{artifact, Store};

use crate::plan::{compare, SyncPlan};
use crate::progress::{ProgressFn, SyncPhase};
use crate::report::SyncReport;

/// Reconciles one cache/remote port pair.
pub struct SyncEngine {
    cache: Store,
    remote: Store,
}

impl SyncEngine {
    pub fn new(cache: Store, remote: Store) -> Self {
        Self { cache, remote }
    }

    /// Reconcile one notebook's manifest and blobs across the two ports.
    ///
    /// The cancellation token is consulted before every blob operation;
    /// a cancelled run reports `cancelled` with whatever it completed, and
    /// already-transferred blobs remain valid for the next run.
    pub async fn sync_notebook(
        &self,
        notebook_id: Uuid,
        key: &NotebookKey,
        progress: Option<&ProgressFn>,
        cancel: &CancellationToken,
    ) -> VellumResult<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport::default();

        emit(progress, SyncPhase::FetchingManifest, 0, 0);
        if cancel.is_cancelled() {
            return Ok(finish_cancelled(report, started));
        }

        let manifest_key = artifact::notebook_manifest(notebook_id);
        let cached_bytes = self.cache.get(&manifest_key).await?;
        let remote_bytes = self.remote.get(&manifest_key).await?;

        // A device that has never opened this notebook needs the meta before
        // it can unwrap the key, so a one-sided meta is mirrored here.
        self.mirror_one_sided(&artifact::notebook_meta(notebook_id), &mut report)
            .await;

        emit(progress, SyncPhase::Comparing, 0, 0);
        let local = cached_bytes.map(|b| Manifest::open(&b, key)).transpose()?;
        let remote = remote_bytes.map(|b| Manifest::open(&b, key)).transpose()?;

        let (merged, plan) = match (local, remote) {
            (Some(local), Some(remote)) => {
                let plan = compare(&local, &remote, &self.cache).await?;
                let (merged, conflicts) = local.merge(&remote);
                report.conflicts = conflicts;
                (merged, plan)
            }
            (Some(local), None) => {
                debug!(notebook = %notebook_id, "remote has no manifest, populating");
                let plan = SyncPlan::populate_remote(&local);
                (local, plan)
            }
            (None, Some(remote)) => {
                debug!(notebook = %notebook_id, "cache has no manifest, populating");
                let plan = SyncPlan::populate_cache(&remote);
                (remote, plan)
            }
            (None, None) => {
                return Err(VellumError::NotFound(format!(
                    "manifest for notebook {notebook_id} missing on both ports"
                )));
            }
        };

        debug!(
            notebook = %notebook_id,
            download = plan.to_download.len(),
            upload = plan.to_upload.len(),
            delete_remote = plan.to_delete_remote.len(),
            delete_local = plan.to_delete_local.len(),
            "sync plan ready"
        );

        let total = plan.to_download.len() as u64;
        emit(progress, SyncPhase::Downloading, 0, total);
        for (i, item) in plan.to_download.iter().copied().enumerate() {
            if cancel.is_cancelled() {
                return Ok(finish_cancelled(report, started));
            }
            match self.pull_blob(notebook_id, item).await {
                Ok(()) => report.downloaded += 1,
                Err(e) => {
                    warn!(notebook = %notebook_id, item = %item, "download failed: {e}");
                    report.errors.push(format!("download {item}: {e}"));
                }
            }
            emit(progress, SyncPhase::Downloading, (i + 1) as u64, total);
        }

        let total = plan.to_upload.len() as u64;
        emit(progress, SyncPhase::Uploading, 0, total);
        for (i, item) in plan.to_upload.iter().copied().enumerate() {
            if cancel.is_cancelled() {
                return Ok(finish_cancelled(report, started));
            }
            match self.push_blob(notebook_id, item).await {
                Ok(()) => report.uploaded += 1,
                Err(e) => {
                    warn!(notebook = %notebook_id, item = %item, "upload failed: {e}");
                    report.errors.push(format!("upload {item}: {e}"));
                }
            }
            emit(progress, SyncPhase::Uploading, (i + 1) as u64, total);
        }

        let total = plan.to_delete_remote.len() as u64;
        emit(progress, SyncPhase::DeletingRemote, 0, total);
        for (i, item) in plan.to_delete_remote.iter().copied().enumerate() {
            if cancel.is_cancelled() {
                return Ok(finish_cancelled(report, started));
            }
            match self.remote.delete(&artifact::blob(notebook_id, item)).await {
                Ok(_) => report.deleted_remote += 1,
                Err(e) => {
                    warn!(notebook = %notebook_id, item = %item, "remote delete failed: {e}");
                    report.errors.push(format!("delete remote {item}: {e}"));
                }
            }
            emit(progress, SyncPhase::DeletingRemote, (i + 1) as u64, total);
        }

        let total = plan.to_delete_local.len() as u64;
        emit(progress, SyncPhase::DeletingLocal, 0, total);
        for (i, item) in plan.to_delete_local.iter().copied().enumerate() {
            if cancel.is_cancelled() {
                return Ok(finish_cancelled(report, started));
            }
            match self.cache.delete(&artifact::blob(notebook_id, item)).await {
                Ok(_) => report.deleted_local += 1,
                Err(e) => {
                    warn!(notebook = %notebook_id, item = %item, "local delete failed: {e}");
                    report.errors.push(format!("delete local {item}: {e}"));
                }
            }
            emit(progress, SyncPhase::DeletingLocal, (i + 1) as u64, total);
        }

        emit(progress, SyncPhase::SavingManifest, 0, 0);
        if cancel.is_cancelled() {
            return Ok(finish_cancelled(report, started));
        }
        match merged.seal(key) {
            Ok(sealed) => {
                if let Err(e) = self.cache.put(&manifest_key, sealed.clone()).await {
                    warn!(notebook = %notebook_id, "saving cached manifest failed: {e}");
                    report.errors.push(format!("save cached manifest: {e}"));
                }
                if let Err(e) = self.remote.put(&manifest_key, sealed).await {
                    warn!(notebook = %notebook_id, "saving remote manifest failed: {e}");
                    report.errors.push(format!("save remote manifest: {e}"));
                }
            }
            Err(e) => report.errors.push(format!("seal manifest: {e}")),
        }

        emit(progress, SyncPhase::Idle, 0, 0);
        report.duration = started.elapsed();
        info!(
            notebook = %notebook_id,
            downloaded = report.downloaded,
            uploaded = report.uploaded,
            deleted_remote = report.deleted_remote,
            deleted_local = report.deleted_local,
            conflicts = report.conflicts,
            errors = report.errors.len(),
            "notebook sync complete"
        );
        Ok(report)
    }

    /// Reconcile the account root: the plaintext root meta and the sealed
    /// notebook map. Root runs move no blobs, so the four transfer phases
    /// are skipped; the remaining phases keep their order.
    pub async fn sync_root(
        &self,
        key: &MapKey,
        progress: Option<&ProgressFn>,
        cancel: &CancellationToken,
    ) -> VellumResult<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport::default();

        emit(progress, SyncPhase::FetchingManifest, 0, 0);
        if cancel.is_cancelled() {
            return Ok(finish_cancelled(report, started));
        }

        self.mirror_one_sided(artifact::ROOT_META, &mut report).await;

        let cached_bytes = self.cache.get(artifact::ROOT_MAP).await?;
        let remote_bytes = self.remote.get(artifact::ROOT_MAP).await?;

        emit(progress, SyncPhase::Comparing, 0, 0);
        let local = cached_bytes.map(|b| Map::open(&b, key)).transpose()?;
        let remote = remote_bytes.map(|b| Map::open(&b, key)).transpose()?;

        let merged = match (local, remote) {
            (Some(local), Some(remote)) => {
                let (merged, conflicts) = local.merge(&remote);
                report.conflicts = conflicts;
                merged
            }
            (Some(local), None) => {
                debug!("remote has no root map, populating");
                local
            }
            (None, Some(remote)) => {
                debug!("cache has no root map, populating");
                remote
            }
            (None, None) => {
                return Err(VellumError::NotFound(
                    "root map missing on both ports".to_string(),
                ));
            }
        };

        emit(progress, SyncPhase::SavingManifest, 0, 0);
        if cancel.is_cancelled() {
            return Ok(finish_cancelled(report, started));
        }
        match merged.seal(key) {
            Ok(sealed) => {
                if let Err(e) = self.cache.put(artifact::ROOT_MAP, sealed.clone()).await {
                    warn!("saving cached root map failed: {e}");
                    report.errors.push(format!("save cached root map: {e}"));
                }
                if let Err(e) = self.remote.put(artifact::ROOT_MAP, sealed).await {
                    warn!("saving remote root map failed: {e}");
                    report.errors.push(format!("save remote root map: {e}"));
                }
            }
            Err(e) => report.errors.push(format!("seal root map: {e}")),
        }

        emit(progress, SyncPhase::Idle, 0, 0);
        report.duration = started.elapsed();
        info!(
            conflicts = report.conflicts,
            errors = report.errors.len(),
            "root sync complete"
        );
        Ok(report)
    }

    /// Copy a plaintext artifact to whichever port lacks it. Best-effort:
    /// failures are recorded in the report but never abort the run.
    async fn mirror_one_sided(&self, key: &str, report: &mut SyncReport) {
        let result: VellumResult<()> = async {
            let cached = self.cache.get(key).await?;
            let remote = self.remote.get(key).await?;
            match (cached, remote) {
                (Some(bytes), None) => {
                    debug!(key, "mirroring to remote");
                    self.remote.put(key, bytes).await
                }
                (None, Some(bytes)) => {
                    debug!(key, "mirroring to cache");
                    self.cache.put(key, bytes).await
                }
                _ => Ok(()),
            }
        }
        .await;

        if let Err(e) = result {
            warn!(key, "mirror failed: {e}");
            report.errors.push(format!("mirror {key}: {e}"));
        }
    }

    async fn pull_blob(&self, notebook: Uuid, item: Uuid) -> VellumResult<()> {
        let key = artifact::blob(notebook, item);
        match self.remote.get(&key).await? {
            Some(bytes) => self.cache.put(&key, bytes).await,
            None => Err(VellumError::NotFound(format!("remote blob {key} vanished"))),
        }
    }

    async fn push_blob(&self, notebook: Uuid, item: Uuid) -> VellumResult<()> {
        let key = artifact::blob(notebook, item);
        match self.cache.get(&key).await? {
            Some(bytes) => self.remote.put(&key, bytes).await,
            None => Err(VellumError::NotFound(format!("cached blob {key} vanished"))),
        }
    }
}

fn emit(progress: Option<&ProgressFn>, phase: SyncPhase, current: u64, total: u64) {
    if let Some(cb) = progress {
        cb(phase, current, total);
    }
}

fn finish_cancelled(mut report: SyncReport, started: Instant) -> SyncReport {
    debug!("sync run cancelled");
    report.cancelled = true;
    report.errors.push("operation cancelled".to_string());
    report.duration = started.elapsed();
    report
}
