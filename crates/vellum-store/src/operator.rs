//! Operator factories for the cache and remote ports

use std::path::Path;

use anyhow::{Context, Result};
use opendal::Operator;

use vellum_core::config::RemoteConfig;

use crate::store::{Store, StoreRole};

/// In-memory store. Tests and ephemeral sessions.
pub fn memory_store(role: StoreRole) -> Result<Store> {
    let op = Operator::new(opendal::services::Memory::default())
        .context("creating memory operator")?
        .finish();
    Ok(Store::new(op, role))
}

/// Filesystem store rooted at `dir`. The usual cache port.
pub fn fs_store(role: StoreRole, dir: &Path) -> Result<Store> {
    let builder = opendal::services::Fs::default().root(&dir.to_string_lossy());
    let op = Operator::new(builder)
        .context("creating fs operator")?
        .finish();
    Ok(Store::new(op, role))
}

/// S3-compatible remote store (MinIO, SeaweedFS, AWS) with logging and
/// retries. Path-style addressing is the opendal default, which is what
/// MinIO and SeaweedFS require.
///
/// If `enforce_tls` is set and the endpoint is plain HTTP, this fails;
/// otherwise HTTP only logs a warning for local development setups.
pub fn s3_store(
    role: StoreRole,
    cfg: &RemoteConfig,
    access_key_id: &str,
    secret_access_key: &str,
) -> Result<Store> {
    if cfg.endpoint.starts_with("http://") {
        if cfg.enforce_tls {
            anyhow::bail!(
                "remote endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set remote.enforce_tls = false for local development.",
                cfg.endpoint
            );
        }
        tracing::warn!(
            endpoint = %cfg.endpoint,
            "remote endpoint uses plaintext HTTP. Set remote.enforce_tls = true \
             and use HTTPS in production."
        );
    }

    let builder = opendal::services::S3::default()
        .endpoint(&cfg.endpoint)
        .region(&cfg.region)
        .bucket(&cfg.bucket)
        .access_key_id(access_key_id)
        .secret_access_key(secret_access_key);

    let op = Operator::new(builder)
        .context("creating S3 operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();

    Ok(Store::new(op, role))
}
