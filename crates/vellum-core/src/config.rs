use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level vellum configuration (loaded from vellum.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VellumConfig {
    pub cache: CacheConfig,
    pub remote: RemoteConfig,
    pub kdf: KdfConfig,
    pub session: SessionConfig,
}

/// Local cache port settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory backing the local cache port
    pub dir: PathBuf,
}

/// Remote blob-store settings (any S3-compatible endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    /// Enforce HTTPS for remote connections (warn/error on HTTP endpoints)
    pub enforce_tls: bool,
}

/// Key-derivation tuning. Persisted parameter records in the metas always
/// win over these values on re-derivation; this section only controls what
/// newly created accounts and notebooks are written with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// PBKDF2-HMAC-SHA256 iterations for the map key-encryption key
    pub map_iterations: u32,
    /// Argon2id time cost for notebook key-encryption keys
    pub notebook_iterations: u32,
    /// Argon2id memory cost in KiB
    pub notebook_memory_kib: u32,
    /// Argon2id parallelism
    pub notebook_parallelism: u32,
}

/// Session-layer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of decrypted blobs held in the in-memory cache
    pub blob_cache_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("~/.local/share/vellum/cache"),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".into(),
            region: "us-east-1".into(),
            bucket: "vellum".into(),
            enforce_tls: false,
        }
    }
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            map_iterations: 600_000,
            notebook_iterations: 3,
            notebook_memory_kib: 65536,
            notebook_parallelism: 4,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            blob_cache_entries: 64,
        }
    }
}
