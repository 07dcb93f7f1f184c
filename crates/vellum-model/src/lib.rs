//! vellum-model: the plaintext data model and entry-level LWW merge
//!
//! Pure domain types with no I/O. Everything here is either what the
//! ciphertext protects (the root map and the notebook manifests) or the
//! plaintext bootstrap records that let a passphrase re-derive the key
//! hierarchy (the metas). The merge algorithm is written once, generically,
//! and shared by map and manifest reconciliation.

pub mod manifest;
pub mod map;
pub mod merge;
pub mod meta;

pub use manifest::{ItemKind, Manifest, ManifestEntry};
pub use map::{Map, MapEntry};
pub use merge::{merge_entries, LwwEntry, MergeOutcome};
pub use meta::{EncryptionParams, NotebookMeta, RootMeta};

// The key types named throughout the model's seal/open surface, re-exported
// so downstream crates need not reach into vellum-crypto for them.
pub use vellum_crypto::{MapKey, NotebookKey};
