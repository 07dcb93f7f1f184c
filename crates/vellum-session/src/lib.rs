//! Session orchestration for a vellum account.
//!
//! A [`Vault`] owns the cache and remote ports and everything that must not
//! outlive an unlocked session: the map key, per-notebook keys, and the
//! decrypted-item cache. UIs drive the whole product surface through it;
//! key material never crosses the crate boundary.

pub mod blob_cache;
pub mod state;
pub mod vault;

pub use blob_cache::BlobCache;
pub use state::SessionState;
pub use vault::{SyncSummary, Vault};
