//! The artifact namespace shared by both ports
//!
//! ```text
//! root-meta                       plaintext JSON
//! root-map                        packed container
//! notebook/{uuid}/meta            plaintext JSON
//! notebook/{uuid}/manifest        packed container
//! notebook/{uuid}/blobs/{uuid}    packed container, one per item
//! ```
//!
//! Keys are identical on the cache and the remote, so sync never translates
//! paths. Everything the remote can see is a uuid or ciphertext.

use uuid::Uuid;

/// Account bootstrap record.
pub const ROOT_META: &str = "root-meta";

/// Sealed notebook index.
pub const ROOT_MAP: &str = "root-map";

/// Everything belonging to one notebook.
pub fn notebook_prefix(id: Uuid) -> String {
    format!("notebook/{id}/")
}

pub fn notebook_meta(id: Uuid) -> String {
    format!("notebook/{id}/meta")
}

pub fn notebook_manifest(id: Uuid) -> String {
    format!("notebook/{id}/manifest")
}

/// All item blobs of one notebook.
pub fn blob_prefix(id: Uuid) -> String {
    format!("notebook/{id}/blobs/")
}

pub fn blob(notebook: Uuid, item: Uuid) -> String {
    format!("notebook/{notebook}/blobs/{item}")
}

/// Extract the item id from a listed blob path. Directory markers and
/// stray keys return `None`.
pub fn parse_blob_id(path: &str) -> Option<Uuid> {
    let name = path.trim_end_matches('/').rsplit('/').next()?;
    Uuid::parse_str(name).ok()
}
