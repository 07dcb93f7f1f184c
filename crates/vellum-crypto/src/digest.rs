//! Content hashing for manifest change detection

use sha2::{Digest, Sha256};

/// Hash item content for the manifest's change-detection field.
///
/// Format: `sha256-<lowercase hex>`. The hash covers the plaintext but only
/// ever travels inside sealed manifests, so it leaks nothing to the server.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("sha256-{}", hex::encode(digest))
}
