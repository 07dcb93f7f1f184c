//! Content keys and key wrapping
//!
//! The map key (MEK) and the per-notebook keys (FEKs) are random 256-bit
//! keys. They never touch a port in the clear: each is wrapped (sealed) under
//! a passphrase-derived KEK and stored inside a meta as a packed container.

use rand::RngCore;
use zeroize::Zeroize;

use vellum_core::{VellumError, VellumResult};

use crate::kdf::DerivedKey;
use crate::sealed::{open, seal, EncryptedContainer};
use crate::KEY_SIZE;

/// Raw-byte access shared by every 256-bit key in the hierarchy, so sealing
/// and wrapping are generic over which key encrypts.
pub trait CipherKey {
    fn key_bytes(&self) -> &[u8; KEY_SIZE];
}

/// The map encryption key: seals the root map. Zeroized on drop.
#[derive(Clone)]
pub struct MapKey {
    bytes: [u8; KEY_SIZE],
}

impl MapKey {
    /// Generate a random map key.
    pub fn generate() -> Self {
        Self { bytes: random_key() }
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }
}

impl CipherKey for MapKey {
    fn key_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MapKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MapKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A per-notebook encryption key: seals the manifest and every item blob of
/// one notebook. Zeroized on drop.
#[derive(Clone)]
pub struct NotebookKey {
    bytes: [u8; KEY_SIZE],
}

impl NotebookKey {
    /// Generate a random notebook key.
    pub fn generate() -> Self {
        Self { bytes: random_key() }
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }
}

impl CipherKey for NotebookKey {
    fn key_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for NotebookKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for NotebookKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

fn random_key() -> [u8; KEY_SIZE] {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Wrap (encrypt) a content key under a passphrase-derived KEK.
pub fn wrap_key(key: &impl CipherKey, kek: &DerivedKey) -> VellumResult<EncryptedContainer> {
    seal(key.key_bytes(), kek)
}

/// Unwrap the map encryption key.
///
/// `Authentication` means the passphrase behind the KEK was wrong.
pub fn unwrap_map_key(
    wrapped: &EncryptedContainer,
    kek: &DerivedKey,
) -> VellumResult<MapKey> {
    Ok(MapKey::from_bytes(unwrap_bytes(wrapped, kek)?))
}

/// Unwrap a notebook encryption key.
pub fn unwrap_notebook_key(
    wrapped: &EncryptedContainer,
    kek: &DerivedKey,
) -> VellumResult<NotebookKey> {
    Ok(NotebookKey::from_bytes(unwrap_bytes(wrapped, kek)?))
}

fn unwrap_bytes(
    wrapped: &EncryptedContainer,
    kek: &DerivedKey,
) -> VellumResult<[u8; KEY_SIZE]> {
    let mut plaintext = open(wrapped, kek)?;
    if plaintext.len() != KEY_SIZE {
        plaintext.zeroize();
        return Err(VellumError::Validation(format!(
            "unwrapped key has wrong size: {} bytes (expected {})",
            plaintext.len(),
            KEY_SIZE
        )));
    }

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&plaintext);
    plaintext.zeroize();
    Ok(bytes)
}
