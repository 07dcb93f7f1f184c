//! Passphrase key derivation: PBKDF2-HMAC-SHA256 for the map KEK,
//! Argon2id for notebook KEKs
//!
//! The map KEK is re-derived on every unlock, so it uses the fast KDF.
//! Notebook KEKs guard long-lived content and use the memory-hard KDF with a
//! per-notebook salt. Parameter records are persisted verbatim in the
//! plaintext metas; re-derivation always uses the stored record, never the
//! current config defaults.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use vellum_core::{VellumError, VellumResult};

use crate::keys::CipherKey;
use crate::KEY_SIZE;

/// Salt length for both KDFs, in bytes
pub const SALT_SIZE: usize = 16;

/// Algorithm tag recorded in root metas
pub const MAP_KDF_ALGORITHM: &str = "pbkdf2-sha256";

/// Algorithm tag recorded in notebook metas
pub const NOTEBOOK_KDF_ALGORITHM: &str = "argon2id";

/// A 256-bit key-encryption key derived from a passphrase.
///
/// Zeroized on drop to prevent secrets lingering in memory. Never persisted;
/// only the parameter record needed to re-derive it is.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }
}

impl CipherKey for DerivedKey {
    fn key_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2-HMAC-SHA256 parameter record, stored in the root meta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapKdfParams {
    pub algorithm: String,
    /// Base64-encoded 16-byte salt
    pub salt: String,
    pub iterations: u32,
}

impl MapKdfParams {
    /// Make a fresh record with a random salt.
    pub fn generate(iterations: u32) -> Self {
        Self {
            algorithm: MAP_KDF_ALGORITHM.to_string(),
            salt: BASE64.encode(random_salt()),
            iterations,
        }
    }

    fn salt_bytes(&self) -> VellumResult<Vec<u8>> {
        BASE64
            .decode(&self.salt)
            .map_err(|e| VellumError::Validation(format!("bad KDF salt encoding: {e}")))
    }
}

/// Argon2id parameter record, stored per notebook in its meta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookKdfParams {
    pub algorithm: String,
    /// Base64-encoded 16-byte salt
    pub salt: String,
    /// Time cost / iterations
    pub iterations: u32,
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub parallelism: u32,
}

impl NotebookKdfParams {
    /// Make a fresh record with a random salt.
    pub fn generate(iterations: u32, memory_kib: u32, parallelism: u32) -> Self {
        Self {
            algorithm: NOTEBOOK_KDF_ALGORITHM.to_string(),
            salt: BASE64.encode(random_salt()),
            iterations,
            memory_kib,
            parallelism,
        }
    }

    fn salt_bytes(&self) -> VellumResult<Vec<u8>> {
        BASE64
            .decode(&self.salt)
            .map_err(|e| VellumError::Validation(format!("bad KDF salt encoding: {e}")))
    }
}

fn random_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive the map key-encryption key from a passphrase via PBKDF2-HMAC-SHA256.
pub fn derive_map_kek(
    passphrase: &SecretString,
    params: &MapKdfParams,
) -> VellumResult<DerivedKey> {
    if params.algorithm != MAP_KDF_ALGORITHM {
        return Err(VellumError::Validation(format!(
            "unsupported map KDF algorithm: {}",
            params.algorithm
        )));
    }
    if params.iterations == 0 {
        return Err(VellumError::Validation(
            "map KDF iterations must be nonzero".to_string(),
        ));
    }
    let salt = params.salt_bytes()?;

    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        passphrase.expose_secret().as_bytes(),
        &salt,
        params.iterations,
        &mut key,
    );
    Ok(DerivedKey::from_bytes(key))
}

/// Derive a notebook key-encryption key from a passphrase via Argon2id.
pub fn derive_notebook_kek(
    passphrase: &SecretString,
    params: &NotebookKdfParams,
) -> VellumResult<DerivedKey> {
    if params.algorithm != NOTEBOOK_KDF_ALGORITHM {
        return Err(VellumError::Validation(format!(
            "unsupported notebook KDF algorithm: {}",
            params.algorithm
        )));
    }
    let salt = params.salt_bytes()?;

    let argon2_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| VellumError::Validation(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), &salt, &mut key)
        .map_err(|e| VellumError::Validation(format!("Argon2id KDF failed: {e}")))?;

    Ok(DerivedKey::from_bytes(key))
}
