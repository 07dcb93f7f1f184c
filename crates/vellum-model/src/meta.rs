//! Plaintext metas: the bootstrap records of the key hierarchy
//!
//! Metas are the only artifacts stored unencrypted. They hold nothing but
//! KDF parameter records and wrapped keys, which is exactly what a device
//! needs to turn a passphrase back into the hierarchy. `unlock` failing with
//! `Authentication` is the wrong-passphrase signal.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vellum_core::config::KdfConfig;
use vellum_core::{VellumError, VellumResult};
use vellum_crypto::{
    derive_map_kek, derive_notebook_kek, unwrap_map_key, unwrap_notebook_key, wrap_key,
    EncryptedContainer, MapKdfParams, MapKey, NotebookKdfParams, NotebookKey, NONCE_SIZE,
    TAG_SIZE,
};

/// Current meta format version.
pub const META_VERSION: u32 = 1;

/// Cipher tag recorded in every meta.
pub const CIPHER_NAME: &str = "xchacha20-poly1305";

/// AEAD parameters recorded alongside the wrapped key, so future format
/// revisions can be told apart from corruption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionParams {
    pub cipher: String,
    pub nonce_size: u32,
    pub tag_size: u32,
}

impl Default for EncryptionParams {
    fn default() -> Self {
        Self {
            cipher: CIPHER_NAME.to_string(),
            nonce_size: NONCE_SIZE as u32,
            tag_size: TAG_SIZE as u32,
        }
    }
}

impl EncryptionParams {
    fn check(&self) -> VellumResult<()> {
        if self.cipher != CIPHER_NAME {
            return Err(VellumError::Validation(format!(
                "unsupported cipher: {}",
                self.cipher
            )));
        }
        Ok(())
    }
}

/// The account bootstrap record, stored at `root-meta` as plaintext JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootMeta {
    pub version: u32,
    pub kdf: MapKdfParams,
    /// Base64 of the packed container holding the wrapped map key
    pub wrapped_key: String,
    pub encryption: EncryptionParams,
}

impl RootMeta {
    /// Create a fresh account record: generate the map key and wrap it under
    /// a KEK derived from the passphrase.
    pub fn create(passphrase: &SecretString, kdf_cfg: &KdfConfig) -> VellumResult<(Self, MapKey)> {
        let kdf = MapKdfParams::generate(kdf_cfg.map_iterations);
        let kek = derive_map_kek(passphrase, &kdf)?;
        let map_key = MapKey::generate();
        let wrapped = wrap_key(&map_key, &kek)?;

        let meta = Self {
            version: META_VERSION,
            kdf,
            wrapped_key: BASE64.encode(wrapped.pack()),
            encryption: EncryptionParams::default(),
        };
        Ok((meta, map_key))
    }

    /// Re-derive the KEK from the passphrase and unwrap the map key.
    pub fn unlock(&self, passphrase: &SecretString) -> VellumResult<MapKey> {
        self.encryption.check()?;
        let kek = derive_map_kek(passphrase, &self.kdf)?;
        let wrapped = EncryptedContainer::unpack(&decode_wrapped(&self.wrapped_key)?)?;
        unwrap_map_key(&wrapped, &kek)
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> VellumResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| VellumError::Validation(format!("root meta serialization: {e}")))
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(data: &[u8]) -> VellumResult<Self> {
        serde_json::from_slice(data)
            .map_err(|e| VellumError::Validation(format!("root meta deserialization: {e}")))
    }
}

/// A notebook's bootstrap record, stored at `notebook/{id}/meta` as
/// plaintext JSON. Carries its own Argon2id salt, so every notebook key is
/// derived independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookMeta {
    pub version: u32,
    pub notebook_id: Uuid,
    pub kdf: NotebookKdfParams,
    /// Base64 of the packed container holding the wrapped notebook key
    pub wrapped_key: String,
    pub encryption: EncryptionParams,
}

impl NotebookMeta {
    /// Create a fresh notebook record: generate the notebook key and wrap it
    /// under a KEK derived from the passphrase with a new salt.
    pub fn create(
        notebook_id: Uuid,
        passphrase: &SecretString,
        kdf_cfg: &KdfConfig,
    ) -> VellumResult<(Self, NotebookKey)> {
        let kdf = NotebookKdfParams::generate(
            kdf_cfg.notebook_iterations,
            kdf_cfg.notebook_memory_kib,
            kdf_cfg.notebook_parallelism,
        );
        let kek = derive_notebook_kek(passphrase, &kdf)?;
        let notebook_key = NotebookKey::generate();
        let wrapped = wrap_key(&notebook_key, &kek)?;

        let meta = Self {
            version: META_VERSION,
            notebook_id,
            kdf,
            wrapped_key: BASE64.encode(wrapped.pack()),
            encryption: EncryptionParams::default(),
        };
        Ok((meta, notebook_key))
    }

    /// Re-derive the KEK from the passphrase and unwrap the notebook key.
    pub fn unlock(&self, passphrase: &SecretString) -> VellumResult<NotebookKey> {
        self.encryption.check()?;
        let kek = derive_notebook_kek(passphrase, &self.kdf)?;
        let wrapped = EncryptedContainer::unpack(&decode_wrapped(&self.wrapped_key)?)?;
        unwrap_notebook_key(&wrapped, &kek)
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> VellumResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| VellumError::Validation(format!("notebook meta serialization: {e}")))
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(data: &[u8]) -> VellumResult<Self> {
        serde_json::from_slice(data)
            .map_err(|e| VellumError::Validation(format!("notebook meta deserialization: {e}")))
    }
}

fn decode_wrapped(b64: &str) -> VellumResult<Vec<u8>> {
    BASE64
        .decode(b64)
        .map_err(|e| VellumError::Validation(format!("bad wrapped key encoding: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_crypto::CipherKey;

    /// Fast KDF settings so tests stay quick.
    fn test_kdf_config() -> KdfConfig {
        KdfConfig {
            map_iterations: 1000,
            notebook_iterations: 1,
            notebook_memory_kib: 1024,
            notebook_parallelism: 1,
        }
    }

    #[test]
    fn test_root_meta_create_unlock_roundtrip() {
        let passphrase = SecretString::from("correct horse battery staple");
        let (meta, map_key) = RootMeta::create(&passphrase, &test_kdf_config()).unwrap();

        let unlocked = meta.unlock(&passphrase).unwrap();
        assert_eq!(unlocked.key_bytes(), map_key.key_bytes());
    }

    #[test]
    fn test_root_meta_wrong_passphrase_is_authentication() {
        let (meta, _) =
            RootMeta::create(&SecretString::from("right"), &test_kdf_config()).unwrap();

        let err = meta.unlock(&SecretString::from("wrong")).unwrap_err();
        assert!(
            err.is_authentication(),
            "wrong passphrase must surface as Authentication, got {err:?}"
        );
    }

    #[test]
    fn test_root_meta_bytes_roundtrip() {
        let passphrase = SecretString::from("pw");
        let (meta, map_key) = RootMeta::create(&passphrase, &test_kdf_config()).unwrap();

        let bytes = meta.to_bytes().unwrap();
        let restored = RootMeta::from_bytes(&bytes).unwrap();

        assert_eq!(restored, meta);
        // The restored record still unlocks to the same key
        let unlocked = restored.unlock(&passphrase).unwrap();
        assert_eq!(unlocked.key_bytes(), map_key.key_bytes());
    }

    #[test]
    fn test_root_meta_garbage_is_validation() {
        let err = RootMeta::from_bytes(b"{ not json").unwrap_err();
        assert!(matches!(err, VellumError::Validation(_)));
    }

    #[test]
    fn test_root_meta_unsupported_cipher_rejected() {
        let (mut meta, _) =
            RootMeta::create(&SecretString::from("pw"), &test_kdf_config()).unwrap();
        meta.encryption.cipher = "aes-256-gcm".to_string();

        let err = meta.unlock(&SecretString::from("pw")).unwrap_err();
        assert!(matches!(err, VellumError::Validation(_)));
    }

    #[test]
    fn test_notebook_meta_create_unlock_roundtrip() {
        let passphrase = SecretString::from("notebook passphrase");
        let id = Uuid::new_v4();
        let (meta, key) = NotebookMeta::create(id, &passphrase, &test_kdf_config()).unwrap();

        assert_eq!(meta.notebook_id, id);
        let unlocked = meta.unlock(&passphrase).unwrap();
        assert_eq!(unlocked.key_bytes(), key.key_bytes());
    }

    #[test]
    fn test_notebook_meta_wrong_passphrase_is_authentication() {
        let (meta, _) = NotebookMeta::create(
            Uuid::new_v4(),
            &SecretString::from("right"),
            &test_kdf_config(),
        )
        .unwrap();

        let err = meta.unlock(&SecretString::from("wrong")).unwrap_err();
        assert!(err.is_authentication());
    }

    #[test]
    fn test_notebook_metas_use_distinct_salts() {
        let passphrase = SecretString::from("same passphrase");
        let cfg = test_kdf_config();

        let (a, key_a) = NotebookMeta::create(Uuid::new_v4(), &passphrase, &cfg).unwrap();
        let (b, key_b) = NotebookMeta::create(Uuid::new_v4(), &passphrase, &cfg).unwrap();

        assert_ne!(a.kdf.salt, b.kdf.salt, "each notebook gets its own salt");
        assert_ne!(key_a.key_bytes(), key_b.key_bytes());
    }

    #[test]
    fn test_notebook_meta_bytes_roundtrip() {
        let (meta, _) = NotebookMeta::create(
            Uuid::new_v4(),
            &SecretString::from("pw"),
            &test_kdf_config(),
        )
        .unwrap();

        let restored = NotebookMeta::from_bytes(&meta.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, meta);
    }

    #[test]
    fn test_tampered_wrapped_key_fails_unlock() {
        let passphrase = SecretString::from("pw");
        let (mut meta, _) = RootMeta::create(&passphrase, &test_kdf_config()).unwrap();

        let mut raw = BASE64.decode(&meta.wrapped_key).unwrap();
        raw[30] ^= 0xFF;
        meta.wrapped_key = BASE64.encode(raw);

        let err = meta.unlock(&passphrase).unwrap_err();
        assert!(err.is_authentication());
    }
}
