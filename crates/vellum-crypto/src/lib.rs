//! vellum-crypto: Client-side E2E encryption for vellum notebooks
//!
//! Everything that leaves the device is a packed [`EncryptedContainer`]
//! (XChaCha20-Poly1305); the server only ever sees nonce + ciphertext + tag.
//!
//! Key hierarchy:
//! ```text
//! passphrase
//!   ├── Map KEK (PBKDF2-HMAC-SHA256, fast: unlock runs on every app start)
//!   │   └── wraps the Map Encryption Key (256-bit random)
//!   │         └── seals the root map (notebook index)
//!   └── Notebook KEK (Argon2id, memory-hard, per-notebook salt)
//!       └── wraps the Notebook Encryption Key (256-bit random)
//!             └── seals the notebook manifest and every item blob
//! ```
//!
//! The KEKs are never stored; the KDF parameter records (salt + tuning) are
//! persisted in plaintext metas so any device can re-derive them. A failed
//! Poly1305 tag surfaces as `VellumError::Authentication`, which is the sole
//! wrong-passphrase signal in the system.

pub mod digest;
pub mod kdf;
pub mod keys;
pub mod sealed;

pub use digest::content_hash;
pub use kdf::{derive_map_kek, derive_notebook_kek, DerivedKey, MapKdfParams, NotebookKdfParams};
pub use keys::{unwrap_map_key, unwrap_notebook_key, wrap_key, CipherKey, MapKey, NotebookKey};
pub use sealed::{open, seal, EncryptedContainer};

/// Size of every key in the hierarchy, in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;
