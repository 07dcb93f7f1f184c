//! XChaCha20-Poly1305 seal/open and the packed container format
//!
//! Packed layout (binary):
//! ```text
//! [24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! ```
//!
//! Every artifact that reaches a port encrypted (root map, manifests, item
//! blobs, wrapped keys) is one of these. A failed tag check surfaces as
//! `Authentication`, never as a decode error: it is the system's only
//! wrong-key / wrong-passphrase signal.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use vellum_core::{VellumError, VellumResult};

use crate::keys::CipherKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// A sealed payload with the tag held separately so the parts can be packed
/// and unpacked without re-parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedContainer {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

impl EncryptedContainer {
    /// Serialize to the packed wire format: nonce, then ciphertext, then tag.
    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len() + TAG_SIZE);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Parse the packed wire format.
    ///
    /// An empty ciphertext is legal (sealing an empty payload), so the
    /// minimum length is nonce + tag.
    pub fn unpack(bytes: &[u8]) -> VellumResult<Self> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(VellumError::Validation(format!(
                "packed container too short: {} bytes (minimum {})",
                bytes.len(),
                NONCE_SIZE + TAG_SIZE
            )));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[..NONCE_SIZE]);
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&bytes[bytes.len() - TAG_SIZE..]);
        let ciphertext = bytes[NONCE_SIZE..bytes.len() - TAG_SIZE].to_vec();

        Ok(Self {
            nonce,
            ciphertext,
            tag,
        })
    }
}

/// Seal a plaintext under `key` with a fresh random nonce.
pub fn seal(plaintext: &[u8], key: &impl CipherKey) -> VellumResult<EncryptedContainer> {
    let cipher = XChaCha20Poly1305::new(key.key_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let mut sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| VellumError::Other(anyhow::anyhow!("encryption failed: {e}")))?;

    // encrypt() appends the tag after the ciphertext
    let tag_start = sealed.len() - TAG_SIZE;
    let tag_vec = sealed.split_off(tag_start);
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&tag_vec);

    Ok(EncryptedContainer {
        nonce: nonce_bytes,
        ciphertext: sealed,
        tag,
    })
}

/// Open a sealed container, verifying the Poly1305 tag.
pub fn open(container: &EncryptedContainer, key: &impl CipherKey) -> VellumResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.key_bytes().into());
    let nonce = XNonce::from_slice(&container.nonce);

    let mut sealed = Vec::with_capacity(container.ciphertext.len() + TAG_SIZE);
    sealed.extend_from_slice(&container.ciphertext);
    sealed.extend_from_slice(&container.tag);

    cipher.decrypt(nonce, sealed.as_ref()).map_err(|_| {
        VellumError::Authentication("container tag verification failed".to_string())
    })
}


#[cfg(test)]
mod proptest_suite {
    use super::*;
    use crate::keys::NotebookKey;
    use crate::KEY_SIZE;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn seal_open_roundtrip(data in prop::collection::vec(any::<u8>(), 0..4096)) {
            let key = NotebookKey::from_bytes([9u8; KEY_SIZE]);
            let container = seal(&data, &key).unwrap();
            let opened = open(&container, &key).unwrap();
            prop_assert_eq!(opened, data);
        }

        #[test]
        fn pack_unpack_identity(data in prop::collection::vec(any::<u8>(), 0..4096)) {
            let key = NotebookKey::from_bytes([9u8; KEY_SIZE]);
            let container = seal(&data, &key).unwrap();
            let unpacked = EncryptedContainer::unpack(&container.pack()).unwrap();
            prop_assert_eq!(container, unpacked);
        }

        #[test]
        fn packed_roundtrip_through_ports(data in prop::collection::vec(any::<u8>(), 0..2048)) {
            // What sync actually does: pack on one side, unpack + open on the other
            let key = NotebookKey::from_bytes([3u8; KEY_SIZE]);
            let wire = seal(&data, &key).unwrap().pack();
            let opened = open(&EncryptedContainer::unpack(&wire).unwrap(), &key).unwrap();
            prop_assert_eq!(opened, data);
        }
    }
}
