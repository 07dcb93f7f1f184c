//! Session lock state
//!
//! Key material and the decrypted notebook map exist only inside the
//! `Unlocked` variant, so an operation cannot touch them without first
//! proving the session is unlocked. Locking replaces the whole variant;
//! the passphrase and keys zeroize themselves on drop.

use std::collections::HashMap;

use secrecy::SecretString;
use uuid::Uuid;

use vellum_core::VellumError;
use vellum_model::{Map, MapKey, NotebookKey};

pub enum SessionState {
    Locked,
    Unlocked {
        passphrase: SecretString,
        map_key: MapKey,
        map: Map,
        notebook_keys: HashMap<Uuid, NotebookKey>,
    },
}

impl SessionState {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, SessionState::Unlocked { .. })
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Locked => write!(f, "SessionState::Locked"),
            SessionState::Unlocked { map, notebook_keys, .. } => f
                .debug_struct("SessionState::Unlocked")
                .field("notebooks", &map.entries.len())
                .field("cached_keys", &notebook_keys.len())
                .finish_non_exhaustive(),
        }
    }
}

/// The error every operation that needs key material returns when the
/// session is locked.
pub(crate) fn locked_session() -> VellumError {
    VellumError::Validation("session is locked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_prints_secrets() {
        let state = SessionState::Unlocked {
            passphrase: SecretString::from("hunter2"),
            map_key: MapKey::generate(),
            map: Map::new(),
            notebook_keys: HashMap::new(),
        };

        let rendered = format!("{state:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("Unlocked"));
        assert!(format!("{:?}", SessionState::Locked).contains("Locked"));
    }
}
