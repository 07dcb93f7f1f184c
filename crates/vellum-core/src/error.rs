use thiserror::Error;

pub type VellumResult<T> = Result<T, VellumError>;

/// Error taxonomy shared by every vellum crate.
///
/// The sync engine routes on these variants: `Authentication` is the sole
/// wrong-passphrase signal, `Network` is retryable and never aborts a
/// multi-notebook sync, and `Cancelled` is reported distinctly so callers
/// can suppress user-facing alarms.
#[derive(Debug, Error)]
pub enum VellumError {
    /// AEAD tag verification failed while unwrapping a key or opening a
    /// container. Surfaced to the caller as "wrong credentials".
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Entity absent from both ports, or a referenced uuid is unknown.
    /// Fatal for the single operation, not for the session.
    #[error("not found: {0}")]
    NotFound(String),

    /// A remote port call failed. Retryable.
    #[error("network error: {0}")]
    Network(String),

    /// Cooperative abort via a cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// Malformed persisted structure, duplicate uuid, or missing field.
    #[error("validation error: {0}")]
    Validation(String),

    /// Cache-port (local) storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VellumError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
