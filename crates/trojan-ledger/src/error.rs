//! Ledger error types.

use crate::storage::StorageError;

/// Ledger error.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The supplied key is neither a raw secret, a derived key, nor a
    /// well-formed canonical key.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Storage collaborator failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A stored traffic record could not be decoded.
    #[error("corrupt record {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A traffic record could not be encoded for storage.
    #[error("encode record {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The ledger's cancellation token fired while waiting on storage.
    #[error("operation cancelled")]
    Cancelled,

    /// A storage call exceeded the configured operation timeout.
    #[error("storage operation timed out: {0}")]
    Timeout(String),

    /// The distributed lock could not be acquired in time.
    #[error("lock acquisition timed out: {0}")]
    LockTimeout(String),

    /// Invalid ledger configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Create an invalid-key error from any displayable reason.
    #[inline]
    pub fn invalid_key<E: std::fmt::Display>(reason: E) -> Self {
        Self::InvalidKey(reason.to_string())
    }
}
