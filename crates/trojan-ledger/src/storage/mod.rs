//! Key/value storage collaborator for [`PersistentLedger`](crate::PersistentLedger).
//!
//! This module provides:
//!
//! - [`Storage`]: data-access trait (implement this for new storage engines)
//! - [`StorageError`]: errors reported by a storage engine
//! - [`MemoryStorage`]: in-process implementation
//!
//! # Adding a new storage engine
//!
//! ```ignore
//! use trojan_ledger::storage::{Storage, StorageError};
//!
//! struct MyStorage { /* ... */ }
//!
//! #[async_trait::async_trait]
//! impl Storage for MyStorage {
//!     async fn exists(&self, key: &str) -> Result<bool, StorageError> { todo!() }
//!     async fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> { todo!() }
//!     // ...
//! }
//! ```

mod memory;
mod traits;

pub use memory::MemoryStorage;
pub use traits::Storage;

/// Storage engine error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The key does not exist.
    #[error("key not found: {0}")]
    NotFound(String),

    /// I/O or engine failure.
    #[error("{0}")]
    Io(String),
}

impl StorageError {
    /// Create an I/O error from any error type.
    #[inline]
    pub fn io<E: std::fmt::Display>(err: E) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err)
    }
}
