//! Data-access trait for storage engines.

use std::sync::Arc;

use async_trait::async_trait;

use super::StorageError;

/// Key/value storage with named locks.
///
/// Implementations provide only data access and mutual exclusion. Ledger
/// semantics (normalization, idempotence, read-modify-write) are handled by
/// [`PersistentLedger`](crate::PersistentLedger), which wraps a `Storage`.
///
/// Locks are advisory and keyed by string: every process sharing the same
/// storage must honor them for traffic accounting to be atomic.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Check whether a key exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Read the value under `key`.
    ///
    /// Returns [`StorageError::NotFound`] if the key does not exist.
    async fn load(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove `key`.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List full keys starting with `prefix`.
    ///
    /// When `recursive` is false, keys with a `/` after the prefix are
    /// omitted.
    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>, StorageError>;

    /// Acquire the named lock, waiting until it is free.
    async fn lock(&self, key: &str) -> Result<(), StorageError>;

    /// Release the named lock.
    async fn unlock(&self, key: &str) -> Result<(), StorageError>;
}

/// Blanket implementation for `Arc<S>` where `S: Storage`.
#[async_trait]
impl<S: Storage + ?Sized> Storage for Arc<S> {
    #[inline]
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        (**self).exists(key).await
    }

    #[inline]
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        (**self).store(key, value).await
    }

    #[inline]
    async fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        (**self).load(key).await
    }

    #[inline]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        (**self).delete(key).await
    }

    #[inline]
    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>, StorageError> {
        (**self).list(prefix, recursive).await
    }

    #[inline]
    async fn lock(&self, key: &str) -> Result<(), StorageError> {
        (**self).lock(key).await
    }

    #[inline]
    async fn unlock(&self, key: &str) -> Result<(), StorageError> {
        (**self).unlock(key).await
    }
}
