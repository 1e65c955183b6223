//! In-process storage engine.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use super::{Storage, StorageError};

/// In-process [`Storage`] backed by an ordered map.
///
/// Locks are held in a name table; waiters park on a shared [`Notify`] and
/// re-check after every release. Suitable for tests and for single-process
/// deployments that still want the persistent ledger's semantics.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
    locks: Mutex<HashSet<String>>,
    released: Notify,
}

impl MemoryStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check whether the named lock is currently held.
    pub fn is_locked(&self, key: &str) -> bool {
        self.locks.lock().contains(key)
    }

    /// Write raw bytes, bypassing any ledger encoding.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.data.write().insert(key.into(), value.into());
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.data.read().contains_key(key))
    }

    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.data.write().insert(key.to_owned(), value);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_owned()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.data.write().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>, StorageError> {
        let data = self.data.read();
        let keys = data
            .range(prefix.to_owned()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix))
            .filter(|k| recursive || !k[prefix.len()..].contains('/'))
            .cloned()
            .collect();
        Ok(keys)
    }

    async fn lock(&self, key: &str) -> Result<(), StorageError> {
        loop {
            // Register interest before checking so a release between the
            // check and the await is not missed.
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let acquired = self.locks.lock().insert(key.to_owned());
            if acquired {
                return Ok(());
            }
            notified.await;
        }
    }

    async fn unlock(&self, key: &str) -> Result<(), StorageError> {
        let removed = self.locks.lock().remove(key);
        if removed {
            self.released.notify_waiters();
        }
        Ok(())
    }
}
