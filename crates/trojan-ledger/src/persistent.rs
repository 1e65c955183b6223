//! Persistent ledger backend.
//!
//! [`PersistentLedger`] keeps no state of its own beyond a namespace prefix:
//! every entry lives in a [`Storage`] collaborator as a JSON-encoded
//! [`Traffic`] record under `prefix + canonical_key`. Traffic accounting is a
//! lock → load → modify → store → unlock cycle on the storage's named lock,
//! which makes it atomic across every process sharing that storage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::{AddMode, PersistentLedgerConfig};
use crate::error::LedgerError;
use crate::key::Key;
use crate::storage::{Storage, StorageError};
use crate::traffic::Traffic;
use crate::traits::{Ledger, Visit};

/// Ledger over a shared key/value [`Storage`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trojan_ledger::{Key, Ledger, PersistentLedger, PersistentLedgerConfig};
/// use trojan_ledger::storage::MemoryStorage;
///
/// # async fn example() -> Result<(), trojan_ledger::LedgerError> {
/// let ledger = PersistentLedger::new(
///     Arc::new(MemoryStorage::new()),
///     PersistentLedgerConfig::new().prefix("trojan/"),
/// );
/// ledger.add("my_password").await?;
/// ledger.consume(Key::Raw("my_password"), 1024, 4096).await?;
/// # Ok(())
/// # }
/// ```
pub struct PersistentLedger {
    storage: Arc<dyn Storage>,
    prefix: String,
    add_mode: AddMode,
    lock_timeout: Option<Duration>,
    op_timeout: Option<Duration>,
    shutdown: CancellationToken,
}

impl PersistentLedger {
    /// Create a ledger over `storage`.
    pub fn new(storage: Arc<dyn Storage>, config: PersistentLedgerConfig) -> Self {
        Self {
            storage,
            prefix: config.prefix,
            add_mode: config.add_mode,
            lock_timeout: config.lock_timeout,
            op_timeout: config.op_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    /// Abort pending storage calls when `token` is cancelled.
    ///
    /// Held distributed locks are still released.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// The namespace prefix.
    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The configured add mode.
    #[inline]
    pub fn add_mode(&self) -> AddMode {
        self.add_mode
    }

    /// The underlying storage.
    #[inline]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Current counters for a key. `Ok(None)` if the entry does not exist.
    pub async fn get(&self, key: Key<'_>) -> Result<Option<Traffic>, LedgerError> {
        let key = self.storage_key(key)?;
        match self.call(self.storage.load(&key)).await {
            Ok(bytes) => Traffic::from_bytes(&key, &bytes).map(Some),
            Err(LedgerError::Storage(StorageError::NotFound(_))) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn storage_key(&self, key: Key<'_>) -> Result<String, LedgerError> {
        let key = key.canonicalize()?;
        Ok(format!("{}{}", self.prefix, key))
    }

    /// Run a storage call under the cancellation token and operation timeout.
    async fn call<T, F>(&self, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, StorageError>> + Send,
    {
        let bounded = async {
            match self.op_timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(res) => res.map_err(LedgerError::from),
                    Err(_) => Err(LedgerError::Timeout(format!("after {limit:?}"))),
                },
                None => fut.await.map_err(LedgerError::from),
            }
        };

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(LedgerError::Cancelled),
            res = bounded => res,
        }
    }

    /// Acquire the distributed lock for `key`.
    async fn acquire(&self, key: &str) -> Result<LockGuard, LedgerError> {
        let lock = self.storage.lock(key);
        let locked = async {
            match self.lock_timeout {
                Some(limit) => match tokio::time::timeout(limit, lock).await {
                    Ok(res) => res.map_err(LedgerError::from),
                    Err(_) => Err(LedgerError::LockTimeout(key.to_owned())),
                },
                None => lock.await.map_err(LedgerError::from),
            }
        };

        let acquired = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(LedgerError::Cancelled),
            res = locked => res,
        };
        acquired?;

        Ok(LockGuard {
            storage: self.storage.clone(),
            key: key.to_owned(),
            held: true,
        })
    }

    /// Run `f` while holding the lock on `key`, releasing it afterwards
    /// whatever `f` returned.
    async fn with_lock<T, F, Fut>(&self, key: &str, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, LedgerError>> + Send,
    {
        let guard = self.acquire(key).await?;
        let result = f().await;
        guard.release().await;
        result
    }

    async fn consume_locked(&self, key: &str, read: i64, written: i64) -> Result<(), LedgerError> {
        let bytes = self.call(self.storage.load(key)).await?;
        let mut traffic = Traffic::from_bytes(key, &bytes)?;
        traffic.add(read, written);
        let bytes = traffic.to_bytes(key)?;
        self.call(self.storage.store(key, bytes)).await
    }

    /// Returns whether a record was written.
    async fn add_locked(&self, key: &str) -> Result<bool, LedgerError> {
        if self.add_mode == AddMode::KeepExisting && self.call(self.storage.exists(key)).await? {
            return Ok(false);
        }
        let zero = Traffic::default().to_bytes(key)?;
        self.call(self.storage.store(key, zero)).await?;
        Ok(true)
    }

    /// Returns whether a record was removed.
    async fn del_locked(&self, key: &str) -> Result<bool, LedgerError> {
        if !self.call(self.storage.exists(key)).await? {
            return Ok(false);
        }
        self.call(self.storage.delete(key)).await?;
        Ok(true)
    }
}

impl std::fmt::Debug for PersistentLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentLedger")
            .field("prefix", &self.prefix)
            .field("add_mode", &self.add_mode)
            .field("lock_timeout", &self.lock_timeout)
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Ledger for PersistentLedger {
    async fn add_key(&self, key: Key<'_>) -> Result<(), LedgerError> {
        let key = self.storage_key(key)?;
        // Every write to an entry happens under its lock, so an in-flight
        // consume can neither resurrect nor be overwritten by a stale record.
        if self.with_lock(&key, || self.add_locked(&key)).await? {
            debug!(key = %key, mode = ?self.add_mode, "added ledger entry");
        }
        Ok(())
    }

    async fn del_key(&self, key: Key<'_>) -> Result<(), LedgerError> {
        let key = self.storage_key(key)?;
        if self.with_lock(&key, || self.del_locked(&key)).await? {
            debug!(key = %key, "removed ledger entry");
        }
        Ok(())
    }

    async fn range(&self, visit: &mut Visit<'_>) -> Result<(), LedgerError> {
        // Base64 keys may contain '/', so the listing must be recursive.
        let keys = self.call(self.storage.list(&self.prefix, true)).await?;

        for key in keys {
            let bytes = match self.call(self.storage.load(&key)).await {
                Ok(bytes) => bytes,
                Err(e @ (LedgerError::Cancelled | LedgerError::Timeout(_))) => return Err(e),
                Err(e) => {
                    error!(key = %key, error = %e, "load ledger entry failed, skipping");
                    continue;
                }
            };
            let traffic = match Traffic::from_bytes(&key, &bytes) {
                Ok(traffic) => traffic,
                Err(e) => {
                    error!(key = %key, error = %e, "decode ledger entry failed, skipping");
                    continue;
                }
            };
            let name = key.strip_prefix(self.prefix.as_str()).unwrap_or(&key);
            visit(name, traffic.up, traffic.down);
        }
        Ok(())
    }

    async fn validate(&self, key: Key<'_>) -> bool {
        let Ok(key) = self.storage_key(key) else {
            return false;
        };
        match self.call(self.storage.exists(&key)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(key = %key, error = %e, "existence check failed");
                false
            }
        }
    }

    async fn consume(&self, key: Key<'_>, read: i64, written: i64) -> Result<(), LedgerError> {
        let key = self.storage_key(key)?;
        self.with_lock(&key, || self.consume_locked(&key, read, written))
            .await
    }
}

/// Held distributed lock.
///
/// Release with [`LockGuard::release`]. If the guard is dropped while still
/// held (the owning future was cancelled or panicked), the unlock is spawned
/// onto the current tokio runtime.
struct LockGuard {
    storage: Arc<dyn Storage>,
    key: String,
    held: bool,
}

impl LockGuard {
    async fn release(mut self) {
        // Cleared first: if this future is dropped mid-unlock, Drop must not
        // unlock a second time and release someone else's lock.
        self.held = false;
        if let Err(e) = self.storage.unlock(&self.key).await {
            warn!(key = %self.key, error = %e, "unlock failed");
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        let storage = self.storage.clone();
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(key = %key, "lock guard dropped while held, releasing in background");
                handle.spawn(async move {
                    if let Err(e) = storage.unlock(&key).await {
                        warn!(key = %key, error = %e, "background unlock failed");
                    }
                });
            }
            Err(_) => {
                error!(key = %key, "lock guard dropped outside a runtime, lock leaked");
            }
        }
    }
}
