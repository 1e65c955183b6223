//! In-memory ledger backend.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::config::AddMode;
use crate::error::LedgerError;
use crate::key::{CanonicalKey, Key, canonical_key};
use crate::traffic::Traffic;
use crate::traits::{Ledger, Visit};

/// Process-local ledger: a hash map behind a single reader/writer lock.
///
/// `validate` and `range` take the read lock; `add_key`, `del_key` and
/// `consume` take the write lock, so a `range` scan blocks all writers until
/// it returns. Nothing is persisted.
///
/// Unlike [`PersistentLedger`](crate::PersistentLedger), `consume` on an
/// unknown key creates the entry instead of failing.
#[derive(Debug)]
pub struct MemoryLedger {
    entries: RwLock<HashMap<String, Traffic>>,
    add_mode: AddMode,
}

impl MemoryLedger {
    /// Create an empty ledger with [`AddMode::Reset`].
    #[inline]
    pub fn new() -> Self {
        Self::with_add_mode(AddMode::Reset)
    }

    /// Create an empty ledger with the given add mode.
    pub fn with_add_mode(add_mode: AddMode) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            add_mode,
        }
    }

    /// Create from plaintext secrets, all starting at zero.
    ///
    /// # Example
    /// ```
    /// use trojan_ledger::MemoryLedger;
    ///
    /// let ledger = MemoryLedger::from_secrets(["password1", "password2"]);
    /// assert_eq!(ledger.len(), 2);
    /// ```
    pub fn from_secrets<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = secrets
            .into_iter()
            .map(|s| (canonical_key(s.as_ref()).into_string(), Traffic::default()))
            .collect();
        Self {
            entries: RwLock::new(entries),
            add_mode: AddMode::Reset,
        }
    }

    /// The configured add mode.
    #[inline]
    pub fn add_mode(&self) -> AddMode {
        self.add_mode
    }

    /// Get the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the ledger has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Current counters for a key, if present.
    pub fn get(&self, key: Key<'_>) -> Option<Traffic> {
        let key = key.canonicalize().ok()?;
        self.entries.read().get(key.as_str()).copied()
    }

    fn insert(&self, key: CanonicalKey) {
        let mut entries = self.entries.write();
        match self.add_mode {
            AddMode::Reset => {
                entries.insert(key.into_string(), Traffic::default());
            }
            AddMode::KeepExisting => {
                entries.entry(key.into_string()).or_default();
            }
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn add_key(&self, key: Key<'_>) -> Result<(), LedgerError> {
        let key = key.canonicalize()?;
        debug!(key = %key, mode = ?self.add_mode, "adding ledger entry");
        self.insert(key);
        Ok(())
    }

    async fn del_key(&self, key: Key<'_>) -> Result<(), LedgerError> {
        let key = key.canonicalize()?;
        if self.entries.write().remove(key.as_str()).is_some() {
            debug!(key = %key, "removed ledger entry");
        }
        Ok(())
    }

    async fn range(&self, visit: &mut Visit<'_>) -> Result<(), LedgerError> {
        let entries = self.entries.read();
        for (key, traffic) in entries.iter() {
            visit(key, traffic.up, traffic.down);
        }
        Ok(())
    }

    async fn validate(&self, key: Key<'_>) -> bool {
        match key.canonicalize() {
            Ok(key) => self.entries.read().contains_key(key.as_str()),
            Err(_) => false,
        }
    }

    async fn consume(&self, key: Key<'_>, read: i64, written: i64) -> Result<(), LedgerError> {
        let key = key.canonicalize()?;
        let mut entries = self.entries.write();
        entries
            .entry(key.into_string())
            .or_default()
            .add(read, written);
        Ok(())
    }
}
