//! Ledger trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LedgerError;
use crate::key::Key;
use crate::traffic::Traffic;

/// Visitor invoked by [`Ledger::range`] with `(canonical_key, up, down)`.
pub type Visit<'a> = dyn FnMut(&str, i64, i64) + Send + 'a;

/// Trait for ledger backends.
///
/// Implementations must be thread-safe (`Send + Sync`) as they may be
/// called concurrently from multiple connections. Operations on a single
/// key are serialized; there is no atomicity across keys.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Create an entry with zeroed counters.
    ///
    /// Behaviour on an existing entry depends on the backend's
    /// [`AddMode`](crate::AddMode).
    async fn add_key(&self, key: Key<'_>) -> Result<(), LedgerError>;

    /// Remove an entry. Removing a missing entry is not an error.
    async fn del_key(&self, key: Key<'_>) -> Result<(), LedgerError>;

    /// Visit every entry. Order is unspecified.
    async fn range(&self, visit: &mut Visit<'_>) -> Result<(), LedgerError>;

    /// Check whether an entry exists.
    ///
    /// Malformed keys and unreachable storage both report `false`.
    async fn validate(&self, key: Key<'_>) -> bool;

    /// Add `read` bytes to `up` and `written` bytes to `down`.
    async fn consume(&self, key: Key<'_>, read: i64, written: i64) -> Result<(), LedgerError>;

    /// Create an entry from a plaintext secret.
    #[inline]
    async fn add(&self, secret: &str) -> Result<(), LedgerError> {
        self.add_key(Key::Raw(secret)).await
    }

    /// Remove the entry for a plaintext secret.
    #[inline]
    async fn del(&self, secret: &str) -> Result<(), LedgerError> {
        self.del_key(Key::Raw(secret)).await
    }

    /// Collect every entry, e.g. for reporting or export.
    async fn snapshot(&self) -> Result<Vec<(String, Traffic)>, LedgerError> {
        let mut entries = Vec::new();
        self.range(&mut |key: &str, up: i64, down: i64| {
            entries.push((key.to_owned(), Traffic::new(up, down)));
        })
        .await?;
        Ok(entries)
    }
}

/// Blanket implementation for `Arc<L>` where `L: Ledger`.
///
/// This allows passing `Arc<dyn Ledger>` directly to functions expecting `impl Ledger`.
#[async_trait]
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    #[inline]
    async fn add_key(&self, key: Key<'_>) -> Result<(), LedgerError> {
        (**self).add_key(key).await
    }

    #[inline]
    async fn del_key(&self, key: Key<'_>) -> Result<(), LedgerError> {
        (**self).del_key(key).await
    }

    #[inline]
    async fn range(&self, visit: &mut Visit<'_>) -> Result<(), LedgerError> {
        (**self).range(visit).await
    }

    #[inline]
    async fn validate(&self, key: Key<'_>) -> bool {
        (**self).validate(key).await
    }

    #[inline]
    async fn consume(&self, key: Key<'_>, read: i64, written: i64) -> Result<(), LedgerError> {
        (**self).consume(key, read, written).await
    }
}

/// Blanket implementation for `Box<L>` where `L: Ledger`.
#[async_trait]
impl<L: Ledger + ?Sized> Ledger for Box<L> {
    #[inline]
    async fn add_key(&self, key: Key<'_>) -> Result<(), LedgerError> {
        (**self).add_key(key).await
    }

    #[inline]
    async fn del_key(&self, key: Key<'_>) -> Result<(), LedgerError> {
        (**self).del_key(key).await
    }

    #[inline]
    async fn range(&self, visit: &mut Visit<'_>) -> Result<(), LedgerError> {
        (**self).range(visit).await
    }

    #[inline]
    async fn validate(&self, key: Key<'_>) -> bool {
        (**self).validate(key).await
    }

    #[inline]
    async fn consume(&self, key: Key<'_>, read: i64, written: i64) -> Result<(), LedgerError> {
        (**self).consume(key, read, written).await
    }
}
