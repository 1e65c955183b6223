//! Traffic record.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Cumulative traffic for one ledger entry.
///
/// Serialized as `{"up": <i64>, "down": <i64>}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traffic {
    /// Bytes received from the user.
    pub up: i64,
    /// Bytes sent to the user.
    pub down: i64,
}

impl Traffic {
    /// Create a record with the given counters.
    #[inline]
    pub const fn new(up: i64, down: i64) -> Self {
        Self { up, down }
    }

    /// Add read/written byte counts. Saturates at `i64::MAX`.
    #[inline]
    pub fn add(&mut self, read: i64, written: i64) {
        self.up = self.up.saturating_add(read);
        self.down = self.down.saturating_add(written);
    }

    /// Encode to the stored JSON form. `key` is used for error context only.
    pub fn to_bytes(&self, key: &str) -> Result<Vec<u8>, LedgerError> {
        serde_json::to_vec(self).map_err(|source| LedgerError::Encode {
            key: key.to_owned(),
            source,
        })
    }

    /// Decode the stored JSON form. `key` is used for error context only.
    pub fn from_bytes(key: &str, bytes: &[u8]) -> Result<Self, LedgerError> {
        serde_json::from_slice(bytes).map_err(|source| LedgerError::Corrupt {
            key: key.to_owned(),
            source,
        })
    }
}
