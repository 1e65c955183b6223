//! Credential and traffic ledger for trojan.
//!
//! This crate stores per-user authentication keys and accumulates
//! per-key up/down byte counters behind one [`Ledger`] trait, with two
//! interchangeable backends:
//!
//! - [`MemoryLedger`]: process-local map behind a single reader/writer lock
//! - [`PersistentLedger`]: entries kept in a shared [`Storage`](storage::Storage),
//!   with per-key distributed locking for traffic accounting
//!
//! # Example
//!
//! ```
//! use trojan_ledger::{Key, Ledger, MemoryLedger, sha224_hex};
//!
//! # async fn example() -> Result<(), trojan_ledger::LedgerError> {
//! let ledger = MemoryLedger::new();
//! ledger.add("my_password").await?;
//!
//! // The derived key a client sends resolves to the same entry.
//! let hash = sha224_hex("my_password");
//! assert!(ledger.validate(Key::from(hash.as_str())).await);
//!
//! ledger.consume(Key::from(hash.as_str()), 512, 2048).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod hash;
mod key;
mod memory;
mod persistent;
mod traffic;
mod traits;

pub mod storage;

pub use config::{
    AddMode, ConfigError, DEFAULT_PREFIX, LedgerConfig, PersistentLedgerConfig, build_ledger,
    load_config,
};
pub use error::LedgerError;
pub use hash::{HEADER_LEN, derive_key, sha224_hex};
pub use key::{AUTH_LEN, CanonicalKey, Key, canonical_key};
pub use memory::MemoryLedger;
pub use persistent::PersistentLedger;
pub use traffic::Traffic;
pub use traits::{Ledger, Visit};
