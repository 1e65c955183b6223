//! Ledger configuration, file loading, and backend construction.

use std::sync::Arc;
use std::time::Duration;
use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::memory::MemoryLedger;
use crate::persistent::PersistentLedger;
use crate::storage::Storage;
use crate::traits::Ledger;

/// Default namespace prefix for persistent entries.
pub const DEFAULT_PREFIX: &str = "trojan/";

/// What `add_key` does when the entry already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddMode {
    /// Overwrite with zeroed counters.
    Reset,
    /// Leave the existing entry and its counters untouched.
    KeepExisting,
}

/// Configuration for [`PersistentLedger`].
#[derive(Debug, Clone)]
pub struct PersistentLedgerConfig {
    /// Namespace prefix prepended to every canonical key.
    pub prefix: String,

    /// Behaviour of `add_key` on an existing entry.
    pub add_mode: AddMode,

    /// Upper bound on distributed lock acquisition (None = wait forever).
    pub lock_timeout: Option<Duration>,

    /// Upper bound on each storage call (None = no bound).
    pub op_timeout: Option<Duration>,
}

impl Default for PersistentLedgerConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            add_mode: AddMode::KeepExisting,
            lock_timeout: None,
            op_timeout: None,
        }
    }
}

impl PersistentLedgerConfig {
    /// Create a config with the default prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the namespace prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Builder: set the add mode.
    pub fn add_mode(mut self, mode: AddMode) -> Self {
        self.add_mode = mode;
        self
    }

    /// Builder: bound lock acquisition.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Builder: bound each storage call.
    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }
}

/// Ledger configuration as read from a file.
///
/// ```toml
/// type = "persistent"
/// prefix = "trojan/"
/// add_mode = "keep_existing"
/// lock_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LedgerConfig {
    /// Process-local ledger.
    Memory {
        #[serde(default = "default_memory_add_mode")]
        add_mode: AddMode,
        /// Secrets to provision at startup.
        #[serde(default)]
        secrets: Vec<String>,
    },
    /// Ledger over a storage collaborator.
    Persistent {
        #[serde(default = "default_prefix")]
        prefix: String,
        #[serde(default = "default_persistent_add_mode")]
        add_mode: AddMode,
        #[serde(default)]
        lock_timeout_ms: Option<u64>,
        #[serde(default)]
        op_timeout_ms: Option<u64>,
    },
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::Memory {
            add_mode: default_memory_add_mode(),
            secrets: Vec::new(),
        }
    }
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_memory_add_mode() -> AddMode {
    AddMode::Reset
}

fn default_persistent_add_mode() -> AddMode {
    AddMode::KeepExisting
}

/// Error loading a [`LedgerConfig`] from disk.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed `.json` or `.jsonc` content.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// Malformed `.toml` content.
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    /// The file extension is not one of `json`, `jsonc`, or `toml`.
    #[error("unsupported config format")]
    UnsupportedFormat,
}

/// Load a [`LedgerConfig`] from a `.json`, `.jsonc`, or `.toml` file.
pub fn load_config(path: impl AsRef<Path>) -> Result<LedgerConfig, ConfigError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)?;
    match path.extension().and_then(|s| s.to_str()).unwrap_or("") {
        "json" | "jsonc" => {
            let stripped = json_comments::StripComments::new(data.as_bytes());
            Ok(serde_json::from_reader(stripped)?)
        }
        "toml" => Ok(toml::from_str(&data)?),
        _ => Err(ConfigError::UnsupportedFormat),
    }
}

/// Build the configured ledger.
///
/// `storage` is required for [`LedgerConfig::Persistent`] and ignored for
/// [`LedgerConfig::Memory`].
pub async fn build_ledger(
    config: &LedgerConfig,
    storage: Option<Arc<dyn Storage>>,
) -> Result<Arc<dyn Ledger>, LedgerError> {
    match config {
        LedgerConfig::Memory { add_mode, secrets } => {
            let ledger = MemoryLedger::with_add_mode(*add_mode);
            for secret in secrets {
                ledger.add(secret).await?;
            }
            Ok(Arc::new(ledger))
        }
        LedgerConfig::Persistent {
            prefix,
            add_mode,
            lock_timeout_ms,
            op_timeout_ms,
        } => {
            let storage = storage.ok_or_else(|| {
                LedgerError::Config("persistent ledger requires a storage backend".into())
            })?;
            let config = PersistentLedgerConfig {
                prefix: prefix.clone(),
                add_mode: *add_mode,
                lock_timeout: lock_timeout_ms.map(Duration::from_millis),
                op_timeout: op_timeout_ms.map(Duration::from_millis),
            };
            Ok(Arc::new(PersistentLedger::new(storage, config)))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::key::Key;
    use crate::storage::MemoryStorage;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml_defaults() {
        let file = write_temp(".toml", "type = \"persistent\"\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(
            config,
            LedgerConfig::Persistent {
                prefix: "trojan/".into(),
                add_mode: AddMode::KeepExisting,
                lock_timeout_ms: None,
                op_timeout_ms: None,
            }
        );
    }

    #[test]
    fn test_load_jsonc() {
        let file = write_temp(
            ".jsonc",
            r#"{
                // provisioned at startup
                "type": "memory",
                "add_mode": "keep_existing",
                "secrets": ["a", "b"]
            }"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(
            config,
            LedgerConfig::Memory {
                add_mode: AddMode::KeepExisting,
                secrets: vec!["a".into(), "b".into()],
            }
        );
    }

    #[test]
    fn test_unsupported_format() {
        let file = write_temp(".ini", "type = memory");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::UnsupportedFormat)
        ));
    }

    #[tokio::test]
    async fn test_build_memory() {
        let config = LedgerConfig::Memory {
            add_mode: AddMode::Reset,
            secrets: vec!["alice".into()],
        };
        let ledger = build_ledger(&config, None).await.unwrap();
        assert!(ledger.validate(Key::Raw("alice")).await);
    }

    #[tokio::test]
    async fn test_build_persistent_requires_storage() {
        let config: LedgerConfig = toml::from_str("type = \"persistent\"").unwrap();
        assert!(matches!(
            build_ledger(&config, None).await,
            Err(LedgerError::Config(_))
        ));

        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let ledger = build_ledger(&config, Some(storage.clone())).await.unwrap();
        ledger.add("bob").await.unwrap();
        assert_eq!(storage.list("trojan/", true).await.unwrap().len(), 1);
    }
}
