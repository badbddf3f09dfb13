//! Configuration for the ledger

use crate::crypto::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the ledger file
    pub data_dir: PathBuf,

    /// Ledger file name inside `data_dir`
    pub ledger_file: String,

    /// Digest algorithm; fixed for the life of a ledger
    pub hash_algorithm: HashAlgorithm,

    /// Bounded writer mailbox size (pending appends)
    pub mailbox_capacity: usize,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            ledger_file: "ledger.json".to_string(),
            hash_algorithm: HashAlgorithm::Sha256,
            mailbox_capacity: 1000,
            service_name: "reward-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Config {
    /// Config rooted at `data_dir`, everything else default
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Full path of the ledger file
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(&self.ledger_file)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(file) = std::env::var("LEDGER_FILE") {
            config.ledger_file = file;
        }

        if let Ok(algorithm) = std::env::var("LEDGER_HASH_ALGORITHM") {
            config.hash_algorithm = algorithm.parse()?;
        }

        if let Ok(capacity) = std::env::var("LEDGER_MAILBOX_CAPACITY") {
            config.mailbox_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid LEDGER_MAILBOX_CAPACITY: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the ledger cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.ledger_file.trim().is_empty() {
            return Err(crate::Error::Config("ledger_file must not be empty".into()));
        }
        if self.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "mailbox_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
