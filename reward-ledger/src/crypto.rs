//! Hashing for the ledger
//!
//! This module provides:
//! - The configurable block digest algorithm (SHA-256 or BLAKE3)
//! - Block sealing over the canonical serialization
//!
//! The algorithm is fixed for the life of a ledger; it is recorded in the
//! store and a mismatch refuses to load.

use crate::canonical::CanonicalSerializer;
use crate::types::{Block, Digest, Transaction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

/// Digest algorithm used to seal blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256 (FIPS 180-4)
    #[default]
    Sha256,
    /// BLAKE3, 256-bit output
    Blake3,
}

impl HashAlgorithm {
    /// Stable lowercase name, as written to the store
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Hash arbitrary bytes
    pub fn hash_bytes(&self, data: &[u8]) -> Digest {
        match self {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(data);
                Digest::from_bytes(hasher.finalize().into())
            }
            HashAlgorithm::Blake3 => Digest::from_bytes(*blake3::hash(data).as_bytes()),
        }
    }

    /// Hash the content of a block (everything except its own hash)
    pub fn hash_content(
        &self,
        index: u64,
        created_at: DateTime<Utc>,
        transactions: &[Transaction],
        previous_hash: &Digest,
    ) -> Digest {
        let preimage =
            CanonicalSerializer::block_content(index, created_at, transactions, previous_hash);
        self.hash_bytes(&preimage)
    }

    /// Recompute a block's hash from its content
    pub fn hash_block(&self, block: &Block) -> Digest {
        self.hash_content(
            block.index(),
            block.created_at(),
            block.transactions(),
            &block.previous_hash(),
        )
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "blake3" => Ok(HashAlgorithm::Blake3),
            other => Err(crate::Error::Config(format!(
                "unknown hash algorithm: {other}"
            ))),
        }
    }
}
