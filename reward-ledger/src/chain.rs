//! Chain assembly and verification
//!
//! Pure functions over blocks: sealing new blocks and walking an existing
//! chain to check its linkage, hashes, and timestamps. Nothing here touches
//! storage or shared state.

use crate::crypto::HashAlgorithm;
use crate::error::{Error, ValidationError};
use crate::types::{AccountId, Block, Digest, Transaction, GENESIS_SENTINEL};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Seal a new block.
///
/// The caller guarantees `previous_hash` is the current tip's hash; this
/// function only validates the transactions and computes the hash.
pub fn build_block(
    algorithm: HashAlgorithm,
    index: u64,
    previous_hash: Digest,
    transactions: Vec<Transaction>,
    now: DateTime<Utc>,
) -> Result<Block, ValidationError> {
    if transactions.is_empty() {
        return Err(ValidationError::EmptyTransactions);
    }
    for tx in &transactions {
        tx.validate()?;
    }
    Ok(seal(algorithm, index, previous_hash, transactions, now))
}

/// The first block of a fresh chain: index 0, sentinel linkage, no
/// transactions.
pub fn genesis_block(algorithm: HashAlgorithm, now: DateTime<Utc>) -> Block {
    seal(algorithm, 0, GENESIS_SENTINEL, Vec::new(), now)
}

fn seal(
    algorithm: HashAlgorithm,
    index: u64,
    previous_hash: Digest,
    transactions: Vec<Transaction>,
    created_at: DateTime<Utc>,
) -> Block {
    let hash = algorithm.hash_content(index, created_at, &transactions, &previous_hash);
    Block {
        index,
        created_at,
        transactions,
        previous_hash,
        hash,
    }
}

/// Why a chain failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityFailure {
    /// Stored hash differs from the recomputed one
    HashMismatch,
    /// `previous_hash` does not match the preceding block's hash
    LinkageMismatch,
    /// First block is not index 0 with the sentinel previous hash
    BadGenesis,
    /// Index is not exactly one past its predecessor
    IndexGap,
    /// Block is older than its predecessor
    TimestampRegression,
}

impl IntegrityFailure {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityFailure::HashMismatch => "hash_mismatch",
            IntegrityFailure::LinkageMismatch => "linkage_mismatch",
            IntegrityFailure::BadGenesis => "bad_genesis",
            IntegrityFailure::IndexGap => "index_gap",
            IntegrityFailure::TimestampRegression => "timestamp_regression",
        }
    }
}

impl fmt::Display for IntegrityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`verify_integrity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntegrityReport {
    /// Every block checks out
    Valid,
    /// First violation found, by position in the chain
    Invalid {
        /// Position of the offending block
        at_index: u64,
        /// What was wrong with it
        reason: IntegrityFailure,
    },
}

impl IntegrityReport {
    /// True for [`IntegrityReport::Valid`]
    pub fn is_valid(&self) -> bool {
        matches!(self, IntegrityReport::Valid)
    }
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityReport::Valid => f.write_str("valid"),
            IntegrityReport::Invalid { at_index, reason } => {
                write!(f, "invalid at index {at_index}: {reason}")
            }
        }
    }
}

/// Walk the chain from genesis, stopping at the first violation.
///
/// Per block the checks run as: genesis shape / index / linkage, then hash,
/// then timestamp order. An empty slice has no genesis and is reported as
/// `bad_genesis` at index 0.
pub fn verify_integrity(algorithm: HashAlgorithm, chain: &[Block]) -> IntegrityReport {
    let invalid = |at: usize, reason| IntegrityReport::Invalid {
        at_index: at as u64,
        reason,
    };

    let mut prev: Option<&Block> = None;
    if chain.is_empty() {
        return invalid(0, IntegrityFailure::BadGenesis);
    }

    for (position, block) in chain.iter().enumerate() {
        match prev {
            None => {
                if block.index != 0 || block.previous_hash != GENESIS_SENTINEL {
                    return invalid(position, IntegrityFailure::BadGenesis);
                }
            }
            Some(p) => {
                if p.index.checked_add(1) != Some(block.index) {
                    return invalid(position, IntegrityFailure::IndexGap);
                }
                // `p` already passed its hash check, so its stored hash is
                // the recomputed one.
                if block.previous_hash != p.hash {
                    return invalid(position, IntegrityFailure::LinkageMismatch);
                }
            }
        }

        if algorithm.hash_block(block) != block.hash {
            return invalid(position, IntegrityFailure::HashMismatch);
        }

        if let Some(p) = prev {
            if block.created_at < p.created_at {
                return invalid(position, IntegrityFailure::TimestampRegression);
            }
        }

        prev = Some(block);
    }

    IntegrityReport::Valid
}

/// Net balance per account: everything received minus everything sent
///
/// Fails with [`Error::BalanceOverflow`] naming the first account whose
/// running total leaves the `Decimal` range.
pub fn balances(chain: &[Block]) -> crate::Result<BTreeMap<AccountId, Decimal>> {
    let mut out: BTreeMap<AccountId, Decimal> = BTreeMap::new();
    for tx in chain.iter().flat_map(|b| b.transactions()) {
        let sent = out.entry(tx.sender().clone()).or_default();
        *sent = sent
            .checked_sub(tx.amount())
            .ok_or_else(|| Error::BalanceOverflow(tx.sender().to_string()))?;

        let received = out.entry(tx.receiver().clone()).or_default();
        *received = received
            .checked_add(tx.amount())
            .ok_or_else(|| Error::BalanceOverflow(tx.receiver().to_string()))?;
    }
    Ok(out)
}
