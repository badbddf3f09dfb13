//! Reward Ledger
//!
//! Private, single-authority ledger for reward transfers, kept as an
//! append-only chain of hash-linked blocks.
//!
//! # Architecture
//!
//! - **Hash Chain**: Every block commits to its predecessor's hash
//! - **Single Writer**: One actor task extends the tip, so the chain never forks
//! - **Atomic Persistence**: Write-new-then-rename; a crash never leaves half a chain
//! - **Snapshot Reads**: Readers clone an `Arc` and never wait on disk I/O
//!
//! # Invariants
//!
//! - Genesis: index 0, all-zero previous hash
//! - Linkage: `chain[i].previous_hash == chain[i-1].hash`, indices contiguous
//! - Tamper evidence: `block.hash` is recomputable from the block's content
//! - Append-only: blocks are never edited or deleted

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod canonical;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use actor::ChainSnapshot;
pub use chain::{build_block, genesis_block, verify_integrity, IntegrityFailure, IntegrityReport};
pub use config::Config;
pub use crypto::HashAlgorithm;
pub use error::{Error, PersistenceError, Result, ValidationError};
pub use ledger::Ledger;
pub use types::{AccountId, Block, Digest, Transaction, GENESIS_SENTINEL};
