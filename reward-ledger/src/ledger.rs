//! Main ledger orchestration layer
//!
//! This module ties together storage, hashing, and the writer actor
//! into the public API used by the rest of the application.
//!
//! # Example
//!
//! ```no_run
//! use reward_ledger::{Config, Ledger};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> reward_ledger::Result<()> {
//!     let ledger = Ledger::initialize(Config::default()).await?;
//!
//!     let block = ledger
//!         .append_transaction("treasury", "citizen-42", Decimal::new(5, 0))
//!         .await?;
//!     assert_eq!(block.previous_hash(), ledger.get_chain()[0].hash());
//!     assert!(ledger.verify_integrity().is_valid());
//!
//!     ledger.shutdown().await
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, ChainSnapshot, LedgerHandle, SharedChain},
    chain::{self, genesis_block, IntegrityReport},
    metrics::Metrics,
    storage::FileStore,
    types::{AccountId, Block, Transaction},
    Config, Error, Result,
};
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Main ledger interface
///
/// Cheap to clone; every clone talks to the same single writer.
#[derive(Clone, Debug)]
pub struct Ledger {
    /// Actor handle for appends
    handle: LedgerHandle,

    /// Published durable chain (for reads)
    chain: SharedChain,

    metrics: Metrics,

    /// Configuration
    config: Arc<Config>,
}

impl Ledger {
    /// Load the persisted chain, or create and persist a genesis block if
    /// there is none.
    ///
    /// A store that exists but cannot be read is an error; a fresh genesis
    /// is never written over it.
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;
        let store = FileStore::open(&config)?;
        let algorithm = config.hash_algorithm;

        let blocks = match store.load()? {
            Some(blocks) => {
                let report = chain::verify_integrity(algorithm, &blocks);
                if report.is_valid() {
                    tracing::info!(
                        path = %store.path().display(),
                        blocks = blocks.len(),
                        "Loaded ledger"
                    );
                } else {
                    tracing::warn!(
                        path = %store.path().display(),
                        blocks = blocks.len(),
                        %report,
                        "Loaded ledger fails integrity verification"
                    );
                }
                blocks
            }
            None => {
                let genesis = genesis_block(algorithm, Utc::now());
                store.persist(std::slice::from_ref(&genesis))?;
                tracing::info!(
                    path = %store.path().display(),
                    hash = %genesis.hash(),
                    "Created fresh ledger with genesis block"
                );
                vec![genesis]
            }
        };

        let metrics = Metrics::new()?;
        metrics.set_chain_length(blocks.len());

        let chain: SharedChain = Arc::new(RwLock::new(Arc::new(blocks)));
        let handle = spawn_ledger_actor(
            store,
            Arc::clone(&chain),
            metrics.clone(),
            config.mailbox_capacity,
        );

        Ok(Self {
            handle,
            chain,
            metrics,
            config: Arc::new(config),
        })
    }

    /// Record a transfer as the next block.
    ///
    /// Input is validated before the writer is involved. The returned block
    /// is already durable and visible to `get_chain`.
    pub async fn append_transaction(
        &self,
        sender: impl Into<AccountId>,
        receiver: impl Into<AccountId>,
        amount: Decimal,
    ) -> Result<Block> {
        let transaction = match Transaction::new(sender, receiver, amount, Utc::now()) {
            Ok(tx) => tx,
            Err(e) => {
                self.metrics.record_append_failure();
                tracing::debug!(error = %e, "Rejected transaction");
                return Err(e.into());
            }
        };

        self.handle.append_transaction(transaction).await
    }

    /// Snapshot of the full durable chain
    pub fn get_chain(&self) -> ChainSnapshot {
        self.chain.read().clone()
    }

    /// Re-hash and re-link the current chain
    pub fn verify_integrity(&self) -> IntegrityReport {
        chain::verify_integrity(self.config.hash_algorithm, &self.get_chain())
    }

    /// The tip
    pub fn latest_block(&self) -> Option<Block> {
        self.get_chain().last().cloned()
    }

    /// Block at `index`, if the chain is that long
    pub fn get_block(&self, index: u64) -> Option<Block> {
        let index = usize::try_from(index).ok()?;
        self.get_chain().get(index).cloned()
    }

    /// Number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    /// Always false; genesis is present from initialization on
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Net reward balance per account
    pub fn balances(&self) -> Result<BTreeMap<AccountId, Decimal>> {
        chain::balances(&self.get_chain())
    }

    /// Net reward balance of one account (zero if it never transacted)
    pub fn balance_of(&self, account: &AccountId) -> Result<Decimal> {
        let overflow = || Error::BalanceOverflow(account.to_string());
        self.get_chain()
            .iter()
            .flat_map(|b| b.transactions())
            .try_fold(Decimal::ZERO, |acc, tx| {
                if tx.receiver() == account {
                    acc.checked_add(tx.amount()).ok_or_else(overflow)
                } else if tx.sender() == account {
                    acc.checked_sub(tx.amount()).ok_or_else(overflow)
                } else {
                    Ok(acc)
                }
            })
    }

    /// Ledger metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration the ledger was initialized with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop the writer after queued appends finish.
    ///
    /// Reads keep working on every clone; appends fail afterwards.
    pub async fn shutdown(&self) -> Result<()> {
        self.handle.shutdown().await
    }
}
