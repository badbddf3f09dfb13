//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using a Tokio actor:
//! - One task owns the store and the authoritative chain
//! - Appends are serialized through a bounded mailbox, so two callers can
//!   never both extend the same tip
//! - Readers never talk to the actor; they clone the published snapshot
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │          Ledger (Clone, one per caller)              │
//! │  validates input, reads snapshot for get_chain()     │
//! └──────────────┬───────────────────────▲───────────────┘
//!                │ mpsc::channel         │ RwLock<Arc<Vec<Block>>>
//!                │ (bounded)             │ (swapped after persist)
//!                ▼                       │
//! ┌──────────────────────────────────────┴───────────────┐
//! │              LedgerActor (Single Task)                │
//! │   read tip → build block → check extension            │
//! │   → FileStore::persist() → publish new snapshot       │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::chain::build_block;
use crate::crypto::HashAlgorithm;
use crate::metrics::Metrics;
use crate::storage::FileStore;
use crate::types::{Block, Transaction};
use crate::{Error, Result};
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Immutable view of the whole chain, cheap to clone
pub type ChainSnapshot = Arc<Vec<Block>>;

/// Slot the actor publishes durable chains into
pub(crate) type SharedChain = Arc<RwLock<ChainSnapshot>>;

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Seal a transaction into the next block
    AppendTransaction {
        /// Already validated transaction
        transaction: Transaction,
        /// Sealed block, or why nothing was appended
        response: oneshot::Sender<Result<Block>>,
    },

    /// Finish queued appends, then stop
    Shutdown {
        /// Fired once the actor has stopped
        response: oneshot::Sender<()>,
    },
}

/// Actor that owns every chain mutation
#[derive(Debug)]
pub struct LedgerActor {
    /// Durability store, touched only from this task
    store: FileStore,

    /// Last durable chain
    chain: ChainSnapshot,

    /// Where readers pick up new snapshots
    published: SharedChain,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    algorithm: HashAlgorithm,
    metrics: Metrics,
}

impl LedgerActor {
    /// Create new actor over a chain that is already durable
    pub(crate) fn new(
        store: FileStore,
        published: SharedChain,
        mailbox: mpsc::Receiver<LedgerMessage>,
        metrics: Metrics,
    ) -> Self {
        let chain = published.read().clone();
        let algorithm = store.algorithm();
        Self {
            store,
            chain,
            published,
            mailbox,
            algorithm,
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let mut stopped = Vec::new();

        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::AppendTransaction {
                    transaction,
                    response,
                } => {
                    let result = self.append(transaction);
                    let _ = response.send(result);
                }
                LedgerMessage::Shutdown { response } => {
                    // Refuse new work but finish what is already queued
                    self.mailbox.close();
                    stopped.push(response);
                }
            }
        }

        tracing::info!(blocks = self.chain.len(), "Ledger writer stopped");
        for response in stopped {
            let _ = response.send(());
        }
    }

    /// The critical section: extend the tip, persist, then publish
    fn append(&mut self, transaction: Transaction) -> Result<Block> {
        let started = Instant::now();

        let result = self.extend_tip(transaction);
        match &result {
            Ok(block) => {
                self.metrics
                    .record_append(started.elapsed().as_secs_f64(), self.chain.len());
                tracing::info!(
                    index = block.index(),
                    hash = %block.hash(),
                    "Block appended"
                );
            }
            Err(e) => {
                self.metrics.record_append_failure();
                tracing::error!(error = %e, "Append failed; chain left at last durable state");
            }
        }
        result
    }

    fn extend_tip(&mut self, transaction: Transaction) -> Result<Block> {
        let tip = self
            .chain
            .last()
            .ok_or_else(|| Error::InvariantViolation("chain has no genesis block".into()))?;

        // A clock stepping backwards must not produce a timestamp regression
        let now = Utc::now().max(tip.created_at());
        let block = build_block(
            self.algorithm,
            tip.index() + 1,
            tip.hash(),
            vec![transaction],
            now,
        )?;
        check_extends(tip, &block)?;

        let mut next = Vec::with_capacity(self.chain.len() + 1);
        next.extend_from_slice(&self.chain);
        next.push(block.clone());

        // On failure `next` is dropped and nothing was published
        self.store.persist(&next)?;

        let next = Arc::new(next);
        self.chain = Arc::clone(&next);
        *self.published.write() = next;

        Ok(block)
    }
}

fn check_extends(tip: &Block, block: &Block) -> Result<()> {
    if block.previous_hash() != tip.hash() || block.index() != tip.index() + 1 {
        return Err(Error::InvariantViolation(format!(
            "block {} does not extend tip {} ({})",
            block.index(),
            tip.index(),
            tip.hash()
        )));
    }
    if block.created_at() < tip.created_at() {
        return Err(Error::InvariantViolation(format!(
            "block {} predates tip {}",
            block.index(),
            tip.index()
        )));
    }
    Ok(())
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    /// Append a validated transaction; resolves once it is durable
    pub async fn append_transaction(&self, transaction: Transaction) -> Result<Block> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::AppendTransaction {
                transaction,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor, waiting for queued appends to finish
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Shutdown { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }
}

/// Spawn the ledger actor
pub(crate) fn spawn_ledger_actor(
    store: FileStore,
    published: SharedChain,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = LedgerActor::new(store, published, rx, metrics);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
