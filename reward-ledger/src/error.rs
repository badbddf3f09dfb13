//! Error types for the ledger

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed transaction input, rejected before any state is touched
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Durable read or write failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The writer produced a block that does not extend the tip
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// An account's net balance does not fit in a `Decimal`
    #[error("Balance overflow for account {0}")]
    BalanceOverflow(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Transaction or block input that violates the data model.
///
/// Each variant names the first constraint that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `sender` is empty or whitespace
    #[error("sender must not be empty")]
    EmptySender,

    /// `receiver` is empty or whitespace
    #[error("receiver must not be empty")]
    EmptyReceiver,

    /// `sender` and `receiver` are the same account
    #[error("sender and receiver must differ (both are {0})")]
    SameParty(String),

    /// `amount` is zero or negative
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(String),

    /// A non-genesis block was built without transactions
    #[error("transactions must not be empty")]
    EmptyTransactions,
}

/// Failures of the durability store.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Filesystem operation failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Store exists but cannot be turned back into a chain
    #[error("corrupt ledger store {}: {reason}", .path.display())]
    Corrupt {
        /// Store file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Chain could not be encoded
    #[error("failed to encode chain: {0}")]
    Encode(#[from] serde_json::Error),
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PersistenceError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl Error {
    /// True for input errors the caller can fix and resubmit
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// True for store failures; the append did not happen
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }
}
