//! Core types for the ledger
//!
//! All types are designed for:
//! - Immutability once constructed (no public setters)
//! - Stable, human-inspectable JSON (serde)
//! - Exact arithmetic (Decimal for amounts)

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Digest size in bytes, shared by every supported hash algorithm
pub const DIGEST_LEN: usize = 32;

/// Previous-hash value carried by the genesis block
pub const GENESIS_SENTINEL: Digest = Digest([0u8; DIGEST_LEN]);

/// Account identifier (citizen, authority, treasury, ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Fixed-size block digest, rendered as lowercase hex
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Wrap raw digest bytes
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_str(&s).map_err(|e| de::Error::custom(format!("invalid digest {s:?}: {e}")))
    }
}

/// A single value transfer recorded on the ledger
///
/// Deserialization runs the same checks as [`Transaction::new`], so a
/// malformed transaction can never be read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    sender: AccountId,
    receiver: AccountId,
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
    created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a validated transaction.
    ///
    /// Checks run in field order: sender, receiver, distinct parties, amount.
    pub fn new(
        sender: impl Into<AccountId>,
        receiver: impl Into<AccountId>,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let tx = Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            created_at,
        };
        tx.validate()?;
        Ok(tx)
    }

    /// Re-check the transaction invariants
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sender.is_blank() {
            return Err(ValidationError::EmptySender);
        }
        if self.receiver.is_blank() {
            return Err(ValidationError::EmptyReceiver);
        }
        if self.sender.as_str().trim() == self.receiver.as_str().trim() {
            return Err(ValidationError::SameParty(self.sender.to_string()));
        }
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(self.amount.to_string()));
        }
        Ok(())
    }

    /// Paying account
    pub fn sender(&self) -> &AccountId {
        &self.sender
    }

    /// Credited account
    pub fn receiver(&self) -> &AccountId {
        &self.receiver
    }

    /// Transferred amount (always positive)
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// When the transfer was recorded
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl<'de> Deserialize<'de> for Transaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Stored {
            sender: AccountId,
            receiver: AccountId,
            #[serde(with = "rust_decimal::serde::str")]
            amount: Decimal,
            created_at: DateTime<Utc>,
        }

        let stored = Stored::deserialize(deserializer)?;
        Transaction::new(stored.sender, stored.receiver, stored.amount, stored.created_at)
            .map_err(|e| de::Error::custom(format!("invalid transaction: {e}")))
    }
}

/// Sealed block of transactions linked to its predecessor
///
/// Blocks are produced by [`crate::chain::build_block`] and
/// [`crate::chain::genesis_block`]; the hash covers every other field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub(crate) index: u64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) transactions: Vec<Transaction>,
    pub(crate) previous_hash: Digest,
    pub(crate) hash: Digest,
}

impl Block {
    /// Position in the chain (genesis is 0)
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Block creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Transactions sealed in this block
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Hash of the preceding block, or [`GENESIS_SENTINEL`]
    pub fn previous_hash(&self) -> Digest {
        self.previous_hash
    }

    /// Stored hash of this block
    pub fn hash(&self) -> Digest {
        self.hash
    }

    /// Whether this block sits at index 0
    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}
