//! Canonical serialization for block hashing
//!
//! Ensures a deterministic byte representation of a block's content.
//! Uses fixed field order, length-prefixed strings, decimals at their recorded scale,
//! and never includes the block's own hash.

use crate::types::{Digest, Transaction};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Leading tag so block preimages never collide with other hashed data
const BLOCK_DOMAIN_TAG: u8 = 0xB1;

/// Bumped if the layout below ever changes
const CANONICAL_VERSION: u8 = 1;

/// Canonical serializer
#[derive(Debug, Default)]
pub struct CanonicalSerializer {
    buffer: Vec<u8>,
}

impl CanonicalSerializer {
    /// Create new serializer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Serialize the hashed content of a block:
    /// `tag || version || index || created_at || transactions || previous_hash`
    pub fn block_content(
        index: u64,
        created_at: DateTime<Utc>,
        transactions: &[Transaction],
        previous_hash: &Digest,
    ) -> Vec<u8> {
        let mut ser = Self::new();
        ser.write_bytes(&[BLOCK_DOMAIN_TAG, CANONICAL_VERSION]);
        ser.write_u64(index);
        ser.write_timestamp(&created_at);
        ser.write_u32(transactions.len() as u32);
        for tx in transactions {
            ser.write_transaction(tx);
        }
        ser.write_bytes(previous_hash.as_bytes());
        ser.finalize()
    }

    fn write_transaction(&mut self, tx: &Transaction) {
        self.write_string(tx.sender().as_str());
        self.write_string(tx.receiver().as_str());
        self.write_decimal(&tx.amount());
        self.write_timestamp(&tx.created_at());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Write string (length-prefixed)
    fn write_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        self.write_u32(bytes.len() as u32);
        self.write_bytes(bytes);
    }

    /// Write u32 (big-endian)
    fn write_u32(&mut self, n: u32) {
        self.write_bytes(&n.to_be_bytes());
    }

    /// Write u64 (big-endian)
    fn write_u64(&mut self, n: u64) {
        self.write_bytes(&n.to_be_bytes());
    }

    /// Write timestamp as seconds (i64) then nanoseconds (u32)
    fn write_timestamp(&mut self, ts: &DateTime<Utc>) {
        self.write_bytes(&ts.timestamp().to_be_bytes());
        self.write_u32(ts.timestamp_subsec_nanos());
    }

    /// Write decimal exactly as persisted, scale included ("10.50" != "10.5")
    fn write_decimal(&mut self, d: &Decimal) {
        self.write_string(&d.to_string());
    }

    /// Finalize and return bytes
    pub fn finalize(self) -> Vec<u8> {
        self.buffer
    }
}
