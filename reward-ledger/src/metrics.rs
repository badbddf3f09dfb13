//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `ledger_blocks_appended_total` - Blocks appended and persisted
//! - `ledger_append_failures_total` - Appends rejected or rolled back
//! - `ledger_append_duration_seconds` - Histogram of append latencies
//! - `ledger_chain_length` - Blocks in the published chain, genesis included

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Append latency buckets in seconds; an append is dominated by two fsyncs
const APPEND_DURATION_BUCKETS: [f64; 9] =
    [0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0];

/// Metrics collector
///
/// Each ledger owns its registry, so several ledgers can live in one process.
#[derive(Clone)]
pub struct Metrics {
    /// Blocks appended
    pub blocks_appended: IntCounter,

    /// Failed appends (validation or persistence)
    pub append_failures: IntCounter,

    /// Append duration histogram
    pub append_duration: Histogram,

    /// Current chain length
    pub chain_length: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let blocks_appended = IntCounter::new(
            "ledger_blocks_appended_total",
            "Blocks appended and persisted",
        )?;
        registry.register(Box::new(blocks_appended.clone()))?;

        let append_failures = IntCounter::new(
            "ledger_append_failures_total",
            "Appends rejected or rolled back",
        )?;
        registry.register(Box::new(append_failures.clone()))?;

        let append_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_append_duration_seconds",
                "Histogram of append latencies",
            )
            .buckets(APPEND_DURATION_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(append_duration.clone()))?;

        let chain_length = IntGauge::new(
            "ledger_chain_length",
            "Blocks in the published chain",
        )?;
        registry.register(Box::new(chain_length.clone()))?;

        Ok(Self {
            blocks_appended,
            append_failures,
            append_duration,
            chain_length,
            registry,
        })
    }

    /// Record a successful append
    pub fn record_append(&self, duration_seconds: f64, chain_length: usize) {
        self.blocks_appended.inc();
        self.append_duration.observe(duration_seconds);
        self.set_chain_length(chain_length);
    }

    /// Record a failed append
    pub fn record_append_failure(&self) {
        self.append_failures.inc();
    }

    /// Update the chain length gauge
    pub fn set_chain_length(&self, chain_length: usize) {
        self.chain_length.set(chain_length as i64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("blocks_appended", &self.blocks_appended.get())
            .field("append_failures", &self.append_failures.get())
            .field("chain_length", &self.chain_length.get())
            .finish()
    }
}
