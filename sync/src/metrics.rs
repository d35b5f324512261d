//! Prometheus metrics for cloud-side batch processing.
//!
//! [`SyncMetrics`] owns a dedicated [`Registry`] that the RPC `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

pub struct SyncMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Batches that completed processing (not counting replays).
    pub batches_processed: IntCounter,
    /// Batches refused outright, by cause.
    pub batches_rejected: IntCounterVec,
    pub votes_accepted: IntCounter,
    /// Individual votes refused, by rejection reason.
    pub votes_rejected: IntCounterVec,
    /// Retried batches answered from the result cache.
    pub replays_served: IntCounter,
    pub storage_retries: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub cached_results: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    pub batch_process_time_ms: Histogram,
}

impl SyncMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let batches_processed = register_int_counter_with_registry!(
            Opts::new("edgevote_batches_processed_total", "Batches merged into the cloud ledger"),
            registry
        )
        .expect("failed to register batches_processed counter");

        let batches_rejected = register_int_counter_vec_with_registry!(
            Opts::new("edgevote_batches_rejected_total", "Batches refused before merging"),
            &["cause"],
            registry
        )
        .expect("failed to register batches_rejected counter");

        let votes_accepted = register_int_counter_with_registry!(
            Opts::new("edgevote_votes_accepted_total", "Votes accepted into the cloud ledger"),
            registry
        )
        .expect("failed to register votes_accepted counter");

        let votes_rejected = register_int_counter_vec_with_registry!(
            Opts::new("edgevote_votes_rejected_total", "Votes refused inside accepted batches"),
            &["reason"],
            registry
        )
        .expect("failed to register votes_rejected counter");

        let replays_served = register_int_counter_with_registry!(
            Opts::new("edgevote_replays_served_total", "Batch retries answered from cache"),
            registry
        )
        .expect("failed to register replays_served counter");

        let storage_retries = register_int_counter_with_registry!(
            Opts::new("edgevote_storage_retries_total", "Durable-storage calls retried"),
            registry
        )
        .expect("failed to register storage_retries counter");

        let cached_results = register_int_gauge_with_registry!(
            Opts::new("edgevote_cached_results", "Sync results held for idempotent replay"),
            registry
        )
        .expect("failed to register cached_results gauge");

        let batch_process_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "edgevote_batch_process_time_ms",
                "Batch processing time in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(0.5, 2.0, 14).unwrap()),
            registry
        )
        .expect("failed to register batch_process_time_ms histogram");

        Self {
            registry,
            batches_processed,
            batches_rejected,
            votes_accepted,
            votes_rejected,
            replays_served,
            storage_retries,
            cached_results,
            batch_process_time_ms,
        }
    }

    /// Text exposition of every metric in the registry.
    pub fn encode(&self) -> String {
        let mut buf = Vec::new();
        let families = self.registry.gather();
        if TextEncoder::new().encode(&families, &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyncMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncMetrics").finish_non_exhaustive()
    }
}
