//! Prometheus metrics for the confirmation engine.
//!
//! [`EngineMetrics`] owns a dedicated [`Registry`]; [`EngineMetrics::encode`]
//! renders it in the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

/// Central collection of all engine-level Prometheus metrics.
pub struct EngineMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Events accepted onto a worker queue.
    pub events_received: IntCounter,
    /// Events dropped: unknown hash, or submitted while shutting down.
    pub events_dropped: IntCounter,
    /// Duplicate DSP results and conflicting buffered indices.
    pub protocol_violations: IntCounter,
    /// Buffered DSP results replayed once their predecessor was indexed.
    pub replays: IntCounter,
    /// Blocked transactions re-evaluated after a rollback freed balance.
    pub cascades: IntCounter,
    /// Transactions that reached final confirmation (mirrors the engine counter).
    pub confirmed: IntCounter,
    /// Transactions whose DSP result was a rejection.
    pub dsp_rejected: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// DSP results waiting for their predecessor index.
    pub sequence_buffer_depth: IntGauge,
    /// Distinct transactions parked in the dependency index.
    pub blocked_transactions: IntGauge,
    /// Highest durable index, -1 when the chain is empty.
    pub last_index: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent handling one event including its follow-ups, in milliseconds.
    pub event_process_time_ms: Histogram,
}

impl EngineMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        // Counters
        let events_received = register_int_counter_with_registry!(
            Opts::new(
                "concord_events_received_total",
                "Consensus events accepted onto a worker queue"
            ),
            registry
        )
        .expect("failed to register events_received counter");

        let events_dropped = register_int_counter_with_registry!(
            Opts::new(
                "concord_events_dropped_total",
                "Consensus events dropped without processing"
            ),
            registry
        )
        .expect("failed to register events_dropped counter");

        let protocol_violations = register_int_counter_with_registry!(
            Opts::new(
                "concord_protocol_violations_total",
                "Duplicate or conflicting DSP results"
            ),
            registry
        )
        .expect("failed to register protocol_violations counter");

        let replays = register_int_counter_with_registry!(
            Opts::new(
                "concord_index_replays_total",
                "Buffered DSP results replayed in index order"
            ),
            registry
        )
        .expect("failed to register replays counter");

        let cascades = register_int_counter_with_registry!(
            Opts::new(
                "concord_cascades_total",
                "Blocked transactions re-evaluated after a rollback"
            ),
            registry
        )
        .expect("failed to register cascades counter");

        let confirmed = register_int_counter_with_registry!(
            Opts::new(
                "concord_transactions_confirmed_total",
                "Transactions confirmed by both trust-chain and DSP consensus"
            ),
            registry
        )
        .expect("failed to register confirmed counter");

        let dsp_rejected = register_int_counter_with_registry!(
            Opts::new(
                "concord_dsp_rejected_total",
                "Transactions rejected by DSP consensus"
            ),
            registry
        )
        .expect("failed to register dsp_rejected counter");

        // Gauges
        let sequence_buffer_depth = register_int_gauge_with_registry!(
            Opts::new(
                "concord_sequence_buffer_depth",
                "DSP results waiting for their predecessor index"
            ),
            registry
        )
        .expect("failed to register sequence_buffer_depth gauge");

        let blocked_transactions = register_int_gauge_with_registry!(
            Opts::new(
                "concord_blocked_transactions",
                "Transactions blocked on insufficient balance"
            ),
            registry
        )
        .expect("failed to register blocked_transactions gauge");

        let last_index = register_int_gauge_with_registry!(
            Opts::new("concord_last_index", "Highest durable index"),
            registry
        )
        .expect("failed to register last_index gauge");
        last_index.set(-1);

        // Histograms – exponential buckets covering 0.05 ms → ~800 ms.
        let event_process_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "concord_event_process_time_ms",
                "Event processing time in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(0.05, 2.0, 15).unwrap()),
            registry
        )
        .expect("failed to register event_process_time_ms histogram");

        Self {
            registry,
            events_received,
            events_dropped,
            protocol_violations,
            replays,
            cascades,
            confirmed,
            dsp_rejected,
            sequence_buffer_depth,
            blocked_transactions,
            last_index,
            event_process_time_ms,
        }
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_registered_metrics() {
        let metrics = EngineMetrics::new();
        metrics.events_received.inc();
        metrics.sequence_buffer_depth.set(3);
        let text = metrics.encode();
        assert!(text.contains("concord_events_received_total 1"));
        assert!(text.contains("concord_sequence_buffer_depth 3"));
        assert!(text.contains("concord_last_index -1"));
    }
}
