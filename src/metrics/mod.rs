// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Stream ingestion (outcomes, latency, retries, offset commits)
// - Dead letters by reason
// - Lookup cache (hits, misses, failed updates, size)
// - Store failures by operation
// - Startup warm-up
//
// All metrics are registered with a registry owned by this instance and can
// be scraped via /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Ingestion Metrics
    pub messages_consumed: IntCounterVec,
    pub ingest_duration: HistogramVec,
    pub persistence_retries: IntCounter,
    pub offset_commit_failures: IntCounter,
    pub stream_read_errors: IntCounter,

    // Dead Letter Metrics
    pub dead_letters: IntCounterVec,

    // Cache Metrics
    pub cache_lookups: IntCounterVec,
    pub cache_update_failures: IntCounter,
    pub cache_entries: IntGauge,

    // Store Metrics
    pub store_errors: IntCounterVec,

    // Warm-up Metrics
    pub warmup_loaded: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let messages_consumed = IntCounterVec::new(
            Opts::new("order_messages_consumed_total", "Stream messages handled, by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(messages_consumed.clone()))?;

        let ingest_duration = HistogramVec::new(
            HistogramOpts::new("order_ingest_duration_seconds", "Time from message receipt to offset commit")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(ingest_duration.clone()))?;

        let persistence_retries = IntCounter::new(
            "order_persistence_retries_total",
            "Save attempts repeated after a transient store failure",
        )?;
        registry.register(Box::new(persistence_retries.clone()))?;

        let offset_commit_failures = IntCounter::new(
            "order_offset_commit_failures_total",
            "Offset commits that failed (message may be redelivered)",
        )?;
        registry.register(Box::new(offset_commit_failures.clone()))?;

        let stream_read_errors = IntCounter::new(
            "order_stream_read_errors_total",
            "Errors returned while reading from the stream",
        )?;
        registry.register(Box::new(stream_read_errors.clone()))?;

        let dead_letters = IntCounterVec::new(
            Opts::new("order_dead_letters_total", "Poison messages skipped, by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(dead_letters.clone()))?;

        let cache_lookups = IntCounterVec::new(
            Opts::new("order_cache_lookups_total", "Lookup cache reads, by result"),
            &["result"],
        )?;
        registry.register(Box::new(cache_lookups.clone()))?;

        let cache_update_failures = IntCounter::new(
            "order_cache_update_failures_total",
            "Failed cache writes (non-fatal)",
        )?;
        registry.register(Box::new(cache_update_failures.clone()))?;

        let cache_entries = IntGauge::new("order_cache_entries", "Entries held by the lookup cache")?;
        registry.register(Box::new(cache_entries.clone()))?;

        let store_errors = IntCounterVec::new(
            Opts::new("order_store_errors_total", "Order store failures, by operation"),
            &["operation"],
        )?;
        registry.register(Box::new(store_errors.clone()))?;

        let warmup_loaded = IntGauge::new("order_warmup_loaded", "Orders preloaded into the cache at startup")?;
        registry.register(Box::new(warmup_loaded.clone()))?;

        Ok(Self {
            registry,
            messages_consumed,
            ingest_duration,
            persistence_retries,
            offset_commit_failures,
            stream_read_errors,
            dead_letters,
            cache_lookups,
            cache_update_failures,
            cache_entries,
            store_errors,
            warmup_loaded,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record the outcome of one stream message
    pub fn record_message(&self, outcome: &str, duration_secs: f64) {
        self.messages_consumed.with_label_values(&[outcome]).inc();
        self.ingest_duration.with_label_values(&[outcome]).observe(duration_secs);
    }

    /// Helper to record a skipped poison message
    pub fn record_dead_letter(&self, reason: &str) {
        self.dead_letters.with_label_values(&[reason]).inc();
    }

    /// Helper to record a cache read
    pub fn record_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    /// Helper to record a store failure
    pub fn record_store_error(&self, operation: &str) {
        self.store_errors.with_label_values(&[operation]).inc();
    }

    pub fn set_cache_entries(&self, entries: usize) {
        self.cache_entries.set(entries as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_message("persisted", 0.01);
        assert!(metrics.registry().gather().len() > 0);
    }

    #[test]
    fn test_record_message_outcomes() {
        let metrics = Metrics::new().unwrap();
        metrics.record_message("persisted", 0.05);
        metrics.record_message("persisted", 0.02);
        metrics.record_message("decode_error", 0.001);

        assert_eq!(metrics.messages_consumed.with_label_values(&["persisted"]).get(), 2);
        assert_eq!(metrics.messages_consumed.with_label_values(&["decode_error"]).get(), 1);
    }

    #[test]
    fn test_record_cache_lookups() {
        let metrics = Metrics::new().unwrap();
        metrics.record_cache_lookup(true);
        metrics.record_cache_lookup(false);
        metrics.record_cache_lookup(false);

        assert_eq!(metrics.cache_lookups.with_label_values(&["hit"]).get(), 1);
        assert_eq!(metrics.cache_lookups.with_label_values(&["miss"]).get(), 2);
    }

    #[test]
    fn test_independent_registries() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.record_dead_letter("validation_error");

        assert_eq!(first.dead_letters.with_label_values(&["validation_error"]).get(), 1);
        assert_eq!(second.dead_letters.with_label_values(&["validation_error"]).get(), 0);
    }

    #[test]
    fn test_cache_entries_gauge() {
        let metrics = Metrics::new().unwrap();
        metrics.set_cache_entries(42);
        assert_eq!(metrics.cache_entries.get(), 42);
    }
}
