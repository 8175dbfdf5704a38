use std::sync::Arc;
use std::time::Duration;

use crate::cache::LookupCache;
use crate::metrics::Metrics;
use crate::store::OrderStore;

// ============================================================================
// Cache Warm-up
// ============================================================================
//
// Preloads the most recently created orders before the read boundary starts
// accepting requests. Best effort: a failing or slow store only shortens the
// warm-up, it never aborts startup. Entries already cached (by ingestion
// running concurrently) are newer than the read-back and are kept.
//
// ============================================================================

pub const DEFAULT_WARMUP_LIMIT: usize = 10;
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WarmupReport {
    /// Ids returned by the recency listing
    pub requested: usize,
    pub loaded: usize,
    /// Listed, but gone by the time they were looked up
    pub missing: usize,
    /// Lookups that errored or timed out
    pub failed: usize,
}

pub struct CacheWarmup {
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn LookupCache>,
    metrics: Arc<Metrics>,
    limit: usize,
    lookup_timeout: Duration,
}

impl CacheWarmup {
    pub fn new(store: Arc<dyn OrderStore>, cache: Arc<dyn LookupCache>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            cache,
            metrics,
            limit: DEFAULT_WARMUP_LIMIT,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub async fn run(&self) -> WarmupReport {
        let mut report = WarmupReport::default();

        if self.limit == 0 {
            tracing::info!("Cache warm-up disabled");
            return report;
        }

        let ids = match self.store.list_recent(self.limit).await {
            Ok(ids) => ids,
            Err(e) => {
                self.metrics.record_store_error("list_recent");
                tracing::warn!(error = %e, "Cache warm-up skipped, could not list recent orders");
                return report;
            }
        };
        report.requested = ids.len();

        for id in ids {
            match tokio::time::timeout(self.lookup_timeout, self.store.find(&id)).await {
                Ok(Ok(Some(order))) => match self.cache.populate(id, Arc::new(order)).await {
                    Ok(_) => report.loaded += 1,
                    Err(e) => {
                        report.failed += 1;
                        self.metrics.cache_update_failures.inc();
                        tracing::warn!(order_id = %id, error = %e, "Warm-up cache write failed");
                    }
                },
                Ok(Ok(None)) => report.missing += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    self.metrics.record_store_error("find");
                    tracing::warn!(order_id = %id, error = %e, "Warm-up lookup failed");
                }
                Err(_elapsed) => {
                    report.failed += 1;
                    tracing::warn!(
                        order_id = %id,
                        timeout_ms = self.lookup_timeout.as_millis(),
                        "Warm-up lookup timed out"
                    );
                }
            }
        }

        self.metrics.warmup_loaded.set(report.loaded as i64);
        self.metrics.set_cache_entries(self.cache.len().await);

        tracing::info!(
            requested = report.requested,
            loaded = report.loaded,
            missing = report.missing,
            failed = report.failed,
            "🔥 Cache warm-up complete"
        );

        report
    }
}
