use std::sync::Arc;

use crate::cache::LookupCache;
use crate::domain::order::{InvalidOrderId, Order, OrderId};
use crate::metrics::Metrics;
use crate::store::{OrderStore, StoreError};

// ============================================================================
// Query Service - Cache-Aside Read Path
// ============================================================================
//
// 1. Validate the id (malformed ids never reach the cache or the store)
// 2. Cache hit: return without touching the store
// 3. Cache miss: load from the store, populate the cache, return
//
// Misses are not cached. A store read-back only fills an empty entry: if
// ingestion cached a newer version while the read was in flight, that version
// stays. Concurrent misses for one id may both load from the store.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    InvalidId(#[from] InvalidOrderId),

    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("order lookup failed: {0}")]
    Store(#[from] StoreError),
}

pub struct QueryService {
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn LookupCache>,
    metrics: Arc<Metrics>,
}

impl QueryService {
    pub fn new(store: Arc<dyn OrderStore>, cache: Arc<dyn LookupCache>, metrics: Arc<Metrics>) -> Self {
        Self { store, cache, metrics }
    }

    pub async fn get(&self, raw_id: &str) -> Result<Arc<Order>, QueryError> {
        let id = OrderId::parse(raw_id)?;

        match self.cache.get(&id).await {
            Ok(Some(order)) => {
                self.metrics.record_cache_lookup(true);
                tracing::debug!(order_id = %id, "Served from cache");
                return Ok(order);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(order_id = %id, error = %e, "Cache read failed, falling back to store");
            }
        }
        self.metrics.record_cache_lookup(false);

        let loaded = match self.store.find(&id).await {
            Ok(Some(order)) => Arc::new(order),
            Ok(None) => {
                tracing::debug!(order_id = %id, "Order not found");
                return Err(QueryError::NotFound(id));
            }
            Err(e) => {
                self.metrics.record_store_error("find");
                tracing::error!(order_id = %id, error = %e, "Store lookup failed");
                return Err(e.into());
            }
        };

        let order = match self.cache.populate(id, loaded.clone()).await {
            Ok(resident) => {
                self.metrics.set_cache_entries(self.cache.len().await);
                resident
            }
            Err(e) => {
                self.metrics.cache_update_failures.inc();
                tracing::warn!(order_id = %id, error = %e, "Failed to populate cache after store hit");
                loaded
            }
        };

        tracing::debug!(order_id = %id, "Served from store, cache populated");
        Ok(order)
    }
}
