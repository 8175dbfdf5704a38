use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{CacheError, LookupCache};
use crate::domain::order::{Order, OrderId};

/// Whole-map reader/writer locked cache.
///
/// Unbounded: `capacity` only pre-sizes the map. There is no eviction, so the
/// entry count is exported as a gauge and watched externally.
pub struct MemoryCache {
    entries: RwLock<HashMap<OrderId, Arc<Order>>>,
}

impl MemoryCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

#[async_trait]
impl LookupCache for MemoryCache {
    async fn get(&self, id: &OrderId) -> Result<Option<Arc<Order>>, CacheError> {
        let entries = self.entries.read().await;
        let entry = entries.get(id).cloned();

        tracing::trace!(order_id = %id, hit = entry.is_some(), "Cache lookup");
        Ok(entry)
    }

    async fn set(&self, id: OrderId, order: Arc<Order>) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.insert(id, order);

        tracing::trace!(order_id = %id, entries = entries.len(), "Cache entry replaced");
        Ok(())
    }

    async fn populate(&self, id: OrderId, order: Arc<Order>) -> Result<Arc<Order>, CacheError> {
        let mut entries = self.entries.write().await;
        let resident = entries.entry(id).or_insert(order).clone();

        tracing::trace!(order_id = %id, entries = entries.len(), "Cache entry populated");
        Ok(resident)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
