// ============================================================================
// Lookup Cache - In-Process Order Snapshots
// ============================================================================
//
// Maps OrderId to an immutable, fully assembled Order. Entries are replaced
// whole, never patched. The cache is an optimization only: every caller must
// stay correct when it is empty or when it fails.
//
// ============================================================================

mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::order::{Order, OrderId};

pub use memory::MemoryCache;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait LookupCache: Send + Sync {
    async fn get(&self, id: &OrderId) -> Result<Option<Arc<Order>>, CacheError>;

    /// Unconditionally replace the entry for `id`. Only the ingestion path,
    /// which has just written `order` to the store, may overwrite.
    async fn set(&self, id: OrderId, order: Arc<Order>) -> Result<(), CacheError>;

    /// Insert `order` unless an entry for `id` already exists, and return the
    /// resident snapshot. Used for store read-backs, which may be older than
    /// an entry written concurrently by ingestion.
    async fn populate(&self, id: OrderId, order: Arc<Order>) -> Result<Arc<Order>, CacheError>;

    async fn len(&self) -> usize;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A cache whose every operation fails.
    pub(crate) struct BrokenCache;

    #[async_trait]
    impl LookupCache for BrokenCache {
        async fn get(&self, _id: &OrderId) -> Result<Option<Arc<Order>>, CacheError> {
            Err(CacheError::Unavailable("broken".to_string()))
        }

        async fn set(&self, _id: OrderId, _order: Arc<Order>) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("broken".to_string()))
        }

        async fn populate(&self, _id: OrderId, _order: Arc<Order>) -> Result<Arc<Order>, CacheError> {
            Err(CacheError::Unavailable("broken".to_string()))
        }

        async fn len(&self) -> usize {
            0
        }
    }
}
