// ============================================================================
// Order Store - Durable Repository for Order Aggregates
// ============================================================================
//
// Responsibilities:
// 1. Save an aggregate atomically (upsert across all four tables)
// 2. Find an aggregate as one consistent read, never a partial one
// 3. List the most recently created order ids for cache warm-up
//
// ============================================================================

mod postgres;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;

use crate::domain::order::{Order, OrderId};
use crate::utils::IsTransient;

pub use postgres::{connect, run_migrations, PgOrderStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Infrastructure failure: connection, pool, IO, serialization conflicts.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The database refused the data itself; retrying cannot succeed.
    #[error("order rejected by the store: {0}")]
    Rejected(String),

    /// The header exists but a required part of the aggregate does not.
    #[error("order {order_id} is incomplete: missing {part}")]
    Incomplete { order_id: OrderId, part: &'static str },

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Database(_))
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Assemble the complete aggregate, `None` when the header does not exist.
    async fn find(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// Insert or fully replace the aggregate in one transaction.
    async fn save(&self, order: &Order) -> Result<(), StoreError>;

    /// The `limit` most recently created order ids, newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<OrderId>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_infrastructure_errors_are_transient() {
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!StoreError::Rejected("check constraint".to_string()).is_transient());
        assert!(!StoreError::Incomplete {
            order_id: OrderId::from(uuid::Uuid::new_v4()),
            part: "payment",
        }
        .is_transient());
    }
}
