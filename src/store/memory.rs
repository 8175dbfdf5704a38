use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{OrderStore, StoreError};
use crate::domain::order::{Order, OrderId};

// ============================================================================
// In-Memory Order Store (test double)
// ============================================================================
//
// Same upsert/find semantics as the PostgreSQL store, plus fault injection:
// - queued save failures, returned one per save call
// - per-id find failures and find calls that never complete
// - a failing list_recent
//
// ============================================================================

#[derive(Default)]
pub(crate) struct MemoryOrderStore {
    orders: Mutex<HashMap<OrderId, Order>>,
    save_failures: Mutex<VecDeque<StoreError>>,
    failing_finds: Mutex<HashSet<OrderId>>,
    hanging_finds: Mutex<HashSet<OrderId>>,
    fail_list: AtomicBool,
    find_calls: AtomicUsize,
    save_calls: AtomicUsize,
}

impl MemoryOrderStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let store = Self::new();
        {
            let mut map = store.orders.lock().unwrap();
            for order in orders {
                map.insert(order.id(), order);
            }
        }
        store
    }

    pub(crate) fn fail_next_save(&self, error: StoreError) {
        self.save_failures.lock().unwrap().push_back(error);
    }

    pub(crate) fn fail_find(&self, id: OrderId) {
        self.failing_finds.lock().unwrap().insert(id);
    }

    pub(crate) fn hang_find(&self, id: OrderId) {
        self.hanging_finds.lock().unwrap().insert(id);
    }

    pub(crate) fn fail_list(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    pub(crate) fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn len(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub(crate) fn get(&self, id: &OrderId) -> Option<Order> {
        self.orders.lock().unwrap().get(id).cloned()
    }
}

pub(crate) fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);

        let hangs = self.hanging_finds.lock().unwrap().contains(id);
        if hangs {
            std::future::pending::<()>().await;
        }

        if self.failing_finds.lock().unwrap().contains(id) {
            return Err(unavailable());
        }

        Ok(self.orders.lock().unwrap().get(id).cloned())
    }

    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.save_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        self.orders.lock().unwrap().insert(order.id(), order.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<OrderId>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let orders = self.orders.lock().unwrap();
        let mut recent: Vec<&Order> = orders.values().collect();
        recent.sort_by(|a, b| b.date_created.cmp(&a.date_created));

        Ok(recent.into_iter().take(limit).map(Order::id).collect())
    }
}
