use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::models::Order;
use super::{InsertOutcome, OrderStore, StoreError, StoreResult};

// ============================================================================
// In-memory Order Store with fault injection (tests only)
// ============================================================================

#[derive(Default)]
pub(crate) struct InMemoryOrderStore {
    orders: Mutex<HashMap<String, Order>>,
    failing_exists: AtomicUsize,
    failing_inserts: AtomicUsize,
    lost_commits: AtomicUsize,
    permanent_failures: AtomicBool,
    stale_exists: AtomicBool,
    failing_load: AtomicBool,
    insert_calls: AtomicUsize,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let store = Self::new();
        {
            let mut map = store.orders.lock();
            for order in orders {
                map.insert(order.order_uid.clone(), order);
            }
        }
        store
    }

    /// Fail the next `n` existence checks
    pub fn fail_exists(&self, n: usize) {
        self.failing_exists.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` inserts without writing anything
    pub fn fail_inserts(&self, n: usize) {
        self.failing_inserts.store(n, Ordering::SeqCst);
    }

    /// The next `n` inserts write the order and then report a transient
    /// failure, as when a commit succeeds but its reply is lost
    pub fn lose_commits(&self, n: usize) {
        self.lost_commits.store(n, Ordering::SeqCst);
    }

    /// Injected failures are reported as non-retryable
    pub fn permanent_failures(&self) {
        self.permanent_failures.store(true, Ordering::SeqCst);
    }

    /// Existence checks always answer "absent", widening the race window
    /// between the check and the insert
    pub fn stale_exists(&self) {
        self.stale_exists.store(true, Ordering::SeqCst);
    }

    pub fn fail_load(&self) {
        self.failing_load.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.orders.lock().len()
    }

    pub fn get(&self, order_uid: &str) -> Option<Order> {
        self.orders.lock().get(order_uid).cloned()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn transient(&self) -> bool {
        !self.permanent_failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn exists(&self, order_uid: &str) -> StoreResult<bool> {
        tokio::task::yield_now().await;

        if Self::take_failure(&self.failing_exists) {
            return Err(StoreError::ExistenceCheck {
                order_uid: order_uid.to_string(),
                reason: "injected failure".to_string(),
                transient: self.transient(),
            });
        }

        if self.stale_exists.load(Ordering::SeqCst) {
            return Ok(false);
        }

        Ok(self.orders.lock().contains_key(order_uid))
    }

    async fn insert(&self, order: &Order) -> StoreResult<InsertOutcome> {
        tokio::task::yield_now().await;
        self.insert_calls.fetch_add(1, Ordering::SeqCst);

        if Self::take_failure(&self.failing_inserts) {
            return Err(StoreError::Persistence {
                order_uid: order.order_uid.clone(),
                reason: "injected failure".to_string(),
                transient: self.transient(),
            });
        }

        {
            let mut orders = self.orders.lock();
            if orders.contains_key(&order.order_uid) {
                return Ok(InsertOutcome::AlreadyExists);
            }
            orders.insert(order.order_uid.clone(), order.clone());
        }

        if Self::take_failure(&self.lost_commits) {
            return Err(StoreError::Persistence {
                order_uid: order.order_uid.clone(),
                reason: "connection reset after commit".to_string(),
                transient: true,
            });
        }

        Ok(InsertOutcome::Inserted)
    }

    async fn load(&self, order_uid: &str) -> StoreResult<Option<Order>> {
        tokio::task::yield_now().await;
        Ok(self.orders.lock().get(order_uid).cloned())
    }

    async fn load_all(&self) -> StoreResult<HashMap<String, Order>> {
        if self.failing_load.load(Ordering::SeqCst) {
            return Err(StoreError::Retrieval("injected failure".to_string()));
        }
        Ok(self.orders.lock().clone())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
