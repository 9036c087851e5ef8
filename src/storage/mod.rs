// ============================================================================
// Storage Module - durable order persistence
// ============================================================================
//
// The OrderStore trait is the only way the rest of the service touches the
// database. Implementations must write an order and all of its delivery,
// payment and item rows as one unit, and must reject a second insert under
// the same order_uid by reporting AlreadyExists rather than failing.
//
// ============================================================================

mod errors;
mod postgres;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use std::collections::HashMap;
use crate::models::Order;

pub use errors::{StoreError, StoreResult};
pub use postgres::{PgOrderStore, PgStoreOptions};

/// Result of an insert that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The uniqueness constraint on order_uid rejected the row; a concurrent
    /// or earlier delivery already persisted this order.
    AlreadyExists,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn exists(&self, order_uid: &str) -> StoreResult<bool>;

    async fn insert(&self, order: &Order) -> StoreResult<InsertOutcome>;

    /// One persisted order, reassembled exactly as `load_all` would return it
    async fn load(&self, order_uid: &str) -> StoreResult<Option<Order>>;

    /// Every persisted order, reassembled. Never returns a partial map.
    async fn load_all(&self) -> StoreResult<HashMap<String, Order>>;

    async fn ping(&self) -> StoreResult<()>;
}
