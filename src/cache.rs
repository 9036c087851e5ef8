use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use crate::models::Order;

// ============================================================================
// Order Cache - in-memory read model of the order store
// ============================================================================
//
// Single map behind a reader/writer lock:
// - get takes the shared lock
// - put/seed take the exclusive lock
//
// Entries are wrapped in Arc before the lock is taken, so writers hold the
// lock only for the map operation and readers clone a pointer, never an order.
// There is no eviction; entries live for the process lifetime.
//
// ============================================================================

#[derive(Default)]
pub struct OrderCache {
    orders: RwLock<HashMap<String, Arc<Order>>>,
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a bulk mapping into the cache, overwriting entries with the same id.
    /// Returns the number of entries after the merge.
    pub fn seed(&self, orders: HashMap<String, Order>) -> usize {
        let entries: Vec<(String, Arc<Order>)> = orders
            .into_iter()
            .map(|(order_uid, order)| (order_uid, Arc::new(order)))
            .collect();

        let mut map = self.orders.write();
        map.extend(entries);
        map.len()
    }

    pub fn put(&self, order: Order) {
        let order_uid = order.order_uid.clone();
        let order = Arc::new(order);

        self.orders.write().insert(order_uid, order);
    }

    pub fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        self.orders.read().get(order_uid).cloned()
    }

    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_order;

    #[test]
    fn test_get_missing_returns_none() {
        let cache = OrderCache::new();
        assert!(cache.get("nonexistent").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let cache = OrderCache::new();
        cache.put(sample_order(1));

        let order = cache.get("order_1").unwrap();
        assert_eq!(*order, sample_order(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_overwrites_same_id() {
        let cache = OrderCache::new();
        cache.put(sample_order(1));

        let mut updated = sample_order(1);
        updated.locale = "en".to_string();
        cache.put(updated);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("order_1").unwrap().locale, "en");
    }

    #[test]
    fn test_seed_merges_and_is_idempotent() {
        let cache = OrderCache::new();
        cache.put(sample_order(9));

        let batch: HashMap<String, Order> = (1..=3)
            .map(|n| {
                let order = sample_order(n);
                (order.order_uid.clone(), order)
            })
            .collect();

        assert_eq!(cache.seed(batch.clone()), 4);
        assert_eq!(cache.seed(batch), 4);
        assert!(cache.get("order_9").is_some());
        assert!(cache.get("order_2").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reads_and_writes_see_whole_orders() {
        let cache = Arc::new(OrderCache::new());
        let mut handles = Vec::new();

        for writer in 0..4i32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..250i32 {
                    cache.put(sample_order(writer * 1000 + n));
                }
            }));
        }

        for reader in 0..4i32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..250i32 {
                    let id = format!("order_{}", reader * 1000 + n);
                    if let Some(order) = cache.get(&id) {
                        // every field of an order carries its number; a torn
                        // read would mix numbers
                        assert_eq!(*order, sample_order(reader * 1000 + n));
                    }
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len(), 1000);
    }
}
