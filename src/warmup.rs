use crate::cache::OrderCache;
use crate::storage::OrderStore;

/// Load every persisted order into the cache before serving.
///
/// A failed load leaves the cache untouched and returns 0: the service still
/// starts and fills the cache from new messages.
pub async fn warm_start(store: &dyn OrderStore, cache: &OrderCache) -> usize {
    tracing::info!("Warming order cache from store");

    match store.load_all().await {
        Ok(orders) => {
            let loaded = cache.seed(orders);
            tracing::info!(orders = loaded, "Order cache warmed");
            loaded
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load orders for cache warm-up, starting cold");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_order;
    use crate::storage::memory::InMemoryOrderStore;

    #[tokio::test]
    async fn test_warm_start_loads_every_order() {
        let store = InMemoryOrderStore::with_orders((1..=3).map(sample_order));
        let cache = OrderCache::new();

        assert_eq!(warm_start(&store, &cache).await, 3);
        assert_eq!(cache.len(), 3);
        assert_eq!(*cache.get("order_2").unwrap(), sample_order(2));
    }

    #[tokio::test]
    async fn test_warm_start_from_empty_store() {
        let store = InMemoryOrderStore::new();
        let cache = OrderCache::new();

        assert_eq!(warm_start(&store, &cache).await, 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_leaves_cache_untouched() {
        let store = InMemoryOrderStore::with_orders([sample_order(1)]);
        store.fail_load();
        let cache = OrderCache::new();
        cache.put(sample_order(7));

        assert_eq!(warm_start(&store, &cache).await, 0);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("order_7").is_some());
    }
}
