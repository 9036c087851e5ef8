use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers:
// - Ingestion outcomes and latency per message
// - In-process store retries
// - Lookup hits and misses
// - Cache size (refreshed on every scrape)
//
// Scraped via GET /metrics on the order HTTP server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Ingestion Metrics
    pub orders_ingested: IntCounterVec,
    pub ingest_duration: HistogramVec,

    // Retry Metrics
    pub store_retries: IntCounterVec,

    // Read Path Metrics
    pub order_lookups: IntCounterVec,
    pub cache_entries: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_ingested = IntCounterVec::new(
            Opts::new("orders_ingested_total", "Inbound order messages by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(orders_ingested.clone()))?;

        let ingest_duration = HistogramVec::new(
            HistogramOpts::new("order_ingest_duration_seconds", "Time from receipt to disposition of one message")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(ingest_duration.clone()))?;

        let store_retries = IntCounterVec::new(
            Opts::new("order_store_retries_total", "Store calls repeated after a transient failure"),
            &["operation"],
        )?;
        registry.register(Box::new(store_retries.clone()))?;

        let order_lookups = IntCounterVec::new(
            Opts::new("order_lookups_total", "Order lookups by result"),
            &["result"],
        )?;
        registry.register(Box::new(order_lookups.clone()))?;

        let cache_entries = IntGauge::new("order_cache_entries", "Orders held in the cache")?;
        registry.register(Box::new(cache_entries.clone()))?;

        Ok(Self {
            registry,
            orders_ingested,
            ingest_duration,
            store_retries,
            order_lookups,
            cache_entries,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_ingest(&self, outcome: &str, duration_secs: f64) {
        self.orders_ingested.with_label_values(&[outcome]).inc();
        self.ingest_duration.with_label_values(&[outcome]).observe(duration_secs);
    }

    pub fn record_retry_attempt(&self, operation: &str) {
        self.store_retries.with_label_values(&[operation]).inc();
    }

    pub fn record_lookup(&self, result: &str) {
        self.order_lookups.with_label_values(&[result]).inc();
    }

    pub fn set_cache_entries(&self, entries: usize) {
        self.cache_entries.set(entries as i64);
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn render(&self) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_ingest() {
        let metrics = Metrics::new().unwrap();
        metrics.record_ingest("inserted", 0.01);
        metrics.record_ingest("inserted", 0.02);
        metrics.record_ingest("duplicate", 0.001);

        assert_eq!(metrics.orders_ingested.with_label_values(&["inserted"]).get(), 2);
        assert_eq!(metrics.orders_ingested.with_label_values(&["duplicate"]).get(), 1);
        assert_eq!(metrics.ingest_duration.with_label_values(&["inserted"]).get_sample_count(), 2);
    }

    #[test]
    fn test_record_lookup_and_cache_size() {
        let metrics = Metrics::new().unwrap();
        metrics.record_lookup("hit");
        metrics.record_lookup("miss");
        metrics.set_cache_entries(42);

        assert_eq!(metrics.order_lookups.with_label_values(&["hit"]).get(), 1);
        assert_eq!(metrics.cache_entries.get(), 42);
    }

    #[test]
    fn test_render_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.record_retry_attempt("insert");

        let text = String::from_utf8(metrics.render().unwrap()).unwrap();
        assert!(text.contains("order_store_retries_total{operation=\"insert\"} 1"));
    }
}
