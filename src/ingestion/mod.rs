// ============================================================================
// Ingestion Pipeline - message payload -> durable, cache-visible order
// ============================================================================
//
// Per message:
//   decode -> exists? -> insert -> cache.put -> ack
//
// - decode failure or empty order_uid: Drop (redelivery cannot fix it)
// - transient store failure: Redeliver (nothing was written)
// - permanent store failure: Drop, logged and counted as dead_lettered
// - already persisted, either by the fast-path check or by the uniqueness
//   constraint rejecting the insert: Ack as a duplicate once the stored
//   row is in the cache
// - inserted: the order is put in the cache before the Ack is returned
//
// The pipeline knows nothing about the broker; the consumer maps the
// Disposition onto commit / seek.
//
// ============================================================================

mod errors;

use std::sync::Arc;
use std::time::Instant;

use crate::cache::OrderCache;
use crate::metrics::Metrics;
use crate::models::Order;
use crate::storage::{InsertOutcome, OrderStore};
use crate::utils::{retry_on_transient, RetryConfig};

pub use errors::IngestError;

/// What happened to an order that made it through the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    Inserted(String),
    Duplicate(String),
}

/// What the transport should do with the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Persisted and cached (or already was); acknowledge
    Ack,
    /// Unprocessable; acknowledge past it without retrying
    Drop,
    /// Nothing was written; hand the message back for another delivery
    Redeliver,
}

pub struct IngestionPipeline {
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: Arc<OrderCache>,
        metrics: Arc<Metrics>,
        retry: RetryConfig,
    ) -> Self {
        Self { store, cache, metrics, retry }
    }

    /// Process one raw message and decide its fate. Never fails: every error
    /// is logged here and folded into the returned Disposition.
    pub async fn handle(&self, payload: &[u8]) -> Disposition {
        let started = Instant::now();

        let (disposition, outcome) = match self.ingest(payload).await {
            Ok(Ingested::Inserted(order_uid)) => {
                tracing::info!(order_uid = %order_uid, "Order persisted and cached");
                (Disposition::Ack, "inserted")
            }
            Ok(Ingested::Duplicate(order_uid)) => {
                tracing::info!(order_uid = %order_uid, "Order already persisted, acknowledging duplicate");
                (Disposition::Ack, "duplicate")
            }
            Err(e) if e.is_retryable() => {
                tracing::error!(error = %e, "Order not persisted, leaving message for redelivery");
                (Disposition::Redeliver, "redelivered")
            }
            Err(e) if e.is_store_rejection() => {
                tracing::error!(
                    error = %e,
                    payload_bytes = payload.len(),
                    "Store rejected order permanently, dead-lettering message"
                );
                (Disposition::Drop, "dead_lettered")
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    payload_bytes = payload.len(),
                    "Dropping unprocessable order message"
                );
                (Disposition::Drop, "dropped")
            }
        };

        self.metrics.record_ingest(outcome, started.elapsed().as_secs_f64());
        disposition
    }

    pub async fn ingest(&self, payload: &[u8]) -> Result<Ingested, IngestError> {
        let order = Order::from_json(payload)?;
        if !order.has_identifier() {
            return Err(IngestError::MissingOrderUid);
        }

        let order_uid = order.order_uid.clone();
        let uid = order_uid.as_str();
        let store = self.store.as_ref();
        let metrics = self.metrics.as_ref();

        // Fast path only; the insert below is what actually enforces uniqueness.
        let exists = retry_on_transient(&self.retry, move |attempt| {
            if attempt > 1 {
                metrics.record_retry_attempt("exists");
            }
            store.exists(uid)
        })
        .await
        .into_result()
        .map_err(IngestError::ExistenceCheck)?;

        if exists {
            self.ensure_cached(uid).await?;
            return Ok(Ingested::Duplicate(order_uid));
        }

        let pending = &order;
        let outcome = retry_on_transient(&self.retry, move |attempt| {
            if attempt > 1 {
                metrics.record_retry_attempt("insert");
            }
            store.insert(pending)
        })
        .await
        .into_result()
        .map_err(IngestError::Persistence)?;

        match outcome {
            InsertOutcome::Inserted => {
                self.cache.put(order);
                Ok(Ingested::Inserted(order_uid))
            }
            InsertOutcome::AlreadyExists => {
                tracing::debug!(
                    order_uid = %order_uid,
                    "Insert lost a race with a concurrent delivery"
                );
                self.ensure_cached(uid).await?;
                Ok(Ingested::Duplicate(order_uid))
            }
        }
    }

    /// A persisted order can be missing from the cache when an earlier
    /// delivery committed but never got the reply. Mirror the stored row.
    async fn ensure_cached(&self, order_uid: &str) -> Result<(), IngestError> {
        if self.cache.get(order_uid).is_some() {
            return Ok(());
        }

        let store = self.store.as_ref();
        let metrics = self.metrics.as_ref();
        let stored = retry_on_transient(&self.retry, move |attempt| {
            if attempt > 1 {
                metrics.record_retry_attempt("load");
            }
            store.load(order_uid)
        })
        .await
        .into_result()
        .map_err(IngestError::Reload)?;

        match stored {
            Some(order) => {
                tracing::info!(order_uid = %order_uid, "Restored persisted order into cache");
                self.cache.put(order);
            }
            None => {
                tracing::warn!(order_uid = %order_uid, "Order reported as persisted but not found");
            }
        }
        Ok(())
    }
}
