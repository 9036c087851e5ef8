use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use std::sync::Arc;

use crate::cache::OrderCache;
use crate::metrics::Metrics;
use crate::models::Order;

// ============================================================================
// Order Lookup - read path over the cache
// ============================================================================
//
// Lookups never touch the store. Every reader (HTTP or otherwise) goes
// through here rather than reaching into the cache.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("missing id parameter")]
    MissingId,

    #[error("order {0} not found")]
    NotFound(String),
}

impl ResponseError for LookupError {
    fn status_code(&self) -> StatusCode {
        match self {
            LookupError::MissingId => StatusCode::BAD_REQUEST,
            LookupError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
        }))
    }
}

#[derive(Clone)]
pub struct OrderLookup {
    cache: Arc<OrderCache>,
    metrics: Arc<Metrics>,
}

impl OrderLookup {
    pub fn new(cache: Arc<OrderCache>, metrics: Arc<Metrics>) -> Self {
        Self { cache, metrics }
    }

    pub fn lookup(&self, order_uid: &str) -> Result<Arc<Order>, LookupError> {
        let order_uid = order_uid.trim();
        if order_uid.is_empty() {
            self.metrics.record_lookup("invalid");
            return Err(LookupError::MissingId);
        }

        match self.cache.get(order_uid) {
            Some(order) => {
                self.metrics.record_lookup("hit");
                Ok(order)
            }
            None => {
                self.metrics.record_lookup("miss");
                tracing::debug!(order_uid = %order_uid, "Order lookup missed");
                Err(LookupError::NotFound(order_uid.to_string()))
            }
        }
    }

    pub fn cached_orders(&self) -> usize {
        self.cache.len()
    }
}
