use crate::storage::StoreError;
use crate::utils::IsTransient;

// ============================================================================
// Ingestion Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("malformed order payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("order payload has an empty order_uid")]
    MissingOrderUid,

    #[error(transparent)]
    ExistenceCheck(StoreError),

    #[error(transparent)]
    Persistence(StoreError),

    #[error(transparent)]
    Reload(StoreError),
}

impl IngestError {
    /// Only transient store failures can succeed on another delivery
    pub fn is_retryable(&self) -> bool {
        self.store_error().is_some_and(IsTransient::is_transient)
    }

    /// The store refused the order in a way redelivery cannot change
    pub fn is_store_rejection(&self) -> bool {
        self.store_error().is_some_and(|e| !e.is_transient())
    }

    fn store_error(&self) -> Option<&StoreError> {
        match self {
            IngestError::ExistenceCheck(e) | IngestError::Persistence(e) | IngestError::Reload(e) => {
                Some(e)
            }
            IngestError::Decode(_) | IngestError::MissingOrderUid => None,
        }
    }
}
