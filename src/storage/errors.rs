use crate::utils::IsTransient;

// ============================================================================
// Order Store Errors
// ============================================================================

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to connect to order store: {0}")]
    Connection(String),

    #[error("failed to create order schema: {0}")]
    Schema(String),

    #[error("existence check failed for order {order_uid}: {reason}")]
    ExistenceCheck {
        order_uid: String,
        reason: String,
        transient: bool,
    },

    #[error("failed to persist order {order_uid}: {reason}")]
    Persistence {
        order_uid: String,
        reason: String,
        transient: bool,
    },

    #[error("failed to load orders: {0}")]
    Retrieval(String),

    #[error("failed to reload order {order_uid}: {reason}")]
    Reload {
        order_uid: String,
        reason: String,
        transient: bool,
    },
}

impl StoreError {
    pub fn existence_check(order_uid: &str, err: sqlx::Error) -> Self {
        StoreError::ExistenceCheck {
            order_uid: order_uid.to_string(),
            transient: is_transient_sqlx(&err),
            reason: err.to_string(),
        }
    }

    pub fn persistence(order_uid: &str, stage: &str, err: sqlx::Error) -> Self {
        StoreError::Persistence {
            order_uid: order_uid.to_string(),
            transient: is_transient_sqlx(&err),
            reason: format!("{}: {}", stage, err),
        }
    }

    pub fn reload(order_uid: &str, stage: &str, err: sqlx::Error) -> Self {
        StoreError::Reload {
            order_uid: order_uid.to_string(),
            transient: is_transient_sqlx(&err),
            reason: format!("{}: {}", stage, err),
        }
    }

    pub fn retrieval(stage: &str, err: sqlx::Error) -> Self {
        StoreError::Retrieval(format!("{}: {}", stage, err))
    }
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::ExistenceCheck { transient, .. }
            | StoreError::Persistence { transient, .. }
            | StoreError::Reload { transient, .. } => *transient,
            StoreError::Connection(_) | StoreError::Schema(_) | StoreError::Retrieval(_) => false,
        }
    }
}

/// Errors reported by the database itself (bad data, constraint violations)
/// will fail the same way on every attempt; everything else is connectivity.
fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    !matches!(
        err,
        sqlx::Error::Database(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. }
    )
}
