// ============================================================================
// Infrastructure Actors
// ============================================================================
//
// - Health monitoring (store probe + component reports)
// - Order stream ingestion (consumer workers)
// - Coordination and shutdown
//
// ============================================================================

mod coordinator;
mod health_monitor;
mod ingestion;

pub use coordinator::{CoordinatorActor, GetHealthMonitor, Shutdown};
pub use health_monitor::{GetSystemHealth, HealthMonitorActor, SystemHealth, UpdateHealth, STORE_COMPONENT};
pub use ingestion::{IngestionActor, CONSUMER_COMPONENT};
