// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure for the long-running parts of the service.
//
// Structure:
// - core/           - Health types shared by actors and the HTTP layer
// - infrastructure/ - Concrete actors (Ingestion, Health, Coordinator)
//
// The ingestion pipeline and the cache are plain types; actors only own
// lifecycles.
//
// ============================================================================

mod core;
mod infrastructure;

pub use core::{ComponentHealth, HealthStatus};
pub use infrastructure::{
    CoordinatorActor,
    GetHealthMonitor,
    GetSystemHealth,
    HealthMonitorActor,
    IngestionActor,
    Shutdown,
    SystemHealth,
    UpdateHealth,
};
