use actix::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::core::HealthStatus;
use crate::ingestion::IngestionPipeline;
use crate::messaging::OrderConsumer;
use crate::storage::OrderStore;
use super::{GetSystemHealth, HealthMonitorActor, IngestionActor};

// ============================================================================
// Coordinator Actor - Orchestrates all system actors
// ============================================================================
//
// Responsibilities:
// - Starts the health monitor, then the ingestion actor reporting into it
// - Logs aggregated system health on an interval
// - Stops children on Shutdown
//
// Actor Hierarchy:
//   CoordinatorActor
//   ├── HealthMonitorActor
//   └── IngestionActor (consumer workers)
//
// ============================================================================

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);

pub struct CoordinatorActor {
    store: Arc<dyn OrderStore>,
    pipeline: Arc<IngestionPipeline>,
    consumers: Option<Vec<OrderConsumer>>,
    probe_interval: Duration,
    ingestion: Option<Addr<IngestionActor>>,
    health_monitor: Option<Addr<HealthMonitorActor>>,
}

impl CoordinatorActor {
    pub fn new(
        store: Arc<dyn OrderStore>,
        pipeline: Arc<IngestionPipeline>,
        consumers: Vec<OrderConsumer>,
        probe_interval: Duration,
    ) -> Self {
        Self {
            store,
            pipeline,
            consumers: Some(consumers),
            probe_interval,
            ingestion: None,
            health_monitor: None,
        }
    }

    fn start_child_actors(&mut self) {
        tracing::info!("Starting child actors");

        let health_monitor =
            HealthMonitorActor::new(self.store.clone(), self.probe_interval).start();
        self.health_monitor = Some(health_monitor.clone());

        let consumers = self.consumers.take().unwrap_or_default();
        let ingestion =
            IngestionActor::new(consumers, self.pipeline.clone(), health_monitor).start();
        self.ingestion = Some(ingestion);

        tracing::info!("All child actors started");
    }
}

impl Actor for CoordinatorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("CoordinatorActor started");
        self.start_child_actors();

        ctx.run_interval(HEALTH_LOG_INTERVAL, |act, _ctx| {
            if let Some(ref health_monitor) = act.health_monitor {
                let health_monitor = health_monitor.clone();
                actix::spawn(async move {
                    match health_monitor.send(GetSystemHealth).await {
                        Ok(health) => match health.overall_status {
                            HealthStatus::Healthy => {
                                tracing::debug!("System health check: Healthy");
                            }
                            HealthStatus::Degraded(ref msg) => {
                                tracing::warn!("System health check: Degraded - {}", msg);
                            }
                            HealthStatus::Unhealthy(ref msg) => {
                                tracing::error!("System health check: Unhealthy - {}", msg);
                            }
                        },
                        Err(e) => {
                            tracing::error!("Failed to get system health: {}", e);
                        }
                    }
                });
            }
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        tracing::info!("CoordinatorActor stopping - initiating graceful shutdown");
        Running::Stop
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("CoordinatorActor stopped");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "Option<Addr<HealthMonitorActor>>")]
pub struct GetHealthMonitor;

impl Handler<GetHealthMonitor> for CoordinatorActor {
    type Result = Option<Addr<HealthMonitorActor>>;

    fn handle(&mut self, _msg: GetHealthMonitor, _: &mut Self::Context) -> Self::Result {
        self.health_monitor.clone()
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;

impl Handler<Shutdown> for CoordinatorActor {
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) {
        tracing::info!("Received shutdown signal");

        // Consumers first so no message is picked up after the monitor is gone
        if let Some(ingestion) = self.ingestion.take() {
            ingestion.do_send(StopActor);
        }

        if let Some(health_monitor) = self.health_monitor.take() {
            health_monitor.do_send(StopActor);
        }

        ctx.stop();
    }
}

/// Message to gracefully stop an actor
#[derive(Message)]
#[rtype(result = "()")]
struct StopActor;

impl Handler<StopActor> for IngestionActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("IngestionActor received stop signal");
        ctx.stop();
    }
}

impl Handler<StopActor> for HealthMonitorActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("HealthMonitorActor received stop signal");
        ctx.stop();
    }
}
