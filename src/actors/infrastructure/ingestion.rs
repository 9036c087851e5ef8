use actix::prelude::*;
use std::sync::Arc;

use crate::actors::core::HealthStatus;
use crate::ingestion::IngestionPipeline;
use crate::messaging::OrderConsumer;
use super::{HealthMonitorActor, UpdateHealth};

// ============================================================================
// Ingestion Actor - owns the consumer workers
// ============================================================================
//
// Each OrderConsumer runs as a future spawned on this actor's context, so
// stopping the actor drops every worker loop with it. Workers only return
// if their loop ends; the remaining count is reported as consumer health.
//
// ============================================================================

pub const CONSUMER_COMPONENT: &str = "order_consumer";

pub struct IngestionActor {
    consumers: Vec<OrderConsumer>,
    pipeline: Arc<IngestionPipeline>,
    health_monitor: Addr<HealthMonitorActor>,
    workers: usize,
    running: usize,
}

impl IngestionActor {
    pub fn new(
        consumers: Vec<OrderConsumer>,
        pipeline: Arc<IngestionPipeline>,
        health_monitor: Addr<HealthMonitorActor>,
    ) -> Self {
        let workers = consumers.len();
        Self {
            consumers,
            pipeline,
            health_monitor,
            workers,
            running: 0,
        }
    }

    fn report_health(&self) {
        let status = if self.running == self.workers && self.workers > 0 {
            HealthStatus::Healthy
        } else if self.running == 0 {
            HealthStatus::Unhealthy("no consumer workers running".to_string())
        } else {
            HealthStatus::Degraded(format!(
                "{} of {} consumer workers running",
                self.running, self.workers
            ))
        };

        self.health_monitor.do_send(UpdateHealth {
            component: CONSUMER_COMPONENT.to_string(),
            status,
            details: Some(format!("{} workers", self.running)),
        });
    }
}

impl Actor for IngestionActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(workers = self.workers, "IngestionActor started");

        for consumer in std::mem::take(&mut self.consumers) {
            let pipeline = self.pipeline.clone();
            self.running += 1;

            ctx.spawn(consumer.run(pipeline).into_actor(self).map(|_, act, _ctx| {
                act.running = act.running.saturating_sub(1);
                tracing::error!(running = act.running, "Order consumer worker exited");
                act.report_health();
            }));
        }

        self.report_health();
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("IngestionActor stopped; consumer workers dropped");
        self.running = 0;
        self.report_health();
    }
}
