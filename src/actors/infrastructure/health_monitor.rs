use actix::prelude::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::core::{ComponentHealth, HealthStatus};
use crate::storage::OrderStore;

// ============================================================================
// Health Monitor Actor - Aggregates component health
// ============================================================================
//
// Components push their status with UpdateHealth. The store is probed on a
// fixed interval; the consumer workers report when they start and stop.
// GetSystemHealth folds everything into one overall status:
// - any component unhealthy -> Unhealthy
// - any component degraded  -> Degraded
// - otherwise               -> Healthy
//
// ============================================================================

pub const STORE_COMPONENT: &str = "order_store";

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "()")]
pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
    pub details: Option<String>,
}

#[derive(Message)]
#[rtype(result = "SystemHealth")]
pub struct GetSystemHealth;

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub check_time: DateTime<Utc>,
}

// ============================================================================
// Health Monitor Actor
// ============================================================================

pub struct HealthMonitorActor {
    components: HashMap<String, ComponentHealth>,
    store: Arc<dyn OrderStore>,
    probe_interval: Duration,
}

impl HealthMonitorActor {
    pub fn new(store: Arc<dyn OrderStore>, probe_interval: Duration) -> Self {
        Self {
            components: HashMap::new(),
            store,
            probe_interval,
        }
    }

    fn compute_overall_status(&self) -> HealthStatus {
        let mut has_degraded = false;
        let mut unhealthy_components = Vec::new();

        for (name, health) in &self.components {
            match &health.status {
                HealthStatus::Unhealthy(msg) => {
                    unhealthy_components.push(format!("{}: {}", name, msg));
                }
                HealthStatus::Degraded(_) => {
                    has_degraded = true;
                }
                HealthStatus::Healthy => {}
            }
        }

        if !unhealthy_components.is_empty() {
            unhealthy_components.sort();
            HealthStatus::Unhealthy(unhealthy_components.join(", "))
        } else if has_degraded {
            HealthStatus::Degraded("Some components degraded".to_string())
        } else {
            HealthStatus::Healthy
        }
    }

    fn probe_store(&self, ctx: &mut Context<Self>) {
        let store = self.store.clone();
        let addr = ctx.address();

        actix::spawn(async move {
            let status = match store.ping().await {
                Ok(()) => HealthStatus::Healthy,
                Err(e) => HealthStatus::Unhealthy(e.to_string()),
            };

            addr.do_send(UpdateHealth {
                component: STORE_COMPONENT.to_string(),
                status,
                details: None,
            });
        });
    }
}

impl Actor for HealthMonitorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            probe_interval_ms = self.probe_interval.as_millis(),
            "HealthMonitorActor started"
        );

        self.probe_store(ctx);
        ctx.run_interval(self.probe_interval, |act, ctx| act.probe_store(ctx));
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("HealthMonitorActor stopped");
    }
}

impl Handler<UpdateHealth> for HealthMonitorActor {
    type Result = ();

    fn handle(&mut self, msg: UpdateHealth, _: &mut Self::Context) {
        let previous = self
            .components
            .get(&msg.component)
            .map(|health| health.status.clone());

        if previous.as_ref() != Some(&msg.status) {
            match &msg.status {
                HealthStatus::Healthy => {
                    tracing::info!(component = %msg.component, "Component healthy")
                }
                HealthStatus::Degraded(reason) => {
                    tracing::warn!(component = %msg.component, reason = %reason, "Component degraded")
                }
                HealthStatus::Unhealthy(reason) => {
                    tracing::error!(component = %msg.component, reason = %reason, "Component unhealthy")
                }
            }
        }

        let health = ComponentHealth::new(msg.component.clone(), msg.status).with_details(msg.details);
        self.components.insert(msg.component, health);
    }
}

impl Handler<GetSystemHealth> for HealthMonitorActor {
    type Result = MessageResult<GetSystemHealth>;

    fn handle(&mut self, _msg: GetSystemHealth, _: &mut Self::Context) -> Self::Result {
        MessageResult(SystemHealth {
            overall_status: self.compute_overall_status(),
            components: self.components.clone(),
            check_time: Utc::now(),
        })
    }
}
