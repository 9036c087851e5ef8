use actix::Addr;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::{GetSystemHealth, HealthMonitorActor};
use crate::metrics::Metrics;
use super::{LookupError, OrderLookup};

// ============================================================================
// HTTP Server - order lookups, health and metrics
// ============================================================================
//
// Routes:
//   GET /order?id=<order_uid>  -> cached order as JSON, 400 or 404
//   GET /health                -> aggregated health, 503 when unhealthy
//   GET /metrics               -> Prometheus text format
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub address: String,
    pub request_timeout: Duration,
    pub idle_timeout: Duration,
}

pub struct AppState {
    pub lookup: OrderLookup,
    pub metrics: Arc<Metrics>,
    pub health: Option<Addr<HealthMonitorActor>>,
}

#[derive(Debug, Deserialize)]
struct OrderQuery {
    id: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/order", web::get().to(order_handler))
        .route("/health", web::get().to(health_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

/// Serve until the server is stopped (SIGINT/SIGTERM are handled by actix-web)
pub async fn run_server(settings: &HttpSettings, state: web::Data<AppState>) -> std::io::Result<()> {
    tracing::info!(address = %settings.address, "Starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(configure)
    })
    .client_request_timeout(settings.request_timeout)
    .keep_alive(settings.idle_timeout)
    .bind(settings.address.as_str())?
    .run()
    .await
}

async fn order_handler(
    state: web::Data<AppState>,
    query: web::Query<OrderQuery>,
) -> Result<HttpResponse, LookupError> {
    let id = query.id.as_deref().unwrap_or_default();
    let order = state.lookup.lookup(id)?;
    Ok(HttpResponse::Ok().json(order.as_ref()))
}

async fn health_handler(state: web::Data<AppState>) -> impl Responder {
    let Some(ref monitor) = state.health else {
        return HttpResponse::ServiceUnavailable()
            .json(serde_json::json!({ "error": "health monitor not running" }));
    };

    match monitor.send(GetSystemHealth).await {
        Ok(health) if health.overall_status.is_unhealthy() => {
            HttpResponse::ServiceUnavailable().json(health)
        }
        Ok(health) => HttpResponse::Ok().json(health),
        Err(e) => {
            tracing::error!(error = %e, "Failed to query health monitor");
            HttpResponse::ServiceUnavailable()
                .json(serde_json::json!({ "error": "health monitor unavailable" }))
        }
    }
}

async fn metrics_handler(state: web::Data<AppState>) -> impl Responder {
    state.metrics.set_cache_entries(state.lookup.cached_orders());

    match state.metrics.render() {
        Ok(buffer) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix::Actor;
    use actix_web::{http::StatusCode, test};

    use crate::actors::{HealthStatus, UpdateHealth};
    use crate::cache::OrderCache;
    use crate::models::{tests::ORDER_1_JSON, Order};
    use crate::storage::memory::InMemoryOrderStore;
    use crate::storage::OrderStore;
    use crate::warmup::warm_start;

    fn state(cache: Arc<OrderCache>, health: Option<Addr<HealthMonitorActor>>) -> web::Data<AppState> {
        let metrics = Arc::new(Metrics::new().unwrap());
        web::Data::new(AppState {
            lookup: OrderLookup::new(cache, metrics.clone()),
            metrics,
            health,
        })
    }

    #[actix_web::test]
    async fn test_warm_started_order_is_served_verbatim() {
        let fixture = Order::from_json(ORDER_1_JSON.as_bytes()).unwrap();
        let store = InMemoryOrderStore::with_orders([fixture]);
        let cache = Arc::new(OrderCache::new());
        assert_eq!(warm_start(&store, &cache).await, 1);

        let app = test::init_service(
            App::new().app_data(state(cache, None)).configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/order?id=order_1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        assert_eq!(body.as_ref(), ORDER_1_JSON.as_bytes());
    }

    #[actix_web::test]
    async fn test_missing_id_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(OrderCache::new()), None))
                .configure(configure),
        )
        .await;

        for uri in ["/order", "/order?id="] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body, serde_json::json!({"error": "missing id parameter"}));
        }
    }

    #[actix_web::test]
    async fn test_unknown_id_is_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(OrderCache::new()), None))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/order?id=nonexistent").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, serde_json::json!({"error": "order nonexistent not found"}));
    }

    #[actix_web::test]
    async fn test_health_reflects_monitor() {
        let store: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
        let monitor = HealthMonitorActor::new(store, Duration::from_secs(3600)).start();
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(OrderCache::new()), Some(monitor.clone())))
                .configure(configure),
        )
        .await;

        monitor
            .send(UpdateHealth {
                component: "order_consumer".to_string(),
                status: HealthStatus::Unhealthy("no consumer workers running".to_string()),
                details: None,
            })
            .await
            .unwrap();

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        monitor
            .send(UpdateHealth {
                component: "order_consumer".to_string(),
                status: HealthStatus::Healthy,
                details: None,
            })
            .await
            .unwrap();

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["components"]["order_consumer"]["status"]["status"], "healthy");
    }

    #[actix_web::test]
    async fn test_metrics_report_cache_size() {
        let cache = Arc::new(OrderCache::new());
        cache.put(crate::models::sample_order(1));
        let app = test::init_service(App::new().app_data(state(cache, None)).configure(configure)).await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("order_cache_entries 1"));
    }
}
