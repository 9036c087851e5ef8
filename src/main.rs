use actix::prelude::*;
use actix_web::web;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_ingest::actors::{CoordinatorActor, GetHealthMonitor, Shutdown};
use order_ingest::api::{self, AppState, OrderLookup};
use order_ingest::cache::OrderCache;
use order_ingest::config::{AppConfig, Environment};
use order_ingest::ingestion::IngestionPipeline;
use order_ingest::messaging::OrderConsumer;
use order_ingest::metrics::Metrics;
use order_ingest::storage::{OrderStore, PgOrderStore};
use order_ingest::warmup::warm_start;

fn init_tracing(env: Environment) {
    // RUST_LOG overrides the per-environment default level
    let default_level = match env {
        Environment::Local | Environment::Dev => "debug",
        Environment::Prod => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match env {
        Environment::Local => tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init(),
        Environment::Dev | Environment::Prod => tracing_subscriber::registry()
            .with(fmt::layer().json().with_current_span(false))
            .with(filter)
            .init(),
    }
}

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // === 1. Configuration and logging ===
    let config = AppConfig::load()?;
    init_tracing(config.env);

    tracing::info!(env = ?config.env, "Starting order ingest service");

    // === 2. Durable store ===
    let store: Arc<dyn OrderStore> = Arc::new(PgOrderStore::connect(&config.store_options()).await?);

    // === 3. Metrics and cache ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("Metrics registry created with {} metrics", metrics.registry().gather().len());

    let cache = Arc::new(OrderCache::new());

    // === 4. Warm start, before anything reads or writes the cache ===
    warm_start(store.as_ref(), &cache).await;

    // === 5. Ingestion ===
    let pipeline = Arc::new(IngestionPipeline::new(
        store.clone(),
        cache.clone(),
        metrics.clone(),
        config.retry_config(),
    ));
    let consumers = OrderConsumer::connect_group(&config.consumer_settings())?;

    tracing::info!("Starting coordinator actor");
    let coordinator =
        CoordinatorActor::new(store, pipeline, consumers, config.probe_interval()).start();
    let health = coordinator.send(GetHealthMonitor).await?;

    // === 6. HTTP read path; runs until SIGINT/SIGTERM ===
    let state = web::Data::new(AppState {
        lookup: OrderLookup::new(cache, metrics.clone()),
        metrics,
        health,
    });
    let served = api::run_server(&config.http_settings(), state).await;

    tracing::info!("HTTP server stopped, shutting down");
    coordinator.send(Shutdown).await?;

    served?;
    tracing::info!("Order ingest service stopped");
    Ok(())
}
