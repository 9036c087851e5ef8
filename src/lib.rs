// ============================================================================
// Order Ingest - message stream -> Postgres -> in-memory cache -> HTTP
// ============================================================================

pub mod actors;
pub mod api;
pub mod cache;
pub mod config;
pub mod ingestion;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod storage;
pub mod utils;
pub mod warmup;
