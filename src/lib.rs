// ============================================================================
// Order Service
// ============================================================================
//
// Consumes orders from a Kafka topic, persists each one atomically in
// PostgreSQL, keeps an in-process lookup cache and serves orders by id over
// HTTP.
//
// ============================================================================

pub mod cache;
pub mod config;
pub mod domain;
pub mod http;
pub mod ingest;
pub mod messaging;
pub mod metrics;
pub mod query;
pub mod store;
pub mod telemetry;
pub mod utils;
pub mod warmup;
