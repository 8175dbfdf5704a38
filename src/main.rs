use std::sync::Arc;
use tokio::sync::watch;

use order_service::cache::{LookupCache, MemoryCache};
use order_service::config::Config;
use order_service::http::start_api_server;
use order_service::ingest::{IngestionPipeline, KafkaSource, PgDeadLetterSink};
use order_service::metrics::{start_metrics_server, Metrics};
use order_service::query::QueryService;
use order_service::store::{self, OrderStore, PgOrderStore};
use order_service::telemetry::{init_tracing, DEFAULT_LOG_FILTER};
use order_service::warmup::CacheWarmup;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(DEFAULT_LOG_FILTER);

    tracing::info!("🚀 Starting order service");

    let config = Config::from_env()?;

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 2. PostgreSQL ===
    tracing::info!("Connecting to PostgreSQL...");
    let pool = store::connect(&config.pg_dsn, config.pg_max_connections, config.pg_acquire_timeout).await?;
    store::run_migrations(&pool).await?;

    let order_store: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(pool.clone()));
    let cache: Arc<dyn LookupCache> = Arc::new(MemoryCache::with_capacity(config.cache_capacity));

    // === 3. Warm the cache before accepting reads ===
    CacheWarmup::new(order_store.clone(), cache.clone(), metrics.clone())
        .with_limit(config.warmup_limit)
        .with_lookup_timeout(config.warmup_lookup_timeout)
        .run()
        .await;

    // === 4. HTTP servers ===
    let metrics_server = start_metrics_server(metrics.registry().clone(), config.metrics_port)?;
    let metrics_handle = metrics_server.handle();
    tokio::spawn(metrics_server);

    let query = Arc::new(QueryService::new(order_store.clone(), cache.clone(), metrics.clone()));
    let api_server = start_api_server(query, &config.http_addr)?;
    let api_handle = api_server.handle();
    let mut api_task = tokio::spawn(api_server);

    // === 5. Ingestion ===
    let source = KafkaSource::connect(&config.kafka)?;
    let mut pipeline = IngestionPipeline::new(source, order_store, cache, metrics.clone());
    if config.dlq_enabled {
        pipeline = pipeline.with_dead_letters(Arc::new(PgDeadLetterSink::new(pool.clone())));
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut pipeline_task = tokio::spawn(pipeline.run(shutdown_rx));

    tracing::info!("✅ Order service is running (Ctrl+C to stop)");

    // === 6. Run until Ctrl+C or an unexpected exit ===
    let mut pipeline_done = None;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
        result = &mut pipeline_task => {
            tracing::error!("Ingestion pipeline exited unexpectedly");
            pipeline_done = Some(result);
        }
        result = &mut api_task => {
            tracing::error!(result = ?result, "API server exited unexpectedly");
        }
    }

    // === 7. Graceful shutdown ===
    let _ = shutdown_tx.send(true);
    api_handle.stop(true).await;

    let stats = match pipeline_done {
        Some(result) => result,
        None => pipeline_task.await,
    };
    match stats {
        Ok(stats) => tracing::info!(?stats, "Ingestion pipeline drained"),
        Err(e) => tracing::error!(error = %e, "Ingestion pipeline task failed"),
    }

    metrics_handle.stop(true).await;
    pool.close().await;

    tracing::info!("👋 Order service stopped");
    Ok(())
}
