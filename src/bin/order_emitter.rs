use order_service::config::EmitterConfig;
use order_service::messaging::{synthetic_order, OrderPublisher};
use order_service::telemetry::{init_tracing, DEFAULT_LOG_FILTER};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(DEFAULT_LOG_FILTER);

    let config = EmitterConfig::from_env()?;
    let publisher = OrderPublisher::new(&config.brokers, &config.topic)?;

    tracing::info!(
        brokers = %config.brokers,
        topic = %publisher.topic(),
        interval_ms = config.interval.as_millis(),
        "🚀 Order emitter started"
    );

    let mut ticker = tokio::time::interval(config.interval);
    let mut sequence: u64 = 0;
    let mut failures: u64 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let order = synthetic_order(sequence, &mut rand::thread_rng());
                sequence += 1;

                // Failures are logged by the publisher; keep emitting.
                if publisher.publish(&order).await.is_err() {
                    failures += 1;
                }
            }
        }
    }

    tracing::info!(sent = sequence - failures, failed = failures, "🛑 Order emitter stopped");
    Ok(())
}
