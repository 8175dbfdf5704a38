use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "info,order_service=debug";

/// Install the global subscriber.
///
/// Structured logging with environment-based filtering: `RUST_LOG` wins when
/// set (e.g. `RUST_LOG=debug`), otherwise `default_filter` applies.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();
}
