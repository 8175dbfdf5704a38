use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

// ============================================================================
// Exponential Backoff Retry Strategy
// ============================================================================
//
// Retries an operation while its error is transient. There is no attempt
// limit: the loop ends on success, on a permanent error, or when shutdown is
// signalled while waiting between attempts. An attempt that is already running
// is never interrupted.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let max_millis = self.max_delay.as_millis() as f64;

        Duration::from_millis(millis.min(max_millis) as u64)
    }
}

/// Result of a retry operation
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded
    Success(T),
    /// Operation failed with an error that retrying cannot fix
    PermanentFailure(E),
    /// Shutdown was requested while waiting to retry; carries the last error
    Cancelled(E),
}

/// Check if an error is transient (should retry) or permanent (should not retry)
pub trait IsTransient {
    fn is_transient(&self) -> bool;
}

/// Retry with transient error checking until success, permanent failure or shutdown.
pub async fn retry_on_transient<F, Fut, T, E>(
    config: &RetryConfig,
    shutdown: &mut watch::Receiver<bool>,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsTransient,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt = attempt, "Operation succeeded after retry");
                }
                return RetryResult::Success(result);
            }
            Err(error) => error,
        };

        if !error.is_transient() {
            tracing::error!(error = %error, "Permanent failure detected, not retrying");
            return RetryResult::PermanentFailure(error);
        }

        if *shutdown.borrow() {
            return RetryResult::Cancelled(error);
        }

        let delay = config.delay_after(attempt);
        tracing::warn!(
            attempt = attempt,
            error = %error,
            delay_ms = delay.as_millis(),
            "Transient failure, retrying after delay"
        );

        tokio::select! {
            _ = sleep(delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::warn!(attempt = attempt, "Shutdown requested, abandoning retry");
                    return RetryResult::Cancelled(error);
                }
            }
        }
    }
}
