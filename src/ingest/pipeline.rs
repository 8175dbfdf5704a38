use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use super::dead_letter::{DeadLetter, DeadLetterSink, PoisonReason};
use super::{MessageSource, StreamMessage, StreamOffset};
use crate::cache::LookupCache;
use crate::domain::order::{Order, OrderId};
use crate::metrics::Metrics;
use crate::store::OrderStore;
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

// ============================================================================
// Ingestion Pipeline
// ============================================================================
//
// Handles one message at a time, in stream order:
//
//   decode → validate → save (atomic upsert) → cache set → commit offset
//
// - Undecodable/invalid messages, and orders the database refuses, are
//   poison: dead-lettered, then committed.
// - Transient save failures are retried on the same message. The pipeline
//   never moves past an uncommitted offset, since committing a later offset
//   would implicitly acknowledge the failed one.
// - Cache failures are logged and never hold back the commit.
//
// ============================================================================

const READ_ERROR_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Persisted(OrderId),
    Poisoned(PoisonReason),
    /// Shutdown arrived while the save kept failing; the offset is left uncommitted.
    Abandoned,
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Persisted(_) => "persisted",
            Outcome::Poisoned(reason) => reason.as_str(),
            Outcome::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    pub persisted: u64,
    pub poisoned: u64,
    pub abandoned: u64,
}

impl PipelineStats {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Persisted(_) => self.persisted += 1,
            Outcome::Poisoned(_) => self.poisoned += 1,
            Outcome::Abandoned => self.abandoned += 1,
        }
    }
}

struct Poison {
    reason: PoisonReason,
    error: String,
}

fn decode(message: &StreamMessage) -> Result<Order, Poison> {
    let payload = message.payload.as_deref().ok_or_else(|| Poison {
        reason: PoisonReason::Decode,
        error: "message has no payload".to_string(),
    })?;

    let order: Order = serde_json::from_slice(payload).map_err(|e| Poison {
        reason: PoisonReason::Decode,
        error: e.to_string(),
    })?;

    order.validate().map_err(|e| Poison {
        reason: PoisonReason::Validation,
        error: e.to_string(),
    })?;

    Ok(order)
}

pub struct IngestionPipeline<S> {
    source: S,
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn LookupCache>,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl<S: MessageSource> IngestionPipeline<S> {
    pub fn new(source: S, store: Arc<dyn OrderStore>, cache: Arc<dyn LookupCache>, metrics: Arc<Metrics>) -> Self {
        Self {
            source,
            store,
            cache,
            dead_letters: None,
            metrics,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = Some(sink);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Consume until shutdown is signalled (or the signal sender is dropped).
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PipelineStats {
        let mut stats = PipelineStats::default();
        tracing::info!("🔄 Ingestion pipeline started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                next = self.source.next_message() => next,
            };

            let message = match next {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    self.metrics.stream_read_errors.inc();
                    tracing::warn!(error = %e, "Stream read failed");
                    tokio::time::sleep(READ_ERROR_BACKOFF).await;
                    continue;
                }
            };

            let outcome = self.handle(message, &mut shutdown).await;
            stats.record(&outcome);

            if outcome == Outcome::Abandoned {
                break;
            }
        }

        tracing::info!(
            persisted = stats.persisted,
            poisoned = stats.poisoned,
            abandoned = stats.abandoned,
            "🛑 Ingestion pipeline stopped"
        );
        stats
    }

    /// Process a single message through to its offset commit (or not).
    pub async fn handle(&mut self, message: StreamMessage, shutdown: &mut watch::Receiver<bool>) -> Outcome {
        let started = Instant::now();

        let outcome = match decode(&message) {
            Ok(order) => self.persist(message, order, shutdown).await,
            Err(poison) => self.skip(message, poison).await,
        };

        self.metrics.record_message(outcome.label(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn persist(&mut self, message: StreamMessage, order: Order, shutdown: &mut watch::Receiver<bool>) -> Outcome {
        let order = Arc::new(order);
        let id = order.id();
        let store = self.store.clone();
        let metrics = self.metrics.clone();

        let saved = retry_on_transient(&self.retry, shutdown, |attempt| {
            let store = store.clone();
            let order = order.clone();
            let metrics = metrics.clone();
            async move {
                if attempt > 1 {
                    metrics.persistence_retries.inc();
                }
                let result = store.save(&order).await;
                if result.is_err() {
                    metrics.record_store_error("save");
                }
                result
            }
        })
        .await;

        match saved {
            RetryResult::Success(()) => {}
            RetryResult::PermanentFailure(e) => {
                let poison = Poison {
                    reason: PoisonReason::Rejected,
                    error: e.to_string(),
                };
                return self.skip(message, poison).await;
            }
            RetryResult::Cancelled(e) => {
                tracing::warn!(
                    order_id = %id,
                    offset = %message.offset,
                    error = %e,
                    "Shutdown while persistence failing, offset left for redelivery"
                );
                return Outcome::Abandoned;
            }
        }

        match self.cache.set(id, order).await {
            Ok(()) => self.metrics.set_cache_entries(self.cache.len().await),
            Err(e) => {
                self.metrics.cache_update_failures.inc();
                tracing::warn!(order_id = %id, error = %e, "Cache update failed after save");
            }
        }

        self.commit(&message.offset).await;

        tracing::info!(order_id = %id, offset = %message.offset, "✅ Order ingested");
        Outcome::Persisted(id)
    }

    async fn skip(&mut self, message: StreamMessage, poison: Poison) -> Outcome {
        let reason = poison.reason;

        tracing::warn!(
            offset = %message.offset,
            reason = %reason,
            error = %poison.error,
            "Skipping poison message"
        );
        self.metrics.record_dead_letter(reason.as_str());

        let letter = DeadLetter {
            message,
            reason,
            error: poison.error,
        };

        if let Some(sink) = &self.dead_letters {
            if let Err(e) = sink.record(&letter).await {
                tracing::error!(
                    offset = %letter.message.offset,
                    error = %e,
                    "Failed to record dead letter, skipping anyway"
                );
            }
        }

        self.commit(&letter.message.offset).await;
        Outcome::Poisoned(reason)
    }

    async fn commit(&mut self, offset: &StreamOffset) {
        if let Err(e) = self.source.commit(offset).await {
            self.metrics.offset_commit_failures.inc();
            tracing::warn!(
                offset = %offset,
                error = %e,
                "Failed to commit offset (message may be redelivered)"
            );
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
