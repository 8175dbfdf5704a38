// ============================================================================
// Ingestion - Stream to Store to Cache
// ============================================================================
//
// Structure:
// - pipeline     - sequential decode/validate/persist/cache/commit loop
// - kafka        - rdkafka-backed MessageSource with manual offset commits
// - dead_letter  - where poison messages are recorded before being skipped
//
// Delivery is at-least-once: an offset is committed only after the order it
// carries is durably stored, so redelivery plus upsert keeps the store
// consistent.
//
// ============================================================================

mod dead_letter;
mod kafka;
mod pipeline;

use async_trait::async_trait;
use std::fmt;

pub use dead_letter::{DeadLetter, DeadLetterSink, PgDeadLetterSink, PoisonReason};
pub use kafka::{KafkaSource, KafkaSourceConfig};
pub use pipeline::{IngestionPipeline, Outcome, PipelineStats};

/// Position of a message within its partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOffset {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl fmt::Display for StreamOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

/// One message read from the stream, detached from the transport.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
    pub offset: StreamOffset,
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

#[async_trait]
pub trait MessageSource: Send {
    /// Wait a bounded time for the next message; `None` when nothing arrived.
    async fn next_message(&mut self) -> Result<Option<StreamMessage>, StreamError>;

    /// Acknowledge `offset` and everything before it in the same partition.
    async fn commit(&mut self, offset: &StreamOffset) -> Result<(), StreamError>;
}
