use async_trait::async_trait;
use sqlx::PgPool;
use std::fmt;

use super::StreamMessage;
use crate::store::StoreError;

// ============================================================================
// Dead Letters
// ============================================================================
//
// Messages that can never be stored (undecodable, invalid, or refused by the
// database) are recorded here and then committed so they stop blocking the
// partition.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoisonReason {
    Decode,
    Validation,
    Rejected,
}

impl PoisonReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Decode => "decode_error",
            Self::Validation => "validation_error",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PoisonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message: StreamMessage,
    pub reason: PoisonReason,
    pub error: String,
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn record(&self, letter: &DeadLetter) -> Result<(), StoreError>;
}

/// Stores dead letters in the `dead_letter_messages` table.
pub struct PgDeadLetterSink {
    pool: PgPool,
}

impl PgDeadLetterSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterSink for PgDeadLetterSink {
    async fn record(&self, letter: &DeadLetter) -> Result<(), StoreError> {
        let message = &letter.message;
        let key = message.key.as_deref().map(|key| String::from_utf8_lossy(key).into_owned());

        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO dead_letter_messages (
                topic, partition, message_offset, message_key, payload, reason, error_message
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id",
        )
        .bind(&message.offset.topic)
        .bind(message.offset.partition)
        .bind(message.offset.offset)
        .bind(key)
        .bind(message.payload.as_deref())
        .bind(letter.reason.as_str())
        .bind(&letter.error)
        .fetch_one(&self.pool)
        .await?;

        tracing::warn!(
            dlq_id = id,
            offset = %message.offset,
            reason = %letter.reason,
            error = %letter.error,
            "💀 Message stored in dead letter table"
        );

        Ok(())
    }
}
