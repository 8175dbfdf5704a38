use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;

use crate::domain::order::Order;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to encode order: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
}

/// Publishes orders as JSON, keyed by `order_uid` so every version of one
/// order lands in the same partition.
pub struct OrderPublisher {
    producer: FutureProducer,
    topic: String,
}

impl OrderPublisher {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, PublishError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Resolves once the broker acknowledged the record (`acks=all`).
    pub async fn publish(&self, order: &Order) -> Result<(), PublishError> {
        let key = order.id().to_string();
        let payload = serde_json::to_vec(order)?;

        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        self.producer
            .send(record, Timeout::After(SEND_TIMEOUT))
            .await
            .map_err(|(e, _)| {
                tracing::error!(error = %e, topic = %self.topic, order_id = %key, "Failed to publish order");
                e
            })?;

        tracing::info!(
            topic = %self.topic,
            order_id = %key,
            "Published order"
        );

        Ok(())
    }
}
