use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;

use super::{MessageSource, StreamError, StreamMessage, StreamOffset};

#[derive(Debug, Clone)]
pub struct KafkaSourceConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    pub auto_offset_reset: String,
    pub poll_timeout: Duration,
}

/// Consumer-group member reading one topic with manual commits.
pub struct KafkaSource {
    consumer: StreamConsumer,
    poll_timeout: Duration,
}

impl KafkaSource {
    pub fn connect(config: &KafkaSourceConfig) -> Result<Self, StreamError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false") // offsets are committed after persistence
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()?;

        consumer.subscribe(&[config.topic.as_str()])?;

        tracing::info!(
            brokers = %config.brokers,
            topic = %config.topic,
            consumer_group = %config.group_id,
            auto_offset_reset = %config.auto_offset_reset,
            manual_commit = true,
            "Subscribed to order topic"
        );

        Ok(Self {
            consumer,
            poll_timeout: config.poll_timeout,
        })
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn next_message(&mut self) -> Result<Option<StreamMessage>, StreamError> {
        let message = match tokio::time::timeout(self.poll_timeout, self.consumer.recv()).await {
            Ok(received) => received?,
            Err(_elapsed) => return Ok(None),
        };

        tracing::trace!(
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            "Received message"
        );

        Ok(Some(StreamMessage {
            key: message.key().map(<[u8]>::to_vec),
            payload: message.payload().map(<[u8]>::to_vec),
            offset: StreamOffset {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            },
        }))
    }

    async fn commit(&mut self, offset: &StreamOffset) -> Result<(), StreamError> {
        // Kafka stores the offset of the next message to read.
        let mut positions = TopicPartitionList::new();
        positions.add_partition_offset(&offset.topic, offset.partition, Offset::Offset(offset.offset + 1))?;

        self.consumer.commit(&positions, CommitMode::Async)?;

        tracing::trace!(offset = %offset, "Offset committed");
        Ok(())
    }
}
