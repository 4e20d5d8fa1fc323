//! Record publishing
//!
//! [`KafkaPublisher`] produces framed records with an rdkafka
//! [`FutureProducer`] and waits for each delivery report. There is no retry
//! beyond what the producer does internally; a failed delivery is returned to
//! the caller, which decides what to do with it.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use tracing::{debug, info, instrument};

use crate::config::KafkaConfig;
use crate::error::{IngestError, Result};

/// Sink for encoded records
#[async_trait]
pub trait RecordPublisher: Send + Sync {
    /// Publish `value` to `topic`. An empty `key` publishes without a key.
    async fn publish(&self, topic: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Wait for outstanding deliveries.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct KafkaPublisher {
    producer: FutureProducer,
    delivery_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .create()
            .map_err(|e| IngestError::Config(format!("Kafka producer: {e}")))?;

        info!(brokers = %config.brokers, "Kafka producer created");

        Ok(Self {
            producer,
            delivery_timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }
}

#[async_trait]
impl RecordPublisher for KafkaPublisher {
    #[instrument(skip(self, value), fields(bytes = value.len()))]
    async fn publish(&self, topic: &str, key: &str, value: &[u8]) -> Result<()> {
        let mut record = FutureRecord::<str, [u8]>::to(topic).payload(value);
        if !key.is_empty() {
            record = record.key(key);
        }

        let (partition, offset) = self
            .producer
            .send(record, self.delivery_timeout)
            .await
            .map_err(|(err, _)| IngestError::Publish {
                topic: topic.to_string(),
                message: err.to_string(),
            })?;

        debug!(partition, offset, "Record delivered");
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let producer = self.producer.clone();
        let timeout = self.delivery_timeout;

        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| IngestError::Publish {
                topic: "*".to_string(),
                message: format!("flush task failed: {e}"),
            })?
            .map_err(|e| IngestError::Publish {
                topic: "*".to_string(),
                message: e.to_string(),
            })
    }
}
