//! Topic consumer wrapper around `rdkafka`'s `StreamConsumer`.
//!
//! Collects up to `limit` records within `timeout`, the poll/batch shape
//! the delivery engine drives on every iteration.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    consumer::{Consumer, StreamConsumer},
    ClientConfig, Message,
};
use tokio::time::Instant;
use webhook_tracing::traced;

use crate::error::BrokerError;

/// A source of polled record batches, abstracted so the delivery engine can
/// be driven by an in-memory fake (see [`crate::fakes::InMemoryBrokerConsumer`])
/// in tests instead of a real broker.
#[async_trait]
pub trait BrokerConsumer: Send + Sync {
    /// Poll for up to `limit` records, waiting at most `timeout` total.
    /// Returns fewer than `limit` records if the timeout elapses first,
    /// and an empty vector if nothing arrived at all.
    ///
    /// # Errors
    /// Returns [`BrokerError`] if the underlying poll reports a non-timeout
    /// error.
    async fn poll_batch(&self, timeout: Duration, limit: usize) -> Result<Vec<Vec<u8>>, BrokerError>;
}

pub struct TopicConsumer {
    consumer: StreamConsumer,
}

impl TopicConsumer {
    /// Construct a consumer for `topic` under consumer group `group`, with
    /// offset reset = latest and auto-commit enabled.
    ///
    /// # Errors
    /// Returns [`BrokerError`] if the client cannot be constructed or the
    /// subscription fails.
    pub fn new(bootstrap_servers: &str, group: &str, topic: &str) -> Result<Self, BrokerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("group.id", group)
            .set("auto.offset.reset", "latest")
            .set("enable.auto.commit", "true")
            .create()
            .map_err(|e| BrokerError::ClientConfig(e.to_string()))?;

        consumer
            .subscribe(&[topic])
            .map_err(|source| BrokerError::Subscribe {
                topic: topic.to_string(),
                source,
            })?;

        Ok(Self { consumer })
    }
}

#[async_trait]
impl BrokerConsumer for TopicConsumer {
    #[traced(timing(precision = "ms"))]
    async fn poll_batch(&self, timeout: Duration, limit: usize) -> Result<Vec<Vec<u8>>, BrokerError> {
        let deadline = Instant::now() + timeout;
        let mut records = Vec::with_capacity(limit);

        while records.len() < limit {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match tokio::time::timeout(remaining, self.consumer.recv()).await {
                Ok(Ok(message)) => {
                    if let Some(payload) = message.payload() {
                        records.push(payload.to_vec());
                    }
                }
                Ok(Err(e)) => return Err(BrokerError::Poll(e)),
                Err(_elapsed) => break,
            }
        }

        Ok(records)
    }
}
