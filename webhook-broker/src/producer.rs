//! Demotion publisher and observability log emitter.
//!
//! Both are thin wrappers around a shared `rdkafka::producer::FutureProducer`
//! — the demotion path publishes an event verbatim to a lower tier topic,
//! the log emitter publishes best-effort notices to a well-known
//! observability topic. Neither is allowed to raise into the delivery
//! engine: failures are logged and swallowed, the same posture the
//! teacher's own best-effort publishers take.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rdkafka::{
    producer::{FutureProducer, FutureRecord},
    ClientConfig,
};
use tracing::{error, warn};

use crate::error::BrokerError;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

fn build_producer(bootstrap_servers: &str) -> Result<FutureProducer, BrokerError> {
    ClientConfig::new()
        .set("bootstrap.servers", bootstrap_servers)
        .set("message.timeout.ms", "5000")
        .create()
        .map_err(|e| BrokerError::ClientConfig(e.to_string()))
}

/// A sink that publishes keyed byte payloads to a topic, abstracted so the
/// demotion path, retry arbiter, and log emitter can all be driven by an
/// in-memory fake (see [`crate::fakes::InMemoryBrokerProducer`]) in tests
/// instead of a real broker.
#[async_trait]
pub trait BrokerProducer: Send + Sync {
    /// Publish `payload` to `topic`, keyed by `key`. Failures are logged and
    /// swallowed by implementations — a publish failure must never crash
    /// the engine or stall the batch.
    async fn produce(&self, topic: &str, key: &str, payload: &[u8]);
}

/// Publishes demoted events to the next-lower tier topic.
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    /// # Errors
    /// Returns [`BrokerError`] if the underlying Kafka client cannot be
    /// constructed.
    pub fn new(bootstrap_servers: &str) -> Result<Self, BrokerError> {
        Ok(Self {
            producer: build_producer(bootstrap_servers)?,
        })
    }
}

#[async_trait]
impl BrokerProducer for EventProducer {
    async fn produce(&self, topic: &str, key: &str, payload: &[u8]) {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        if let Err((err, _owned)) = self.producer.send(record, FLUSH_TIMEOUT).await {
            warn!(topic, key, error = %err, "failed to publish record");
        }
    }
}

/// Lets a shared handle to a producer (e.g. an `Arc<InMemoryBrokerProducer>`
/// a test keeps for inspection) be passed wherever an owned `BrokerProducer`
/// is expected.
#[async_trait]
impl<T: BrokerProducer + ?Sized> BrokerProducer for Arc<T> {
    async fn produce(&self, topic: &str, key: &str, payload: &[u8]) {
        (**self).produce(topic, key, payload).await;
    }
}

/// Publishes best-effort observability notices to a well-known topic,
/// generic over the producer so tests can substitute an in-memory fake.
pub struct LogEmitter<P: BrokerProducer> {
    producer: P,
    topic: String,
}

impl<P: BrokerProducer> LogEmitter<P> {
    pub fn new(producer: P, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }

    /// Emit `message` (already JSON-encoded) keyed by `pkg_code`. Never
    /// raises into the caller.
    pub async fn emit(&self, message: &serde_json::Value, pkg_code: &str) {
        let payload = match serde_json::to_vec(message) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "failed to encode log message");
                return;
            }
        };

        self.producer.produce(&self.topic, pkg_code, &payload).await;
    }
}

impl LogEmitter<EventProducer> {
    /// Construct a log emitter backed by a fresh Kafka producer client.
    ///
    /// # Errors
    /// Returns [`BrokerError`] if the underlying Kafka client cannot be
    /// constructed.
    pub fn from_bootstrap(bootstrap_servers: &str, topic: impl Into<String>) -> Result<Self, BrokerError> {
        Ok(Self::new(EventProducer::new(bootstrap_servers)?, topic))
    }
}
