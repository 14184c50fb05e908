//! In-memory fakes of [`BrokerConsumer`]/[`BrokerProducer`], for
//! engine-level tests that exercise the poll/flush/dispatch loop without a
//! real broker — the same trait-for-mockability shape as
//! [`crate::retry::RetryPolicy`] and `webhook_cache`'s `InMemoryCacheClient`.

use std::{collections::VecDeque, sync::Mutex, time::Duration};

use async_trait::async_trait;

use crate::{consumer::BrokerConsumer, error::BrokerError, producer::BrokerProducer};

/// Replays a fixed sequence of poll results, one batch per call; once the
/// sequence is exhausted, every further poll returns an empty batch.
pub struct InMemoryBrokerConsumer {
    batches: Mutex<VecDeque<Vec<Vec<u8>>>>,
}

impl InMemoryBrokerConsumer {
    #[must_use]
    pub fn new(batches: Vec<Vec<Vec<u8>>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
        }
    }
}

#[async_trait]
impl BrokerConsumer for InMemoryBrokerConsumer {
    async fn poll_batch(&self, _timeout: Duration, _limit: usize) -> Result<Vec<Vec<u8>>, BrokerError> {
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// Records every `produce` call instead of publishing to a real topic.
#[derive(Default)]
pub struct InMemoryBrokerProducer {
    published: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl InMemoryBrokerProducer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every `(topic, key, payload)` published so far, in call
    /// order.
    #[must_use]
    pub fn published(&self) -> Vec<(String, String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerProducer for InMemoryBrokerProducer {
    async fn produce(&self, topic: &str, key: &str, payload: &[u8]) {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), key.to_string(), payload.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consumer_replays_batches_then_goes_empty() {
        let consumer = InMemoryBrokerConsumer::new(vec![vec![b"a".to_vec()], vec![]]);

        assert_eq!(
            consumer.poll_batch(Duration::from_millis(1), 10).await.unwrap(),
            vec![b"a".to_vec()]
        );
        assert!(consumer.poll_batch(Duration::from_millis(1), 10).await.unwrap().is_empty());
        assert!(consumer.poll_batch(Duration::from_millis(1), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn producer_records_publishes_in_order() {
        let producer = InMemoryBrokerProducer::new();

        producer.produce("silver_topic", "pkg-1", b"payload").await;

        assert_eq!(
            producer.published(),
            vec![("silver_topic".to_string(), "pkg-1".to_string(), b"payload".to_vec())]
        );
    }
}
