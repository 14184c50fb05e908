//! Broker error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to construct Kafka client: {0}")]
    ClientConfig(String),

    #[error("failed to subscribe to topic `{topic}`: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: rdkafka::error::KafkaError,
    },

    #[error("poll error: {0}")]
    Poll(#[from] rdkafka::error::KafkaError),
}
