//! Kafka-backed topic consumer, demotion producer, log emitter, and retry
//! arbiter for the tiered webhook delivery worker.

pub mod consumer;
pub mod error;
pub mod fakes;
pub mod producer;
pub mod retry;

pub use consumer::{BrokerConsumer, TopicConsumer};
pub use error::BrokerError;
pub use fakes::{InMemoryBrokerConsumer, InMemoryBrokerProducer};
pub use producer::{BrokerProducer, EventProducer, LogEmitter};
pub use retry::{ExponentialBackoff, RetryArbiter, RetryPolicy};
