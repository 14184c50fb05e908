//! Delivery engine error taxonomy.
//!
//! A batch iteration logs and continues on any of these — the poll loop
//! itself never returns early for a single event's failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("broker error: {0}")]
    Broker(#[from] webhook_broker::BrokerError),

    #[error("cache error: {0}")]
    Cache(#[from] webhook_cache::CacheError),

    #[error("HTTP client construction failed: {0}")]
    ClientBuild(String),
}
