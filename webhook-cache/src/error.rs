//! Cache client error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),

    #[error("cache record for `{shop_id}` is not valid JSON: {reason}")]
    InvalidRecord { shop_id: String, reason: String },
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self::Connection(value.to_string())
    }
}
