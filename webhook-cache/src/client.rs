//! Cache client abstraction, plus a Redis-backed and an in-memory
//! implementation.
//!
//! The trait exists so the Rolling Average Maintainer (and its tests) can
//! be exercised against an in-memory fake without a live Redis instance,
//! the same separation the teacher draws between its `BackingStore` trait
//! and the spool's memory/file backends.

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;

use crate::{error::CacheError, record::MerchantLatencyRecord};

#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Read the latency record for `shop_id`, or `None` if no record
    /// exists yet.
    async fn get_record(&self, shop_id: &str) -> Result<Option<MerchantLatencyRecord>, CacheError>;

    /// Write the latency record for `shop_id`, replacing any existing
    /// value.
    async fn set_record(&self, shop_id: &str, record: &MerchantLatencyRecord) -> Result<(), CacheError>;

    /// Materialise an empty record for `shop_id` if one does not already
    /// exist. Called when a merchant is first onboarded, outside the
    /// delivery hot path — `observe` itself never creates a record.
    async fn ensure_record(&self, shop_id: &str) -> Result<(), CacheError> {
        if self.get_record(shop_id).await?.is_none() {
            self.set_record(shop_id, &MerchantLatencyRecord::new()).await?;
        }
        Ok(())
    }
}

/// Redis-backed cache client.
pub struct RedisCacheClient {
    connection: redis::aio::ConnectionManager,
}

impl RedisCacheClient {
    /// Connect to `redis_url` (e.g. `redis://host:port`).
    ///
    /// # Errors
    /// Returns [`CacheError`] if the client cannot be constructed or the
    /// initial connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let connection = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheClient for RedisCacheClient {
    async fn get_record(&self, shop_id: &str) -> Result<Option<MerchantLatencyRecord>, CacheError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(shop_id).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let record = serde_json::from_str(&raw).map_err(|e| CacheError::InvalidRecord {
            shop_id: shop_id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(record))
    }

    async fn set_record(&self, shop_id: &str, record: &MerchantLatencyRecord) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let raw = serde_json::to_string(record).map_err(|e| CacheError::InvalidRecord {
            shop_id: shop_id.to_string(),
            reason: e.to_string(),
        })?;
        let () = conn.set(shop_id, raw).await?;
        Ok(())
    }
}

/// In-memory cache client, used by tests and available for local/dev runs
/// without a Redis instance.
#[derive(Default)]
pub struct InMemoryCacheClient {
    records: DashMap<String, MerchantLatencyRecord>,
}

impl InMemoryCacheClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheClient for InMemoryCacheClient {
    async fn get_record(&self, shop_id: &str) -> Result<Option<MerchantLatencyRecord>, CacheError> {
        Ok(self.records.get(shop_id).map(|r| r.clone()))
    }

    async fn set_record(&self, shop_id: &str, record: &MerchantLatencyRecord) -> Result<(), CacheError> {
        self.records.insert(shop_id.to_string(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_record_reads_as_none() {
        let client = InMemoryCacheClient::new();
        assert_eq!(client.get_record("shop-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn ensure_record_is_idempotent() {
        let client = InMemoryCacheClient::new();
        client.ensure_record("shop-1").await.unwrap();
        client
            .set_record(
                "shop-1",
                &MerchantLatencyRecord {
                    time_responses: vec![1.0],
                    total_responses: 1.0,
                    avg_response: 1.0,
                },
            )
            .await
            .unwrap();
        client.ensure_record("shop-1").await.unwrap();

        let record = client.get_record("shop-1").await.unwrap().unwrap();
        assert_eq!(record.time_responses, vec![1.0]);
    }
}
