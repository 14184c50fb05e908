//! Rolling Average Maintainer.
//!
//! Keeps a bounded rolling window of per-merchant response times and the
//! running average over that window. Reads-modifies-writes a single
//! merchant record per `observe` call, so concurrent observations for the
//! same `shop_id` are serialised through a per-key lock — the same
//! per-key-mutex shape the teacher uses in its circuit breaker, applied
//! here to the cache record instead of a breaker state machine.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use webhook_tracing::traced;

use crate::{client::CacheClient, error::CacheError};

pub struct RollingAverageMaintainer<C: CacheClient> {
    client: Arc<C>,
    limit: usize,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<C: CacheClient> RollingAverageMaintainer<C> {
    #[must_use]
    pub fn new(client: Arc<C>, limit: usize) -> Self {
        Self {
            client,
            limit,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, shop_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(shop_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Record one response-time observation (seconds) for `shop_id`.
    ///
    /// A no-op if no record exists yet for the merchant — `observe` never
    /// creates a record; onboarding does that via
    /// [`CacheClient::ensure_record`].
    ///
    /// # Errors
    /// Returns [`CacheError`] if the cache read or write fails.
    #[traced(instrument(level = tracing::Level::DEBUG, skip(self), fields(shop_id = %shop_id)), timing(precision = "us"))]
    pub async fn observe(&self, shop_id: &str, response_time: f64) -> Result<(), CacheError> {
        let lock = self.lock_for(shop_id);
        let _guard = lock.lock().await;

        let Some(mut record) = self.client.get_record(shop_id).await? else {
            return Ok(());
        };

        let response_time = (response_time * 100.0).round() / 100.0;

        if record.time_responses.len() < self.limit {
            record.time_responses.push(response_time);
            record.total_responses += response_time;
        } else {
            let evicted = record.time_responses.remove(0);
            record.time_responses.push(response_time);
            record.total_responses = record.total_responses - evicted + response_time;
        }

        record.avg_response = record.total_responses / record.time_responses.len() as f64;

        self.client.set_record(shop_id, &record).await
    }
}
