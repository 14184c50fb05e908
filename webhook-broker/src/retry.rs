//! Retry policy and arbiter for same-tier redelivery.
//!
//! The policy's shape — bounded attempts, exponential backoff capped at a
//! maximum delay, jitter applied as a fraction of the computed delay — is
//! the same one the teacher uses for SMTP delivery retries, generalised
//! here from a "next attempt timestamp" to a "sleep before republish"
//! duration since the arbiter has no durable schedule to consult.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::producer::BrokerProducer;

/// A retry backoff strategy, decoupled from the arbiter so it can be
/// swapped or exercised in isolation.
pub trait RetryPolicy: Send + Sync {
    /// Whether another attempt should be scheduled given the number of
    /// attempts already made.
    fn should_retry(&self, attempt_count: u32) -> bool;

    /// How long to wait before the next attempt.
    fn next_delay(&self, attempt_count: u32) -> Duration;
}

/// Bounded-attempt exponential backoff with jitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExponentialBackoff {
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "defaults::base_delay_secs")]
    pub base_delay_secs: u64,
    #[serde(default = "defaults::max_delay_secs")]
    pub max_delay_secs: u64,
    #[serde(default = "defaults::jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_secs: defaults::base_delay_secs(),
            max_delay_secs: defaults::max_delay_secs(),
            jitter_factor: defaults::jitter_factor(),
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn should_retry(&self, attempt_count: u32) -> bool {
        attempt_count < self.max_attempts
    }

    fn next_delay(&self, attempt_count: u32) -> Duration {
        let exponent = attempt_count.min(62);
        let multiplier = 1u64 << exponent;
        let delay = self.base_delay_secs.saturating_mul(multiplier).min(self.max_delay_secs);

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let jittered = {
            let jitter_range = (delay as f64) * self.jitter_factor;
            let jitter: f64 = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            ((delay as f64) + jitter).max(0.0) as u64
        };

        Duration::from_secs(jittered)
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        5
    }

    pub const fn base_delay_secs() -> u64 {
        30
    }

    pub const fn max_delay_secs() -> u64 {
        3600
    }

    pub const fn jitter_factor() -> f64 {
        0.1
    }
}

/// Republishes an event to its originating topic after a backoff delay.
///
/// Attempt counts are tracked per `pkg_code` in-process — the distilled
/// contract hands the arbiter only a status and an event, so there is no
/// durable attempt counter to consult; this is process-local and resets
/// across restarts, which is acceptable since the policy only bounds how
/// hard one process retries before giving up.
pub struct RetryArbiter<Producer: BrokerProducer, P: RetryPolicy> {
    producer: Producer,
    topic: String,
    policy: P,
    attempts: dashmap::DashMap<String, u32>,
}

impl<Producer: BrokerProducer, P: RetryPolicy> RetryArbiter<Producer, P> {
    pub fn new(producer: Producer, topic: impl Into<String>, policy: P) -> Self {
        Self {
            producer,
            topic: topic.into(),
            policy,
            attempts: dashmap::DashMap::new(),
        }
    }

    /// Schedule a same-tier retry for `pkg_code`, sleeping the computed
    /// backoff before republishing. Does not block the caller's batch —
    /// spawn this onto its own task.
    pub async fn retry(&self, pkg_code: &str, payload: &[u8]) {
        let attempt_count = *self
            .attempts
            .entry(pkg_code.to_string())
            .and_modify(|count| *count += 1)
            .or_insert(0);

        if !self.policy.should_retry(attempt_count) {
            warn!(pkg_code, attempt_count, "retry attempts exhausted, dropping");
            return;
        }

        let delay = self.policy.next_delay(attempt_count);
        info!(pkg_code, attempt_count, delay_secs = delay.as_secs(), "scheduling retry");
        tokio::time::sleep(delay).await;

        self.producer.produce(&self.topic, pkg_code, payload).await;
    }
}
