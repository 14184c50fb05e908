//! Webhook delivery metrics.
//!
//! Tracks batch flushes, per-event HTTP outcomes by classification, and the
//! duration distributions the delivery engine produces.

use opentelemetry::{
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

use crate::MetricsError;

/// Delivery metrics collector.
#[derive(Debug)]
pub struct DeliveryMetrics {
    /// Total HTTP outcomes by classification and tier.
    outcomes_total: Counter<u64>,

    /// Distribution of per-event response times, labelled by tier.
    response_time_seconds: Histogram<f64>,

    /// Distribution of batch wall-clock processing times, labelled by tier.
    batch_duration_seconds: Histogram<f64>,

    /// Total events demoted to a lower tier.
    demotions_total: Counter<u64>,

    /// Total events dropped (no lower tier to demote to, or unparseable).
    drops_total: Counter<u64>,

    /// Total same-tier retries scheduled.
    retries_total: Counter<u64>,
}

impl DeliveryMetrics {
    /// # Errors
    /// Returns [`MetricsError`] if metric instruments cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let meter = meter();

        let outcomes_total = meter
            .u64_counter("webhook.delivery.outcomes.total")
            .with_description("Total HTTP outcomes by classification")
            .build();

        let response_time_seconds = meter
            .f64_histogram("webhook.delivery.response_time.seconds")
            .with_description("Distribution of per-event webhook response times")
            .build();

        let batch_duration_seconds = meter
            .f64_histogram("webhook.delivery.batch_duration.seconds")
            .with_description("Distribution of batch processing wall-clock durations")
            .build();

        let demotions_total = meter
            .u64_counter("webhook.delivery.demotions.total")
            .with_description("Total events demoted to a lower tier")
            .build();

        let drops_total = meter
            .u64_counter("webhook.delivery.drops.total")
            .with_description("Total events dropped without delivery")
            .build();

        let retries_total = meter
            .u64_counter("webhook.delivery.retries.total")
            .with_description("Total same-tier retries scheduled")
            .build();

        Ok(Self {
            outcomes_total,
            response_time_seconds,
            batch_duration_seconds,
            demotions_total,
            drops_total,
            retries_total,
        })
    }

    /// Record a classified HTTP outcome (`success`, `retryable`, `demoted`,
    /// `dropped`, or `parse_error`) for `tier`.
    pub fn record_outcome(&self, tier: &str, classification: &str) {
        let attributes = [
            KeyValue::new("tier", tier.to_string()),
            KeyValue::new("classification", classification.to_string()),
        ];
        self.outcomes_total.add(1, &attributes);
    }

    pub fn record_response_time(&self, tier: &str, seconds: f64) {
        self.response_time_seconds
            .record(seconds, &[KeyValue::new("tier", tier.to_string())]);
    }

    pub fn record_batch_duration(&self, tier: &str, seconds: f64) {
        self.batch_duration_seconds
            .record(seconds, &[KeyValue::new("tier", tier.to_string())]);
    }

    pub fn record_demotion(&self, from_tier: &str) {
        self.demotions_total
            .add(1, &[KeyValue::new("tier", from_tier.to_string())]);
    }

    pub fn record_drop(&self, tier: &str, reason: &str) {
        self.drops_total.add(
            1,
            &[
                KeyValue::new("tier", tier.to_string()),
                KeyValue::new("reason", reason.to_string()),
            ],
        );
    }

    pub fn record_retry(&self, tier: &str) {
        self.retries_total
            .add(1, &[KeyValue::new("tier", tier.to_string())]);
    }
}

fn meter() -> Meter {
    opentelemetry::global::meter("webhook.delivery")
}
