//! The per-merchant latency record stored in the cache.

use serde::{Deserialize, Serialize};

/// One merchant's rolling response-time window.
///
/// Invariants (upheld by [`crate::maintainer::RollingAverageMaintainer`]):
/// `time_responses.len() <= limit`, `total_responses` is the sum of the
/// current window (within floating-point tolerance), and `avg_response`
/// reflects the current window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MerchantLatencyRecord {
    #[serde(default)]
    pub time_responses: Vec<f64>,
    #[serde(default)]
    pub total_responses: f64,
    #[serde(default)]
    pub avg_response: f64,
}

impl MerchantLatencyRecord {
    /// A fresh, empty record — used when a merchant is first onboarded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
