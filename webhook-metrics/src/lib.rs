//! OpenTelemetry metrics for the tiered webhook delivery worker.
//!
//! Pushes metrics via OTLP/HTTP to a collector, which can then expose them
//! for Prometheus to scrape.

mod config;
mod delivery;
mod error;
mod exporter;

pub use config::MetricsConfig;
pub use delivery::DeliveryMetrics;
pub use error::MetricsError;
use once_cell::sync::OnceCell;

static METRICS_INSTANCE: OnceCell<DeliveryMetrics> = OnceCell::new();

/// Initialise the metrics system. Must be called once at startup before any
/// metrics are recorded. A no-op if metrics are disabled in `config`.
///
/// # Errors
/// Returns [`MetricsError`] if the exporter cannot be built or this is
/// called more than once.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        tracing::info!("metrics collection is disabled");
        return Ok(());
    }

    let provider = exporter::init_otlp_exporter(&config.endpoint)?;
    opentelemetry::global::set_meter_provider(provider);

    let delivery = DeliveryMetrics::new()?;
    METRICS_INSTANCE
        .set(delivery)
        .map_err(|_| MetricsError::AlreadyInitialized)?;

    tracing::info!("metrics collection initialized");
    Ok(())
}

/// # Panics
/// Panics if [`init_metrics`] has not been called.
#[must_use]
pub fn metrics() -> &'static DeliveryMetrics {
    METRICS_INSTANCE
        .get()
        .expect("metrics not initialized, call init_metrics() first")
}

#[must_use]
pub fn is_enabled() -> bool {
    METRICS_INSTANCE.get().is_some()
}
