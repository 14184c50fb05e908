//! Structured logging bootstrap.
//!
//! Initialises a global `tracing` subscriber once, at process startup.
//! `LOG_LEVEL` overrides the default filter; debug builds trace by
//! default, release builds log at info.

use tracing_subscriber::{
    filter::LevelFilter, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Install the global `tracing` subscriber. Call once from the binary
/// entrypoint.
pub fn init() {
    let default_level = if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var("LOG_LEVEL")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .compact()
                .with_filter(filter),
        )
        .init();
}
