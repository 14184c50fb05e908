//! Shared types, configuration, error taxonomy, and logging setup used
//! across the tiered webhook delivery worker crates.

pub mod batch;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod tier;

pub use batch::Batch;
pub use config::{TierConfiguration, WorkerSettings};
pub use error::CoreError;
pub use event::Event;
pub use tier::TierPolicy;
