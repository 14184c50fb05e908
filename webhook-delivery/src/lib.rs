//! The delivery engine: poll, batch, fan out, classify, demote or retry.

pub mod engine;
pub mod error;
pub mod outcome;

pub use engine::DeliveryEngine;
pub use error::DeliveryError;
pub use outcome::Outcome;
