//! Typed error handling shared across the delivery worker.
//!
//! Nothing here is fatal to the running worker (see the delivery crate's
//! error handling design): these types exist so logging and tests can
//! distinguish causes, not so the engine can abort.

use thiserror::Error;

/// Failure to decode a source topic record into an [`crate::Event`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum EventParseError {
    #[error("record is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("record is not a well-formed event: {0}")]
    Malformed(String),

    #[error("required field `{0}` is missing or empty")]
    MissingField(&'static str),
}

/// Umbrella error for the shared crate's own fallible operations
/// (currently just configuration loading).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("missing required environment variable `{0}`")]
    MissingEnv(&'static str),

    #[error("invalid value for environment variable `{name}`: {reason}")]
    InvalidEnv { name: &'static str, reason: String },
}
