//! The package-status event decoded from a source topic record.

use serde::{Deserialize, Serialize};

use crate::error::EventParseError;

/// A package-status event read from a tier topic.
///
/// Invariant: `pkg_code`, `shop_id`, and `webhook_url` are non-empty.
/// `package_status_id` is forwarded opaquely and is never interpreted by
/// the worker, so it is kept as a raw JSON value to accept either the
/// integer or string form the wire format allows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub pkg_code: String,
    pub shop_id: String,
    pub package_status_id: serde_json::Value,
    pub webhook_url: String,
}

impl Event {
    /// Decode and validate an `Event` from a raw UTF-8 JSON topic message
    /// value.
    ///
    /// # Errors
    /// Returns [`EventParseError`] if the bytes are not valid UTF-8, not
    /// valid JSON, or missing/blank one of the required string fields.
    pub fn decode(raw: &[u8]) -> Result<Self, EventParseError> {
        let text = std::str::from_utf8(raw).map_err(|e| EventParseError::Encoding(e.to_string()))?;
        let event: Self =
            serde_json::from_str(text).map_err(|e| EventParseError::Malformed(e.to_string()))?;
        event.validate()?;
        Ok(event)
    }

    fn validate(&self) -> Result<(), EventParseError> {
        if self.pkg_code.trim().is_empty() {
            return Err(EventParseError::MissingField("pkg_code"));
        }
        if self.shop_id.trim().is_empty() {
            return Err(EventParseError::MissingField("shop_id"));
        }
        if self.webhook_url.trim().is_empty() {
            return Err(EventParseError::MissingField("webhook_url"));
        }
        if self.package_status_id.is_null() {
            return Err(EventParseError::MissingField("package_status_id"));
        }
        Ok(())
    }

    /// Re-serialise the event to bytes, used verbatim for tier demotion.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        // Events always round-trip through serde_json; this can only fail
        // on non-finite floats, which never appear in this struct.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// The JSON body posted to the merchant's webhook endpoint.
    #[must_use]
    pub fn webhook_body(&self) -> serde_json::Value {
        serde_json::json!({
            "pkg_code": self.pkg_code,
            "package_status_id": self.package_status_id,
        })
    }
}
