//! Per-event HTTP outcome classification.

use std::{collections::HashSet, time::Duration};

use webhook_common::Event;

/// The classified result of one webhook dispatch attempt.
#[derive(Debug)]
pub enum Outcome {
    /// A response was received with a status outside the retryable set —
    /// treated as delivered for rolling-average and tier-residence
    /// purposes.
    Delivered { response_time: Duration },

    /// A response was received with a status inside the retryable set —
    /// delivered for rolling-average purposes, but also handed to the
    /// Retry Arbiter.
    Retryable { status: u16, response_time: Duration },

    /// No response was obtained (transport error, timeout) — the event is
    /// demoted, never counted toward the rolling average.
    Failed,
}

/// Dispatch one event's webhook POST and classify the outcome.
///
/// `base_url` is prepended to `event.webhook_url`; `status_allow` is the
/// retryable HTTP status set; `tls_verify` controls whether the client
/// validates the server's certificate (see Design Notes: defaults to
/// verification disabled to match observed behaviour, overridable per
/// `WEBHOOK_TLS_VERIFY`).
pub async fn dispatch(
    client: &reqwest::Client,
    base_url: &str,
    event: &Event,
    status_allow: &HashSet<u16>,
    request_timeout: Duration,
) -> Outcome {
    let url = format!("{base_url}{}", event.webhook_url);
    let body = event.webhook_body();

    let started = std::time::Instant::now();
    let result = client
        .post(&url)
        .json(&body)
        .timeout(request_timeout)
        .send()
        .await;
    let response_time = started.elapsed();

    match result {
        Ok(response) => {
            let status = response.status().as_u16();
            if status_allow.contains(&status) {
                Outcome::Retryable { status, response_time }
            } else {
                Outcome::Delivered { response_time }
            }
        }
        Err(_) => Outcome::Failed,
    }
}

/// Build the `reqwest::Client` the engine dispatches through, honouring
/// the TLS verification knob.
///
/// # Errors
/// Returns an error if the underlying TLS backend cannot be initialised.
pub fn build_client(tls_verify: bool) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(!tls_verify)
        .build()
}
