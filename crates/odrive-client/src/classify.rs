//! Response classification
//!
//! Turns an HTTP status code plus an optional error body into a typed
//! outcome the transfer layers act on: success, retryable failure, or fatal
//! failure. Retry policy itself lives in the upload session manager; this
//! module only decides which class a response belongs to.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use odrive_core::ApiError;

/// Graph-style error envelope: `{"error": {"code": ..., "message": ...}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Inner error object of the envelope
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Classification of a single chunk/request response.
#[derive(Debug)]
pub enum Outcome {
    /// 2xx response; the caller interprets the body.
    Success,
    /// A transient condition; the caller may retry after `suggested_delay`.
    Retryable {
        /// Human-readable cause, used for logging and the final error if
        /// the retry bound is exhausted
        reason: String,
        /// Server-suggested delay (from `Retry-After`), if any
        suggested_delay: Option<Duration>,
    },
    /// A permanent failure carried verbatim from the server (or a protocol
    /// violation when the server answered outside its documented contract).
    Fatal(ApiError),
}

/// Classifies a response by status code and raw body.
///
/// Policy:
/// - 2xx is success
/// - 5xx and 429 are retryable; 429 carries the `Retry-After` hint
/// - 416 is retryable: mid-upload it signals an offset mismatch that the
///   session manager resolves by re-querying the authoritative offset
/// - any other 4xx is fatal and surfaces the server's code/message verbatim
/// - an error status whose body is not the documented envelope is a
///   protocol violation, not a server-reported failure
pub fn classify(status: u16, body: &[u8], retry_after: Option<Duration>) -> Outcome {
    match status {
        200..=299 => Outcome::Success,
        429 => Outcome::Retryable {
            reason: "throttled (429 Too Many Requests)".to_string(),
            suggested_delay: retry_after,
        },
        500..=599 => Outcome::Retryable {
            reason: format!(
                "server error {}: {}",
                status,
                envelope_message(body).unwrap_or_else(|| "no detail".to_string())
            ),
            suggested_delay: retry_after,
        },
        416 => Outcome::Retryable {
            reason: "range not satisfiable; offset must be resynchronized".to_string(),
            suggested_delay: None,
        },
        400..=499 => match parse_envelope(body) {
            Some(envelope) => Outcome::Fatal(ApiError::Client {
                status,
                code: envelope.error.code,
                message: envelope.error.message,
            }),
            None => {
                warn!(status, "error response without a parsable error envelope");
                Outcome::Fatal(ApiError::Protocol(format!(
                    "status {status} with unparsable error body"
                )))
            }
        },
        _ => Outcome::Fatal(ApiError::Protocol(format!(
            "unexpected status code {status}"
        ))),
    }
}

/// Converts a transport failure directly into the error taxonomy.
pub fn transport_error(err: reqwest::Error, deadline: Duration) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(deadline)
    } else {
        ApiError::Network(err.to_string())
    }
}

fn parse_envelope(body: &[u8]) -> Option<ErrorEnvelope> {
    serde_json::from_slice(body).ok()
}

fn envelope_message(body: &[u8]) -> Option<String> {
    parse_envelope(body).map(|e| e.error.message)
}

/// The error a retryable outcome degrades to once the retry bound is hit.
///
/// Throttling (429) and 5xx keep their status so the final error names the
/// actual server condition; transport-level retryables (no HTTP status)
/// degrade to a network error.
pub fn retryable_to_error(status: u16, reason: &str) -> ApiError {
    match status {
        429 | 500..=599 => ApiError::Server {
            status,
            message: reason.to_string(),
        },
        _ => ApiError::Network(reason.to_string()),
    }
}
