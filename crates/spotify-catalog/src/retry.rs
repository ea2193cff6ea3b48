//! Retry decision table for catalog API responses
//!
//! One dispatch function maps a failed response to either a retry (with the
//! wait to apply) or a fatal error. Keeping the table pure lets it be tested
//! exhaustively without a transport in the loop.
//!
//! - 401 → fatal: the bearer token is no longer accepted, re-login required
//! - 403 → fatal: the account may not perform this request
//! - 429 → retry, honoring `Retry-After` when present
//! - 5xx → retry after the configured delay
//! - other 4xx → fatal, carrying the server's message
//!
//! Transport failures never reach this table; the client retries them with
//! the configured delay directly.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::Error;

/// Outcome of classifying one failed response.
#[derive(Debug)]
pub enum Disposition {
    /// Try again after waiting this long
    Retry(Duration),
    /// Give up and surface this error
    Fatal(Error),
}

/// The most recent retryable failure, kept so exhausted retries can surface
/// an error matching what actually went wrong.
#[derive(Debug, Clone)]
pub enum LastFailure {
    RateLimited,
    Server(u16, String),
    Network(String),
}

/// Classify a non-success response status.
pub fn classify_response(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
    default_delay: Duration,
) -> Disposition {
    match status {
        401 => Disposition::Fatal(Error::AuthenticationExpired),
        403 => Disposition::Fatal(Error::Forbidden(extract_message(body))),
        429 => Disposition::Retry(retry_after.unwrap_or(default_delay)),
        500..=599 => Disposition::Retry(default_delay),
        _ => Disposition::Fatal(Error::Api {
            status,
            message: extract_message(body),
        }),
    }
}

/// Map the last retryable failure to the error surfaced after retries run out.
pub fn exhausted(last: LastFailure) -> Error {
    match last {
        LastFailure::RateLimited => Error::RateLimited,
        LastFailure::Server(status, message) => {
            Error::ServiceUnavailable(format!("{status}: {message}"))
        }
        LastFailure::Network(message) => Error::Network(message),
    }
}

/// Parse a `Retry-After` header. Spotify sends integer seconds; anything
/// else (HTTP-date form, garbage) reads as absent.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Pull the human-readable message out of an API error body.
///
/// Error bodies look like `{"error":{"status":404,"message":"..."}}`; fall
/// back to the raw body when the shape differs.
pub fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(str::to_owned)
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "<no body>".into()
            } else {
                trimmed.to_owned()
            }
        })
}
