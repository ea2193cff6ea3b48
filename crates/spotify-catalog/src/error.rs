//! Catalog client error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the catalog client.
///
/// Retryable conditions (429, 5xx, transport failures) are handled inside
/// the request loop; they only appear here once retries are exhausted.
#[derive(Error, Debug)]
pub enum Error {
    /// No usable access token was available at request time
    #[error("No valid access token available")]
    Authentication,

    /// The API rejected the bearer token (401)
    #[error("Spotify authentication expired. Please log in again.")]
    AuthenticationExpired,

    /// The API refused the request outright (403)
    #[error("Access forbidden, check your Premium subscription: {0}")]
    Forbidden(String),

    /// Still rate limited after exhausting retries
    #[error("rate limited by the catalog API")]
    RateLimited,

    /// Upstream kept failing with 5xx after exhausting retries
    #[error("catalog service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Transport-level failure after exhausting retries
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Non-retryable API error outside the table above
    #[error("catalog API error ({status}): {message}")]
    Api { status: u16, message: String },
}
