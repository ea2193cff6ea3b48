//! Rate-limited track search client
//!
//! Every request flows through the same pipeline: rate limiter slot, bearer
//! token, dispatch, then the retry decision table. The token is captured
//! once per search, so a logout that races an in-flight search does not
//! abort it; the request completes (or fails) with the token it started
//! with.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use common::CatalogSettings;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::limiter::RateLimiter;
use crate::retry::{self, Disposition, LastFailure};
use crate::track::{SearchResponse, Track};

/// Catalog search endpoint.
pub const SEARCH_ENDPOINT: &str = "https://api.spotify.com/v1/search";

/// Page size used when the caller has no preference.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// The API caps search page size at 50.
pub const MAX_SEARCH_LIMIT: usize = 50;

/// Source of bearer tokens for catalog requests.
///
/// Implemented by the auth manager for production and by mocks in tests.
/// Returns `None` when no valid token can be produced.
pub trait TokenSource: Send + Sync {
    fn access_token<'a>(&'a self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
}

impl TokenSource for spotify_auth::AuthManager {
    fn access_token<'a>(&'a self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(self.get_access_token())
    }
}

/// Track search client.
pub struct SearchClient {
    http: reqwest::Client,
    limiter: RateLimiter,
    settings: CatalogSettings,
    tokens: Arc<dyn TokenSource>,
    endpoint: String,
}

impl SearchClient {
    pub fn new(settings: CatalogSettings, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| Error::Network(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            limiter: RateLimiter::new(settings.max_requests_per_second),
            settings,
            tokens,
            endpoint: SEARCH_ENDPOINT.into(),
        })
    }

    /// Point searches at an alternate endpoint (tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// `search_tracks` with the default page size.
    pub async fn search(&self, query: &str) -> Result<Vec<Track>> {
        self.search_tracks(query, DEFAULT_SEARCH_LIMIT).await
    }

    /// Search the catalog for tracks.
    ///
    /// An empty or whitespace-only query returns an empty result without
    /// touching the network. `limit` is clamped to the API maximum of 50.
    pub async fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let token = self
            .tokens
            .access_token()
            .await
            .ok_or(Error::Authentication)?;
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT).to_string();
        let default_delay = Duration::from_millis(self.settings.retry_delay_ms);

        let mut last_failure = None;
        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                debug!(attempt, query, "retrying search");
            }
            self.limiter.acquire().await;

            let result = self
                .http
                .get(&self.endpoint)
                .query(&[
                    ("q", query),
                    ("type", "track"),
                    ("market", self.settings.market.as_str()),
                    ("limit", limit.as_str()),
                ])
                .bearer_auth(&token)
                .send()
                .await;

            let wait = match result {
                Ok(response) if response.status().is_success() => {
                    return parse_tracks(response).await;
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retry_after = retry::parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    match retry::classify_response(status, &body, retry_after, default_delay) {
                        Disposition::Fatal(e) => return Err(e),
                        Disposition::Retry(wait) => {
                            warn!(status, "search request failed, will retry");
                            last_failure = Some(if status == 429 {
                                LastFailure::RateLimited
                            } else {
                                LastFailure::Server(status, retry::extract_message(&body))
                            });
                            wait
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "search request failed in transport, will retry");
                    last_failure = Some(LastFailure::Network(e.to_string()));
                    default_delay
                }
            };

            if attempt < self.settings.max_retries {
                tokio::time::sleep(wait).await;
            }
        }

        match last_failure {
            Some(failure) => Err(retry::exhausted(failure)),
            // The loop always records a failure before falling through
            None => Err(Error::ServiceUnavailable("retries exhausted".into())),
        }
    }
}

async fn parse_tracks(response: reqwest::Response) -> Result<Vec<Track>> {
    let payload: SearchResponse = response
        .json()
        .await
        .map_err(|e| Error::InvalidResponse(format!("invalid search payload: {e}")))?;
    let page = payload
        .tracks
        .ok_or_else(|| Error::InvalidResponse("search response missing tracks object".into()))?;
    Ok(page.items.into_iter().map(Track::from).collect())
}
