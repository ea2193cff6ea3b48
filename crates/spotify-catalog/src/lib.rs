//! Rate-limited Spotify catalog access
//!
//! Track search for the walk-up player, built around three pieces:
//! - `limiter::RateLimiter` — FIFO rolling-window request throttle
//! - `retry` — the decision table mapping failed responses to retry/fatal
//! - `client::SearchClient` — the search pipeline tying them together
//!
//! Tokens come from a `TokenSource` (the auth manager in production, a
//! `MockTokenSource` in tests and mock mode).

pub mod client;
pub mod error;
pub mod limiter;
pub mod mock;
pub mod retry;
pub mod track;

pub use client::{
    DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT, SEARCH_ENDPOINT, SearchClient, TokenSource,
};
pub use error::{Error, Result};
pub use limiter::RateLimiter;
pub use mock::{MockTokenSource, mock_search_results};
pub use track::Track;
