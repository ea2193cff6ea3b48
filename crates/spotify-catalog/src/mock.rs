//! Mock implementations for local development and tests
//!
//! Enabled by the `use_mock` config flag: the app runs the full search flow
//! against canned data with no client id and no network.

use std::future::Future;
use std::pin::Pin;

use crate::client::TokenSource;
use crate::track::Track;

/// Token source returning a fixed token, or none at all.
pub struct MockTokenSource {
    token: Option<String>,
}

impl MockTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// A source that never produces a token.
    pub fn unauthenticated() -> Self {
        Self { token: None }
    }
}

impl TokenSource for MockTokenSource {
    fn access_token<'a>(&'a self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move { self.token.clone() })
    }
}

/// Canned walk-up catalog: (name, artists, album, duration ms).
const MOCK_CATALOG: &[(&str, &str, &str, u64)] = &[
    ("Enter Sandman", "Metallica", "Metallica", 331266),
    ("Crazy Train", "Ozzy Osbourne", "Blizzard of Ozz", 295987),
    ("Thunderstruck", "AC/DC", "The Razors Edge", 292880),
    ("Welcome to the Jungle", "Guns N' Roses", "Appetite for Destruction", 273893),
    ("All I Do Is Win", "DJ Khaled", "Victory", 232746),
    ("Seven Nation Army", "The White Stripes", "Elephant", 231733),
    ("Centerfield", "John Fogerty", "Centerfield", 225227),
    ("The Boys Are Back in Town", "Thin Lizzy", "Jailbreak", 270040),
];

/// Case-insensitive substring search over the canned catalog.
///
/// Matches track name or artist, preserving catalog order, truncated to
/// `limit`. An empty query returns nothing, mirroring the real client.
pub fn mock_search_results(query: &str, limit: usize) -> Vec<Track> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    MOCK_CATALOG
        .iter()
        .enumerate()
        .filter(|(_, (name, artists, _, _))| {
            name.to_lowercase().contains(&needle) || artists.to_lowercase().contains(&needle)
        })
        .take(limit)
        .map(|(i, (name, artists, album, duration_ms))| Track {
            id: format!("mock{i:03}"),
            name: (*name).into(),
            artists: (*artists).into(),
            album: (*album).into(),
            album_art_url: String::new(),
            preview_url: String::new(),
            uri: format!("spotify:track:mock{i:03}"),
            duration_ms: *duration_ms,
        })
        .collect()
}
