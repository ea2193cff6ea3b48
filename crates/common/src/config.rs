//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The Spotify client id may come from the SPOTIFY_CLIENT_ID env var so
//! deployments can keep it out of the checked-in TOML.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub auth: AuthSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
}

/// Spotify OAuth settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Public OAuth client id (not a secret, identifies the application)
    #[serde(default)]
    pub client_id: String,
    /// Redirect URI registered with the Spotify application
    pub redirect_uri: String,
    /// Tokens expiring within this window are refreshed before use
    #[serde(default = "default_refresh_buffer")]
    pub refresh_buffer_minutes: u64,
    /// Base path the application is served under
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Requested OAuth scopes, space-separated
    #[serde(default = "default_scopes")]
    pub scopes: String,
    /// Use the mock auth/catalog implementations for local development
    #[serde(default)]
    pub use_mock: bool,
}

/// Catalog client tuning
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    #[serde(default = "default_max_rps")]
    pub max_requests_per_second: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// ISO 3166-1 alpha-2 market sent with every search
    #[serde(default = "default_market")]
    pub market: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            max_requests_per_second: default_max_rps(),
            retry_delay_ms: default_retry_delay(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout(),
            market: default_market(),
        }
    }
}

fn default_refresh_buffer() -> u64 {
    5
}

fn default_base_path() -> String {
    "/".into()
}

fn default_scopes() -> String {
    "streaming user-read-email user-read-private".into()
}

fn default_max_rps() -> usize {
    5
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    15
}

fn default_market() -> String {
    "US".into()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client id resolution order:
    /// 1. SPOTIFY_CLIENT_ID env var
    /// 2. client_id field in the TOML
    pub fn load(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(id) = std::env::var("SPOTIFY_CLIENT_ID") {
            let id = id.trim().to_owned();
            if !id.is_empty() {
                config.auth.client_id = id;
            }
        }

        // A mock deployment needs no real client id; anything else does
        if config.auth.client_id.is_empty() && !config.auth.use_mock {
            return Err(crate::Error::Config(
                "client_id is required (set SPOTIFY_CLIENT_ID or auth.client_id)".into(),
            ));
        }

        if !config.auth.redirect_uri.starts_with("http://")
            && !config.auth.redirect_uri.starts_with("https://")
        {
            return Err(crate::Error::Config(format!(
                "redirect_uri must start with http:// or https://, got: {}",
                config.auth.redirect_uri
            )));
        }

        if config.catalog.max_requests_per_second == 0 {
            return Err(crate::Error::Config(
                "max_requests_per_second must be greater than 0".into(),
            ));
        }

        if config.catalog.request_timeout_secs == 0 {
            return Err(crate::Error::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("walkup.toml")
    }
}
