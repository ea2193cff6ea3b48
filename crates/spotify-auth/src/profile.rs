//! Account profile retrieval
//!
//! Fetched once, immediately after token exchange, to enforce the premium
//! gate: playback of walk-up segments requires a Premium subscription, and
//! a non-premium account must never end up half-authenticated.

use serde::Deserialize;

use crate::constants::PREMIUM_PRODUCT;
use crate::error::{Error, Result};

/// The subset of the account profile the auth layer cares about.
#[derive(Debug, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Subscription tier: "premium", "free", "open"
    #[serde(default)]
    pub product: String,
}

impl Profile {
    pub fn is_premium(&self) -> bool {
        self.product == PREMIUM_PRODUCT
    }
}

/// Fetch the authenticated account's profile.
pub async fn fetch_profile(
    client: &reqwest::Client,
    endpoint: &str,
    access_token: &str,
) -> Result<Profile> {
    let response = client
        .get(endpoint)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("profile request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Http(format!(
            "profile endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<Profile>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("invalid profile payload: {e}")))
}
