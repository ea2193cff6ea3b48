//! Spotify OAuth constants
//!
//! Endpoint URLs and persisted key names. The client id is configuration
//! (each deployment registers its own application), so unlike the endpoints
//! it does not live here.

/// Authorization endpoint (full browser navigation, not an API call)
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.spotify.com/authorize";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";

/// Account profile endpoint; the `product` field drives the premium gate
pub const PROFILE_ENDPOINT: &str = "https://api.spotify.com/v1/me";

/// Subscription tier required for playback
pub const PREMIUM_PRODUCT: &str = "premium";

/// PKCE verifier length bounds per RFC 7636
pub const MIN_VERIFIER_LENGTH: usize = 43;
pub const MAX_VERIFIER_LENGTH: usize = 128;
pub const DEFAULT_VERIFIER_LENGTH: usize = 64;

/// How long the PKCE artifacts survive between login initiation and callback
pub const PKCE_TTL_SECONDS: u64 = 600;

/// Persisted key names. The two PKCE keys are transient (600s TTL); the four
/// token keys live as long as the token itself.
pub const KEY_CODE_VERIFIER: &str = "spotify_code_verifier";
pub const KEY_STATE: &str = "spotify_state";
pub const KEY_ACCESS_TOKEN: &str = "spotify_access_token";
pub const KEY_REFRESH_TOKEN: &str = "spotify_refresh_token";
pub const KEY_TOKEN_EXPIRY: &str = "spotify_token_expiry";
pub const KEY_TOKEN_SCOPE: &str = "spotify_token_scope";
