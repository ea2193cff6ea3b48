//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the code verifier and S256 challenge used during the OAuth
//! authorization flow, plus the anti-CSRF state token round-tripped through
//! the redirect. The verifier is stored client-side and sent during token
//! exchange; the challenge is included in the authorization URL so the
//! authorization server can verify the exchange request came from the same
//! party that initiated the flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::constants::{
    AUTHORIZE_ENDPOINT, DEFAULT_VERIFIER_LENGTH, MAX_VERIFIER_LENGTH, MIN_VERIFIER_LENGTH,
};
use crate::error::{Error, Result};

/// URL-safe characters used for verifier generation. Exactly 64 entries, so
/// `byte % 64` maps uniformly with no modulo bias.
const VERIFIER_CHARSET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Generate a cryptographically random PKCE code verifier of exactly
/// `length` characters.
///
/// RFC 7636 requires 43-128 characters; lengths outside that range are
/// rejected rather than clamped so a misconfigured caller fails loudly.
pub fn generate_verifier(length: usize) -> Result<String> {
    if !(MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH).contains(&length) {
        return Err(Error::Validation(format!(
            "verifier length {length} outside [{MIN_VERIFIER_LENGTH}, {MAX_VERIFIER_LENGTH}]"
        )));
    }
    let mut bytes = vec![0u8; length];
    rand::rng().fill(&mut bytes[..]);
    Ok(bytes
        .iter()
        .map(|b| VERIFIER_CHARSET[(b % 64) as usize] as char)
        .collect())
}

/// Generate a verifier of the default length.
pub fn generate_default_verifier() -> Result<String> {
    generate_verifier(DEFAULT_VERIFIER_LENGTH)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
///
/// The authorization server compares this against the challenge sent in
/// the authorization URL to verify the token exchange request is legitimate.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random anti-CSRF state token.
///
/// 16 random bytes encoded as URL-safe base64 (22 characters); collisions
/// across calls are vanishingly unlikely.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the full authorization URL with all required OAuth parameters.
///
/// The `state` parameter is an opaque value the client generates for CSRF
/// protection. The authorization server returns it unchanged in the callback.
pub fn build_authorization_url(
    client_id: &str,
    redirect_uri: &str,
    challenge: &str,
    state: &str,
    scopes: &str,
) -> String {
    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&code_challenge={}&code_challenge_method=S256&state={}&scope={}",
        AUTHORIZE_ENDPOINT,
        client_id,
        urlencoded(redirect_uri),
        challenge,
        state,
        urlencoded(scopes),
    )
}

/// Minimal URL encoding for parameter values.
/// Only encodes characters that would break URL parameter parsing.
fn urlencoded(s: &str) -> String {
    s.replace(' ', "%20")
        .replace(':', "%3A")
        .replace('/', "%2F")
}
