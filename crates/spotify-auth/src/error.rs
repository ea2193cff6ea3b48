//! Error types for auth lifecycle operations
//!
//! Callback errors are user-facing: state mismatch, missing verifier, and
//! non-premium accounts are distinct UX paths and must stay distinguishable.

/// Errors from auth lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("Invalid state parameter. Possible CSRF attack.")]
    StateMismatch,

    #[error("no PKCE verifier stored; login was not initiated or the session expired")]
    MissingVerifier,

    #[error("Premium subscription required")]
    PremiumRequired,

    #[error("no refresh token stored")]
    NoRefreshToken,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("credential store error: {0}")]
    Store(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
