//! Spotify OAuth authentication library
//!
//! Provides PKCE flow generation, token exchange/refresh, credential
//! key/value storage, and the auth lifecycle manager for the walk-up
//! player. This crate is a standalone library with no dependency on the
//! catalog client — it can be tested and used independently.
//!
//! Credential flow:
//! 1. Host calls `AuthManager::begin_login()` and navigates to the URL
//! 2. User authorizes; the authorization server redirects back with a code
//! 3. Host calls `AuthManager::handle_callback()` with code + state
//! 4. Manager exchanges the code, checks the premium gate, stores tokens
//! 5. Consumers call `AuthManager::get_access_token()` per request;
//!    expired tokens refresh transparently
//! 6. `AuthManager::logout()` clears the session everywhere

pub mod constants;
pub mod error;
pub mod manager;
pub mod pkce;
pub mod profile;
pub mod store;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use manager::{AuthManager, CredentialRecord, Endpoints};
pub use pkce::{
    build_authorization_url, compute_challenge, generate_default_verifier, generate_state,
    generate_verifier,
};
pub use profile::Profile;
pub use store::{FileStore, KeyValueStore, MemoryStore, SameSite, SetAttributes};
pub use token::{TokenResponse, exchange_code, refresh_access_token};
