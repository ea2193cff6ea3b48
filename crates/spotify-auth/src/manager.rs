//! Auth lifecycle state machine
//!
//! Owns the authenticated-session state: initiating login, validating the
//! OAuth callback, exchanging codes for tokens, refreshing expired tokens,
//! enforcing the premium gate, and logging out.
//!
//! The in-memory `CredentialRecord` is the single source of truth for "is
//! authenticated"; the key/value store is the durable mirror, hydrated once
//! at startup via `restore_session`.
//!
//! Refresh is funneled through `get_access_token`, which holds the record
//! lock across the refresh call so concurrent callers ride a single
//! in-flight refresh instead of stampeding the token endpoint.

use std::sync::Arc;

use common::{AuthSettings, Secret};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::{
    DEFAULT_VERIFIER_LENGTH, KEY_ACCESS_TOKEN, KEY_CODE_VERIFIER, KEY_REFRESH_TOKEN, KEY_STATE,
    KEY_TOKEN_EXPIRY, KEY_TOKEN_SCOPE, PKCE_TTL_SECONDS, PROFILE_ENDPOINT, TOKEN_ENDPOINT,
};
use crate::error::{Error, Result};
use crate::store::{KeyValueStore, SameSite, SetAttributes};
use crate::{pkce, profile, token};

/// The one credential per authenticated session.
///
/// `expires_at` is a unix timestamp in milliseconds. Validity is re-derived
/// from it on every read; nothing caches "still valid" as a boolean.
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: Option<Secret<String>>,
    pub expires_at: u64,
    pub scope: String,
}

/// Endpoint URLs, overridable for tests against a local mock server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub token: String,
    pub profile: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            token: TOKEN_ENDPOINT.into(),
            profile: PROFILE_ENDPOINT.into(),
        }
    }
}

/// Auth lifecycle manager.
///
/// Constructed explicitly at application start and passed by reference to
/// every consumer; tests construct their own isolated instance per case.
pub struct AuthManager {
    settings: AuthSettings,
    endpoints: Endpoints,
    store: Arc<dyn KeyValueStore>,
    http: reqwest::Client,
    record: Mutex<Option<CredentialRecord>>,
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl AuthManager {
    /// Create a manager over the given store and HTTP client.
    ///
    /// An unavailable store is logged but not fatal: the session simply will
    /// not persist across reloads.
    pub async fn new(
        settings: AuthSettings,
        store: Arc<dyn KeyValueStore>,
        http: reqwest::Client,
    ) -> Self {
        if !store.is_available().await {
            warn!("credential store unavailable, sessions will not persist across restarts");
        }
        Self {
            settings,
            endpoints: Endpoints::default(),
            store,
            http,
            record: Mutex::new(None),
        }
    }

    /// Point token/profile calls at alternate endpoints (tests).
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Hydrate the in-memory record from the durable store.
    ///
    /// Called once at startup. Expired store entries read as absent, so a
    /// stale persisted session never hydrates into an authenticated state.
    pub async fn restore_session(&self) {
        let Some(access_token) = self.store.get(KEY_ACCESS_TOKEN).await else {
            return;
        };
        let Some(expires_at) = self
            .store
            .get(KEY_TOKEN_EXPIRY)
            .await
            .and_then(|v| v.parse::<u64>().ok())
        else {
            return;
        };
        let refresh_token = self.store.get(KEY_REFRESH_TOKEN).await.map(Secret::new);
        let scope = self.store.get(KEY_TOKEN_SCOPE).await.unwrap_or_default();

        let mut record = self.record.lock().await;
        *record = Some(CredentialRecord {
            access_token,
            refresh_token,
            expires_at,
            scope,
        });
        debug!("restored session from credential store");
    }

    /// Begin the login flow: generate a PKCE session, persist its artifacts,
    /// and return the authorization URL for the host to navigate to.
    ///
    /// Navigation itself is the host's job (a full page departure). Any PKCE
    /// or storage failure surfaces here, before navigation can occur.
    pub async fn begin_login(&self) -> Result<String> {
        let verifier = pkce::generate_verifier(DEFAULT_VERIFIER_LENGTH)?;
        let challenge = pkce::compute_challenge(&verifier);
        let state = pkce::generate_state();

        // Lax, not Strict: the artifacts must survive the cross-site
        // redirect back from the authorization server
        let attrs = SetAttributes {
            max_age_seconds: Some(PKCE_TTL_SECONDS),
            same_site: SameSite::Lax,
            ..Default::default()
        };
        self.store
            .set(KEY_CODE_VERIFIER, &verifier, attrs.clone())
            .await?;
        self.store.set(KEY_STATE, &state, attrs).await?;

        debug!("login initiated, PKCE artifacts stored");
        Ok(pkce::build_authorization_url(
            &self.settings.client_id,
            &self.settings.redirect_uri,
            &challenge,
            &state,
            &self.settings.scopes,
        ))
    }

    /// Complete the login flow from the OAuth callback parameters.
    ///
    /// The stored state is single-use: it is deleted immediately after
    /// comparison regardless of outcome, so a replayed callback can never
    /// match twice. The verifier stays in place on failure (its TTL cleans
    /// it up) and is deleted on the success path.
    ///
    /// A non-premium account fails the gate before anything is stored.
    pub async fn handle_callback(&self, code: &str, returned_state: &str) -> Result<()> {
        let stored_state = self.store.get(KEY_STATE).await;
        let _ = self.store.delete(KEY_STATE, None).await;
        match stored_state {
            Some(ref s) if s == returned_state => {}
            _ => {
                warn!("callback state mismatch or absent");
                return Err(Error::StateMismatch);
            }
        }

        let verifier = self
            .store
            .get(KEY_CODE_VERIFIER)
            .await
            .ok_or(Error::MissingVerifier)?;

        let token_response = token::exchange_code(
            &self.http,
            &self.endpoints.token,
            &self.settings.client_id,
            &self.settings.redirect_uri,
            code,
            &verifier,
        )
        .await?;

        let account = profile::fetch_profile(
            &self.http,
            &self.endpoints.profile,
            &token_response.access_token,
        )
        .await?;
        if !account.is_premium() {
            warn!(user = %account.id, product = %account.product, "premium gate rejected account");
            return Err(Error::PremiumRequired);
        }

        let record = self.record_from_response(token_response, None);
        self.persist_record(&record).await;
        *self.record.lock().await = Some(record);
        let _ = self.store.delete(KEY_CODE_VERIFIER, None).await;

        info!(user = %account.id, "authenticated");
        Ok(())
    }

    /// Get a valid access token, refreshing transparently when needed.
    ///
    /// Returns `None` when unauthenticated or when the refresh fails. A
    /// failed refresh is terminal and logs the user out; this method never
    /// hands back a stale token.
    pub async fn get_access_token(&self) -> Option<String> {
        {
            let record = self.record.lock().await;
            match record.as_ref() {
                None => return None,
                Some(c) if self.is_fresh(c) => return Some(c.access_token.clone()),
                Some(_) => {}
            }
        }

        match self.refresh_locked(false).await {
            Ok(access_token) => Some(access_token),
            Err(e) => {
                warn!(error = %e, "token refresh failed, logging out");
                self.logout().await;
                None
            }
        }
    }

    /// Explicit refresh for callers that must react to failure themselves
    /// (e.g. show a re-login prompt). Unlike the implicit refresh inside
    /// `get_access_token`, a failure here is returned, not converted into a
    /// logout.
    pub async fn refresh_token(&self) -> Result<String> {
        self.refresh_locked(true).await
    }

    /// Refresh under the record lock. Holding the lock across the endpoint
    /// call is what prevents overlapping refreshes: late arrivals block
    /// here, then find a fresh record on the re-check and return it.
    async fn refresh_locked(&self, force: bool) -> Result<String> {
        let mut record = self.record.lock().await;
        let current = record.as_ref().ok_or(Error::NoRefreshToken)?;

        if !force && self.is_fresh(current) {
            return Ok(current.access_token.clone());
        }

        let refresh = current
            .refresh_token
            .as_ref()
            .ok_or(Error::NoRefreshToken)?
            .expose()
            .clone();

        let response = token::refresh_access_token(
            &self.http,
            &self.endpoints.token,
            &self.settings.client_id,
            &refresh,
        )
        .await?;

        let previous_refresh = current.refresh_token.clone();
        let new_record = self.record_from_response(response, previous_refresh);
        self.persist_record(&new_record).await;
        let access_token = new_record.access_token.clone();
        *record = Some(new_record);

        info!("access token refreshed");
        Ok(access_token)
    }

    /// Clear the session everywhere. Idempotent.
    pub async fn logout(&self) {
        for key in [
            KEY_ACCESS_TOKEN,
            KEY_REFRESH_TOKEN,
            KEY_TOKEN_EXPIRY,
            KEY_TOKEN_SCOPE,
            KEY_CODE_VERIFIER,
            KEY_STATE,
        ] {
            let _ = self.store.delete(key, None).await;
        }
        *self.record.lock().await = None;
        info!("logged out");
    }

    /// Whether an unexpired credential is held in memory. Pure predicate,
    /// no store or network I/O.
    pub async fn is_authenticated(&self) -> bool {
        self.record
            .lock()
            .await
            .as_ref()
            .is_some_and(|c| now_millis() < c.expires_at)
    }

    /// Token still has more than the refresh buffer left before expiry.
    fn is_fresh(&self, record: &CredentialRecord) -> bool {
        let buffer_millis = self.settings.refresh_buffer_minutes * 60_000;
        now_millis() + buffer_millis < record.expires_at
    }

    /// Build a record from a token response. A refresh response without a
    /// new refresh token carries the previous one forward.
    fn record_from_response(
        &self,
        response: token::TokenResponse,
        previous_refresh: Option<Secret<String>>,
    ) -> CredentialRecord {
        CredentialRecord {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .map(Secret::new)
                .or(previous_refresh),
            expires_at: now_millis() + response.expires_in * 1000,
            scope: response.scope,
        }
    }

    /// Mirror the record into the durable store. Persistence failures are
    /// logged, not fatal: the in-memory session keeps working, it just
    /// won't survive a restart.
    async fn persist_record(&self, record: &CredentialRecord) {
        let attrs = SetAttributes {
            expires_at: Some(record.expires_at),
            ..Default::default()
        };
        let expiry = record.expires_at.to_string();
        let writes: [(&str, Option<&str>); 4] = [
            (KEY_ACCESS_TOKEN, Some(record.access_token.as_str())),
            (
                KEY_REFRESH_TOKEN,
                record.refresh_token.as_ref().map(|s| s.expose().as_str()),
            ),
            (KEY_TOKEN_EXPIRY, Some(expiry.as_str())),
            (KEY_TOKEN_SCOPE, Some(record.scope.as_str())),
        ];
        for (key, value) in writes {
            let Some(value) = value else { continue };
            if let Err(e) = self.store.set(key, value, attrs.clone()).await {
                warn!(key, error = %e, "failed to persist credential field");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::{Json, Router, http::StatusCode, routing::get, routing::post};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings() -> AuthSettings {
        AuthSettings {
            client_id: "client-abc".into(),
            redirect_uri: "https://walkup.example/callback".into(),
            refresh_buffer_minutes: 5,
            base_path: "/".into(),
            scopes: "streaming user-read-email user-read-private".into(),
            use_mock: false,
        }
    }

    /// Local stand-in for the accounts API: a token route and a profile
    /// route on an ephemeral port. `token_calls` counts token endpoint hits.
    async fn start_accounts(
        product: &'static str,
        refresh_ok: bool,
        token_calls: Arc<AtomicUsize>,
    ) -> Endpoints {
        let counter = token_calls.clone();
        let app = Router::new()
            .route(
                "/api/token",
                post(move || {
                    let counter = counter.clone();
                    async move {
                        if !refresh_ok {
                            return (
                                StatusCode::BAD_REQUEST,
                                Json(serde_json::json!({"error": "invalid_grant"})),
                            );
                        }
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        (
                            StatusCode::OK,
                            Json(serde_json::json!({
                                "access_token": format!("BQa_token_{n}"),
                                "refresh_token": "AQb_refresh",
                                "expires_in": 3600,
                                "scope": "streaming"
                            })),
                        )
                    }
                }),
            )
            .route(
                "/v1/me",
                get(move || async move {
                    Json(serde_json::json!({
                        "id": "user1",
                        "display_name": "Coach",
                        "product": product
                    }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Endpoints {
            token: format!("http://{addr}/api/token"),
            profile: format!("http://{addr}/v1/me"),
        }
    }

    async fn manager_with(endpoints: Endpoints) -> (AuthManager, Arc<dyn KeyValueStore>) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let manager = AuthManager::new(settings(), store.clone(), reqwest::Client::new())
            .await
            .with_endpoints(endpoints);
        (manager, store)
    }

    async fn seed_record(manager: &AuthManager, expires_at: u64, with_refresh: bool) {
        let record = CredentialRecord {
            access_token: "BQa_old".into(),
            refresh_token: with_refresh.then(|| Secret::new("AQb_refresh".into())),
            expires_at,
            scope: "streaming".into(),
        };
        manager.persist_record(&record).await;
        *manager.record.lock().await = Some(record);
    }

    #[tokio::test]
    async fn begin_login_stores_artifacts_and_builds_url() {
        let (manager, store) = manager_with(Endpoints::default()).await;

        let url = manager.begin_login().await.unwrap();

        let verifier = store.get(KEY_CODE_VERIFIER).await.expect("verifier stored");
        let state = store.get(KEY_STATE).await.expect("state stored");
        assert_eq!(verifier.len(), DEFAULT_VERIFIER_LENGTH);
        assert!(url.contains(&format!("state={state}")));
        assert!(url.contains(&format!(
            "code_challenge={}",
            pkce::compute_challenge(&verifier)
        )));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[tokio::test]
    async fn callback_rejects_mismatched_state_and_consumes_it() {
        let endpoints = start_accounts("premium", true, Arc::default()).await;
        let (manager, store) = manager_with(endpoints).await;
        manager.begin_login().await.unwrap();
        let real_state = store.get(KEY_STATE).await.unwrap();

        let err = manager.handle_callback("code123", "forged-state").await;
        assert!(matches!(err, Err(Error::StateMismatch)));

        // State is single-use: even the genuine value fails after the miss
        let err = manager.handle_callback("code123", &real_state).await;
        assert!(matches!(err, Err(Error::StateMismatch)));

        // Verifier survives the failure (TTL cleans it up)
        assert!(store.get(KEY_CODE_VERIFIER).await.is_some());
    }

    #[tokio::test]
    async fn callback_without_verifier_fails() {
        let (manager, store) = manager_with(Endpoints::default()).await;
        store
            .set(KEY_STATE, "state-only", SetAttributes::default())
            .await
            .unwrap();

        let err = manager.handle_callback("code123", "state-only").await;
        assert!(matches!(err, Err(Error::MissingVerifier)));
    }

    #[tokio::test]
    async fn callback_rejects_non_premium_account() {
        let endpoints = start_accounts("free", true, Arc::default()).await;
        let (manager, store) = manager_with(endpoints).await;
        manager.begin_login().await.unwrap();
        let state = store.get(KEY_STATE).await.unwrap();

        let err = manager.handle_callback("code123", &state).await;
        assert!(matches!(err, Err(Error::PremiumRequired)));

        // The gate fires before anything is stored
        assert!(!manager.is_authenticated().await);
        assert!(store.get(KEY_ACCESS_TOKEN).await.is_none());
        assert!(store.get(KEY_REFRESH_TOKEN).await.is_none());
    }

    #[tokio::test]
    async fn callback_success_authenticates_and_clears_pkce_artifacts() {
        let endpoints = start_accounts("premium", true, Arc::default()).await;
        let (manager, store) = manager_with(endpoints).await;
        manager.begin_login().await.unwrap();
        let state = store.get(KEY_STATE).await.unwrap();

        manager.handle_callback("code123", &state).await.unwrap();

        assert!(manager.is_authenticated().await);
        assert!(store.get(KEY_CODE_VERIFIER).await.is_none());
        assert!(store.get(KEY_STATE).await.is_none());
        assert_eq!(store.get(KEY_ACCESS_TOKEN).await.as_deref(), Some("BQa_token_1"));
        assert_eq!(store.get(KEY_REFRESH_TOKEN).await.as_deref(), Some("AQb_refresh"));
        assert_eq!(store.get(KEY_TOKEN_SCOPE).await.as_deref(), Some("streaming"));
    }

    #[tokio::test]
    async fn fresh_token_returned_without_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoints = start_accounts("premium", true, calls.clone()).await;
        let (manager, _store) = manager_with(endpoints).await;
        seed_record(&manager, now_millis() + 3_600_000, true).await;

        let token = manager.get_access_token().await;

        assert_eq!(token.as_deref(), Some("BQa_old"));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "no refresh expected");
    }

    #[tokio::test]
    async fn token_inside_buffer_triggers_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoints = start_accounts("premium", true, calls.clone()).await;
        let (manager, store) = manager_with(endpoints).await;
        // Expires in 1s, well inside the 5 minute buffer
        seed_record(&manager, now_millis() + 1_000, true).await;

        let token = manager.get_access_token().await;

        assert_eq!(token.as_deref(), Some("BQa_token_1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get(KEY_ACCESS_TOKEN).await.as_deref(), Some("BQa_token_1"));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoints = start_accounts("premium", true, calls.clone()).await;
        let (manager, _store) = manager_with(endpoints).await;
        seed_record(&manager, now_millis() + 1_000, true).await;

        let (a, b) = tokio::join!(manager.get_access_token(), manager.get_access_token());

        assert_eq!(a.as_deref(), Some("BQa_token_1"));
        assert_eq!(b.as_deref(), Some("BQa_token_1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "refreshes must not overlap");
    }

    #[tokio::test]
    async fn failed_refresh_logs_out() {
        let endpoints = start_accounts("premium", false, Arc::default()).await;
        let (manager, store) = manager_with(endpoints).await;
        seed_record(&manager, now_millis() + 1_000, true).await;

        let token = manager.get_access_token().await;

        assert!(token.is_none());
        assert!(!manager.is_authenticated().await);
        assert!(store.get(KEY_ACCESS_TOKEN).await.is_none());
        assert!(store.get(KEY_REFRESH_TOKEN).await.is_none());
    }

    #[tokio::test]
    async fn explicit_refresh_without_credential_errors() {
        let (manager, _store) = manager_with(Endpoints::default()).await;
        let err = manager.refresh_token().await;
        assert!(matches!(err, Err(Error::NoRefreshToken)));
    }

    #[tokio::test]
    async fn explicit_refresh_without_refresh_token_errors() {
        let (manager, _store) = manager_with(Endpoints::default()).await;
        seed_record(&manager, now_millis() + 3_600_000, false).await;

        let err = manager.refresh_token().await;
        assert!(matches!(err, Err(Error::NoRefreshToken)));
    }

    #[tokio::test]
    async fn explicit_refresh_surfaces_rejection_without_logout() {
        let endpoints = start_accounts("premium", false, Arc::default()).await;
        let (manager, _store) = manager_with(endpoints).await;
        seed_record(&manager, now_millis() + 3_600_000, true).await;

        let err = manager.refresh_token().await;

        assert!(matches!(err, Err(Error::InvalidCredentials(_))));
        // The caller decides what to do; the session is left in place
        assert!(manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn explicit_refresh_always_hits_the_endpoint() {
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoints = start_accounts("premium", true, calls.clone()).await;
        let (manager, _store) = manager_with(endpoints).await;
        seed_record(&manager, now_millis() + 3_600_000, true).await;

        let token = manager.refresh_token().await.unwrap();

        assert_eq!(token, "BQa_token_1");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "forced refresh must not short-circuit");
    }

    #[tokio::test]
    async fn logout_clears_everything_and_is_idempotent() {
        let (manager, store) = manager_with(Endpoints::default()).await;
        seed_record(&manager, now_millis() + 3_600_000, true).await;
        manager.begin_login().await.unwrap();

        manager.logout().await;
        manager.logout().await;

        assert!(!manager.is_authenticated().await);
        for key in [
            KEY_ACCESS_TOKEN,
            KEY_REFRESH_TOKEN,
            KEY_TOKEN_EXPIRY,
            KEY_TOKEN_SCOPE,
            KEY_CODE_VERIFIER,
            KEY_STATE,
        ] {
            assert!(store.get(key).await.is_none(), "{key} should be gone");
        }
    }

    #[tokio::test]
    async fn restore_session_hydrates_from_store() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let expiry = now_millis() + 3_600_000;
        let attrs = SetAttributes::default();
        store.set(KEY_ACCESS_TOKEN, "BQa_persisted", attrs.clone()).await.unwrap();
        store.set(KEY_REFRESH_TOKEN, "AQb_persisted", attrs.clone()).await.unwrap();
        store.set(KEY_TOKEN_EXPIRY, &expiry.to_string(), attrs.clone()).await.unwrap();
        store.set(KEY_TOKEN_SCOPE, "streaming", attrs).await.unwrap();

        let manager = AuthManager::new(settings(), store, reqwest::Client::new()).await;
        manager.restore_session().await;

        assert!(manager.is_authenticated().await);
        assert_eq!(manager.get_access_token().await.as_deref(), Some("BQa_persisted"));
    }

    #[tokio::test]
    async fn restore_session_ignores_partial_state() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store
            .set(KEY_ACCESS_TOKEN, "BQa_orphan", SetAttributes::default())
            .await
            .unwrap();

        let manager = AuthManager::new(settings(), store, reqwest::Client::new()).await;
        manager.restore_session().await;

        // No expiry key means no way to judge freshness: stay logged out
        assert!(!manager.is_authenticated().await);
    }
}
