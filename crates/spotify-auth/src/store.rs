//! Durable key/value credential storage
//!
//! A narrow storage contract shared by the auth lifecycle manager: named
//! string values with an optional expiry and cookie-style scope attributes.
//! In a browser host the single implementation sits on the cookie jar; here
//! the same contract is implemented twice — an in-memory map for tests and
//! non-durable fallback, and a JSON file for hosts that persist sessions
//! across restarts.
//!
//! Validity is always re-derived from the stored expiry at read time; an
//! expired entry is purged and reads as absent. Nothing caches "still valid"
//! as a boolean.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

/// Cookie-style SameSite attribute. Strict is the default; the PKCE
/// artifacts are stored Lax because the verifier must survive the
/// cross-site redirect back from the authorization server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Attributes applied when storing a value.
///
/// `expires_at` is a unix timestamp in milliseconds and wins over
/// `max_age_seconds` when both are set. `path`, `same_site`, and `secure`
/// are scope attributes a cookie-backed implementation passes to the
/// browser; the native implementations record them verbatim.
#[derive(Debug, Clone)]
pub struct SetAttributes {
    pub max_age_seconds: Option<u64>,
    pub expires_at: Option<u64>,
    pub path: String,
    pub same_site: SameSite,
    pub secure: bool,
}

impl Default for SetAttributes {
    fn default() -> Self {
        Self {
            max_age_seconds: None,
            expires_at: None,
            path: "/".into(),
            same_site: SameSite::Strict,
            secure: true,
        }
    }
}

/// Storage contract for credential material.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn KeyValueStore>` is injected into the auth manager).
pub trait KeyValueStore: Send + Sync {
    /// Store a value under `name` with the given attributes.
    fn set<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
        attributes: SetAttributes,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Read a value. Returns `None` for absent or expired entries.
    fn get<'a>(&'a self, name: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

    /// Delete a value. `path` must match the path the value was stored
    /// under in cookie-backed hosts; the native implementations ignore it.
    fn delete<'a>(
        &'a self,
        name: &'a str,
        path: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Probe whether the environment accepts persistence at all.
    ///
    /// Performs a write/read/delete round-trip with a throwaway key. Returns
    /// false when the host rejects storage (private browsing, read-only
    /// filesystem); callers degrade to non-persistent sessions.
    fn is_available(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            let probe = "__storage_probe";
            if self.set(probe, "1", SetAttributes::default()).await.is_err() {
                return false;
            }
            let ok = matches!(self.get(probe).await.as_deref(), Some("1"));
            let _ = self.delete(probe, None).await;
            ok
        })
    }
}

/// A stored entry. `expires` is a unix timestamp in milliseconds (absolute,
/// not a delta), computed at storage time.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    value: String,
    expires: Option<u64>,
    path: String,
    same_site: SameSite,
    secure: bool,
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn effective_expiry(attributes: &SetAttributes) -> Option<u64> {
    attributes
        .expires_at
        .or_else(|| attributes.max_age_seconds.map(|s| now_millis() + s * 1000))
}

fn entry_from(value: &str, attributes: SetAttributes) -> Entry {
    Entry {
        value: value.to_owned(),
        expires: effective_expiry(&attributes),
        path: attributes.path,
        same_site: attributes.same_site,
        secure: attributes.secure,
    }
}

fn live_value(entry: Option<&Entry>) -> Option<String> {
    match entry {
        Some(e) if e.expires.is_none_or(|exp| now_millis() < exp) => Some(e.value.clone()),
        _ => None,
    }
}

/// In-memory store. Sessions do not survive a restart; used in tests and as
/// the fallback when durable storage is unavailable.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn set<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
        attributes: SetAttributes,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(name.to_owned(), entry_from(value, attributes));
            Ok(())
        })
    }

    fn get<'a>(&'a self, name: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let value = live_value(state.get(name));
            if value.is_none() {
                state.remove(name);
            }
            value
        })
    }

    fn delete<'a>(
        &'a self,
        name: &'a str,
        _path: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.remove(name);
            Ok(())
        })
    }
}

/// File-backed store: a JSON map persisted with atomic temp-file + rename
/// writes and 0600 permissions, since it holds OAuth tokens. A tokio Mutex
/// serializes writes from callback handling, refresh, and logout.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<HashMap<String, Entry>>,
}

impl FileStore {
    /// Load entries from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` so future loads don't
    /// need the cold-start path. Expired entries are dropped at load time.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Store(format!("reading store file: {e}")))?;
            let mut entries: HashMap<String, Entry> = serde_json::from_str(&contents)
                .map_err(|e| Error::Store(format!("parsing store file: {e}")))?;
            let now = now_millis();
            entries.retain(|_, e| e.expires.is_none_or(|exp| now < exp));
            debug!(path = %path.display(), entries = entries.len(), "loaded credential store");
            entries
        } else {
            debug!(path = %path.display(), "store file not found, starting empty");
            let entries = HashMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }
}

impl KeyValueStore for FileStore {
    fn set<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
        attributes: SetAttributes,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.insert(name.to_owned(), entry_from(value, attributes));
            write_atomic(&self.path, &state).await
        })
    }

    fn get<'a>(&'a self, name: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let value = live_value(state.get(name));
            if value.is_none() && state.remove(name).is_some() {
                // Expired entry purged; persistence failure here only delays
                // the purge until the next write
                let _ = write_atomic(&self.path, &state).await;
            }
            value
        })
    }

    fn delete<'a>(
        &'a self,
        name: &'a str,
        _path: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.remove(name).is_some() {
                write_atomic(&self.path, &state).await?;
            }
            Ok(())
        })
    }
}

/// Write entries to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. This prevents corruption if the process crashes mid-write.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains OAuth tokens.
async fn write_atomic(path: &Path, data: &HashMap<String, Entry>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Store(format!("serializing entries: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Store("store path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".store.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Store(format!("writing temp store file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Store(format!("setting store file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Store(format!("renaming temp store file: {e}")))?;

    Ok(())
}
