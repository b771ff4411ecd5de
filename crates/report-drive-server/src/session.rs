//! In-memory cookie sessions.
//!
//! A session only exists once something has been stored in it. Entries
//! expire a fixed time after their last save and are purged lazily.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use report_drive::TokenSet;
use tracing::debug;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sid";
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Access tokens are treated as expired this long before the issuer says so.
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    /// `None` when the token endpoint did not report a lifetime.
    pub token_expires_at: Option<Instant>,
    /// CSRF value sent with the authorize redirect.
    pub oauth_state: Option<String>,
}

impl SessionData {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn token_expired(&self) -> bool {
        self.token_expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }

    /// Replaces the stored tokens. A response without a refresh token keeps
    /// the previous one.
    pub fn store_tokens(&mut self, tokens: TokenSet) {
        self.access_token = Some(tokens.access_token);
        if tokens.id_token.is_some() {
            self.id_token = tokens.id_token;
        }
        if tokens.refresh_token.is_some() {
            self.refresh_token = tokens.refresh_token;
        }
        self.token_expires_at = tokens.expires_in.map(|secs| {
            Instant::now() + Duration::from_secs(secs).saturating_sub(TOKEN_EXPIRY_MARGIN)
        });
    }
}

impl std::fmt::Debug for SessionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionData")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_id_token", &self.id_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_expires_at", &self.token_expires_at)
            .field("oauth_state", &self.oauth_state)
            .finish()
    }
}

struct Entry {
    data: SessionData,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_live(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        let mut entries = self.lock();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        if entries.len() != before {
            debug!(purged = before - entries.len(), "expired sessions removed");
        }
        entries
    }

    pub fn load(&self, id: &str) -> Option<SessionData> {
        self.lock_live().get(id).map(|entry| entry.data.clone())
    }

    /// Stores `data` under `id` when that session is still live, otherwise
    /// under a fresh id. Returns the id the cookie must carry.
    pub fn save(&self, id: Option<&str>, data: SessionData) -> String {
        let mut entries = self.lock_live();
        let id = match id {
            Some(id) if entries.contains_key(id) => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        entries.insert(
            id.clone(),
            Entry {
                data,
                expires_at: Instant::now() + self.ttl,
            },
        );
        id
    }

    pub fn destroy(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock_live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Session id from the request's `Cookie` headers.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(id: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={id}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_TTL.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
