//! Server-side browser sessions.
//!
//! The cookie only carries a random session ID plus an HMAC-SHA256 tag over
//! it; the access token and profile never leave the process.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use tokio::sync::RwLock;

use rolegate_common::{Snowflake, User};

use crate::models::RoleGrantOutcome;

type HmacSha256 = Hmac<Sha256>;

const SESSION_ID_BYTES: usize = 32;

/// Idle time after which a session is dropped.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Sessions kept at once; the least recently used one goes first.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid session secret: {0}")]
    InvalidSecret(String),
    #[error("Malformed session cookie")]
    Malformed,
    #[error("Session cookie signature mismatch")]
    BadSignature,
}

/// Per-browser state between login, callback and the status page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    pub access_token: Option<String>,
    pub profile: Option<User>,
    /// Guild picked on the login page, consumed by the callback.
    pub selected_guild_id: Option<Snowflake>,
    pub selected_role_id: Option<Snowflake>,
    pub role_grant: Option<RoleGrantOutcome>,
}

impl SessionData {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

struct StoredSession {
    data: SessionData,
    last_seen: Instant,
}

pub struct SessionStore {
    mac: HmacSha256,
    cookie_name: String,
    ttl: Duration,
    max_sessions: usize,
    sessions: RwLock<HashMap<String, StoredSession>>,
}

impl SessionStore {
    pub fn new(secret: &str, cookie_name: impl Into<String>) -> Result<Self, SessionError> {
        if secret.trim().is_empty() {
            return Err(SessionError::InvalidSecret("secret is empty".to_string()));
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| SessionError::InvalidSecret(e.to_string()))?;
        Ok(Self {
            mac,
            cookie_name: cookie_name.into(),
            ttl: DEFAULT_SESSION_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Override the idle TTL and the session cap.
    pub fn with_limits(mut self, ttl: Duration, max_sessions: usize) -> Self {
        self.ttl = ttl;
        self.max_sessions = max_sessions.max(1);
        self
    }

    fn sign(&self, id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check a cookie value (`id.tag`) and return the session ID it carries.
    pub fn verify(&self, value: &str) -> Result<String, SessionError> {
        let (id, tag) = value.split_once('.').ok_or(SessionError::Malformed)?;
        let tag = hex::decode(tag).map_err(|_| SessionError::Malformed)?;
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&tag)
            .map_err(|_| SessionError::BadSignature)?;
        Ok(id.to_string())
    }

    /// Session ID from the request cookies, if present and correctly signed.
    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value)?;

        match self.verify(value) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::debug!("Ignoring session cookie: {}", e);
                None
            }
        }
    }

    /// Current session of the request, empty when there is none or it expired.
    pub async fn load(&self, headers: &HeaderMap) -> (Option<String>, SessionData) {
        let Some(id) = self.session_id(headers) else {
            return (None, SessionData::default());
        };
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(stored) if now.duration_since(stored.last_seen) < self.ttl => {
                stored.last_seen = now;
                (Some(id), stored.data.clone())
            }
            Some(_) => {
                sessions.remove(&id);
                tracing::debug!("Session expired");
                (None, SessionData::default())
            }
            None => (None, SessionData::default()),
        }
    }

    /// Store `data` under `id` (or a fresh ID) and return the `Set-Cookie` value.
    pub async fn save(&self, id: Option<String>, data: SessionData) -> String {
        let id = id.unwrap_or_else(new_session_id);
        let cookie = self.cookie(&format!("{}.{}", id, self.sign(&id)), None);
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(&id) {
            self.evict(&mut sessions, now);
        }
        sessions.insert(
            id,
            StoredSession {
                data,
                last_seen: now,
            },
        );
        cookie
    }

    /// Drop expired sessions, then the least recently used ones until a new one fits.
    fn evict(&self, sessions: &mut HashMap<String, StoredSession>, now: Instant) {
        sessions.retain(|_, stored| now.duration_since(stored.last_seen) < self.ttl);
        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, stored)| stored.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }
    }

    /// Drop the request's session and return a `Set-Cookie` value that expires the cookie.
    pub async fn destroy(&self, headers: &HeaderMap) -> String {
        if let Some(id) = self.session_id(headers) {
            self.sessions.write().await.remove(&id);
        }
        self.cookie("", Some(0))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn cookie(&self, value: &str, max_age: Option<u64>) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_name, value
        );
        if let Some(max_age) = max_age {
            cookie.push_str(&format!("; Max-Age={}", max_age));
        }
        cookie
    }
}

fn new_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn store() -> SessionStore {
        SessionStore::new("test-secret", "rolegate_session").unwrap()
    }

    /// Turn a `Set-Cookie` value into request headers carrying it.
    fn request_headers(set_cookie: &str) -> HeaderMap {
        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("other=1; {}", pair)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(SessionStore::new("  ", "c").is_err());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = store();
        let data = SessionData {
            access_token: Some("token".to_string()),
            role_grant: Some(RoleGrantOutcome::Granted),
            ..Default::default()
        };
        let cookie = store.save(None, data.clone()).await;
        assert!(cookie.starts_with("rolegate_session="));
        assert!(cookie.contains("HttpOnly"));

        let (id, loaded) = store.load(&request_headers(&cookie)).await;
        assert!(id.is_some());
        assert_eq!(loaded, data);
        assert!(loaded.is_authenticated());
    }

    #[tokio::test]
    async fn test_save_keeps_existing_id() {
        let store = store();
        let cookie = store.save(None, SessionData::default()).await;
        let (id, _) = store.load(&request_headers(&cookie)).await;

        let updated = SessionData {
            selected_guild_id: Some(Snowflake(10)),
            ..Default::default()
        };
        let second = store.save(id, updated).await;
        assert_eq!(cookie, second);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_tampered_cookie_is_ignored() {
        let store = store();
        let cookie = store.save(None, SessionData::default()).await;
        let tampered = cookie.replacen("rolegate_session=", "rolegate_session=0", 1);

        let (id, data) = store.load(&request_headers(&tampered)).await;
        assert!(id.is_none());
        assert_eq!(data, SessionData::default());
    }

    #[tokio::test]
    async fn test_cookie_from_other_secret_is_rejected() {
        let other = SessionStore::new("other-secret", "rolegate_session").unwrap();
        let cookie = other.save(None, SessionData::default()).await;

        assert!(store().session_id(&request_headers(&cookie)).is_none());
    }

    #[tokio::test]
    async fn test_destroy() {
        let store = store();
        let cookie = store.save(None, SessionData::default()).await;
        let headers = request_headers(&cookie);

        let cleared = store.destroy(&headers).await;
        assert!(cleared.contains("Max-Age=0"));
        assert_eq!(store.len().await, 0);
        assert!(store.load(&headers).await.0.is_none());
    }

    #[test]
    fn test_verify_rejects_malformed() {
        let store = store();
        assert!(matches!(store.verify("no-dot"), Err(SessionError::Malformed)));
        assert!(matches!(store.verify("id.zz"), Err(SessionError::Malformed)));
        assert!(matches!(store.verify("id.00"), Err(SessionError::BadSignature)));
    }

    #[tokio::test]
    async fn test_idle_session_expires_and_is_swept() {
        let store = store().with_limits(Duration::from_millis(50), 100);
        let stale = store.save(None, SessionData::default()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let (id, data) = store.load(&request_headers(&stale)).await;
        assert!(id.is_none());
        assert_eq!(data, SessionData::default());

        let old = store.save(None, SessionData::default()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        store.save(None, SessionData::default()).await;
        assert_eq!(store.len().await, 1);
        assert!(store.load(&request_headers(&old)).await.0.is_none());
    }

    #[tokio::test]
    async fn test_cap_evicts_least_recently_used() {
        let store = store().with_limits(Duration::from_secs(3600), 3);
        let first = store.save(None, SessionData::default()).await;
        let second = store.save(None, SessionData::default()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        // Touching the first session makes the second one the oldest.
        assert!(store.load(&request_headers(&first)).await.0.is_some());

        tokio::time::sleep(Duration::from_millis(5)).await;
        store.save(None, SessionData::default()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let last = store.save(None, SessionData::default()).await;

        assert_eq!(store.len().await, 3);
        assert!(store.load(&request_headers(&second)).await.0.is_none());
        assert!(store.load(&request_headers(&first)).await.0.is_some());
        assert!(store.load(&request_headers(&last)).await.0.is_some());
    }
}
