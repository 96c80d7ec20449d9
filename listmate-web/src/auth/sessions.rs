use std::{collections::HashMap, fmt::Display, str::FromStr, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};
use sha3::{Digest, Sha3_512};
use thiserror::Error;
use tokio::sync::RwLock;
use tower_cookies::{
    cookie::{CookieBuilder, SameSite},
    Cookie, Cookies, Key,
};
use tracing::{event, instrument, Level};
use uuid::Uuid;

use super::UserId;

/// The name of the session cookie
pub const SESSION_COOKIE: &str = "sid";

/// An error from the session subsystem
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session store failed
    #[error("Failed to access session store")]
    Store,
    /// The session does not exist or has expired
    #[error("Session does not exist")]
    NotFound,
}

/// The random key identifying a session. This is the value stored in the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey(Uuid);

impl SessionKey {
    /// Generate a new random session key
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.as_simple().fmt(f)
    }
}

impl FromStr for SessionKey {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SessionError::NotFound)
    }
}

/// The data kept for each logged-in session
#[derive(Debug, Clone)]
pub struct SessionData {
    /// The user that owns the session
    pub user_id: UserId,
    /// The user's name at the time the session was created
    pub username: String,
    /// When the session stops being valid
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    /// Return true if the session is no longer valid at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Storage for session data
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Store a new session
    async fn insert(&self, key: SessionKey, data: SessionData) -> Result<(), Report<SessionError>>;
    /// Fetch a session. Expired sessions are never returned.
    async fn get(&self, key: &SessionKey) -> Result<Option<SessionData>, Report<SessionError>>;
    /// Move a session's expiration time. Returns false if the session does not exist.
    async fn set_expiry(
        &self,
        key: &SessionKey,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, Report<SessionError>>;
    /// Remove a session
    async fn remove(&self, key: &SessionKey) -> Result<(), Report<SessionError>>;
    /// Remove every session that has expired, returning how many were removed.
    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize, Report<SessionError>>;
}

/// A [SessionStore] that keeps sessions in process memory. Sessions do not survive a restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, SessionData>>,
}

impl MemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of stored sessions, including expired ones not yet cleaned up
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Return true if there are no stored sessions
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, key: SessionKey, data: SessionData) -> Result<(), Report<SessionError>> {
        self.sessions.write().await.insert(key, data);
        Ok(())
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<SessionData>, Report<SessionError>> {
        let now = Utc::now();
        let sessions = self.sessions.read().await;
        Ok(sessions.get(key).filter(|s| !s.is_expired(now)).cloned())
    }

    async fn set_expiry(
        &self,
        key: &SessionKey,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, Report<SessionError>> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(key) {
            Some(session) => {
                session.expires_at = expires_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, key: &SessionKey) -> Result<(), Report<SessionError>> {
        self.sessions.write().await.remove(key);
        Ok(())
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize, Report<SessionError>> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        Ok(before - sessions.len())
    }
}

/// Builds and reads the signed session cookie
#[derive(Clone)]
pub struct SessionCookieBuilder {
    key: Key,
    secure: bool,
    same_site: SameSite,
}

impl SessionCookieBuilder {
    /// Create a new `SessionCookieBuilder`. The cookie signing key is derived from `secret`.
    pub fn new(secret: &str, secure: bool, same_site: SameSite) -> Self {
        let digest = Sha3_512::digest(secret.as_bytes());
        Self {
            key: Key::from(digest.as_slice()),
            secure,
            same_site,
        }
    }

    fn base_cookie(&self, value: String) -> CookieBuilder<'static> {
        Cookie::build((SESSION_COOKIE, value))
            .http_only(true)
            .same_site(self.same_site)
            .secure(self.secure)
            .path("/")
    }

    /// Create a session cookie
    pub fn create_cookie(&self, key: &SessionKey, expiry: std::time::Duration) -> Cookie<'static> {
        let max_age = tower_cookies::cookie::time::Duration::try_from(expiry)
            .unwrap_or(tower_cookies::cookie::time::Duration::WEEK);
        self.base_cookie(key.to_string()).max_age(max_age).build()
    }

    /// The cookie passed to the jar to remove the session cookie. Browsers only replace a
    /// cookie whose attributes match, so this carries the same ones as [Self::create_cookie].
    fn removal_cookie(&self) -> Cookie<'static> {
        self.base_cookie(String::new()).build()
    }

    /// Read the session key from the request cookies, if a validly-signed one is present.
    pub fn read(&self, cookies: &Cookies) -> Option<SessionKey> {
        cookies
            .signed(&self.key)
            .get(SESSION_COOKIE)
            .and_then(|cookie| SessionKey::from_str(cookie.value()).ok())
    }

    /// Add the session cookie to the response
    pub fn write(&self, cookies: &Cookies, key: &SessionKey, expiry: std::time::Duration) {
        cookies.signed(&self.key).add(self.create_cookie(key, expiry));
    }

    /// Remove the session cookie from the browser
    pub fn clear(&self, cookies: &Cookies) {
        cookies.signed(&self.key).remove(self.removal_cookie());
    }
}

/// Creates, looks up, and destroys sessions, keeping the cookie in sync with the store.
#[derive(Clone)]
pub struct SessionBackend {
    store: Arc<dyn SessionStore>,
    cookies: SessionCookieBuilder,
    idle_expiry: std::time::Duration,
}

impl SessionBackend {
    /// Create a new session backend. Sessions expire once they have gone unused for
    /// `idle_expiry`.
    pub fn new(
        store: Arc<dyn SessionStore>,
        cookies: SessionCookieBuilder,
        idle_expiry: std::time::Duration,
    ) -> Self {
        Self {
            store,
            cookies,
            idle_expiry,
        }
    }

    fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let duration = chrono::Duration::from_std(self.idle_expiry)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        now + duration
    }

    /// Start a new session for the user. Any session already attached to the request is
    /// destroyed first, so a login always gets a fresh session key.
    #[instrument(skip(self, cookies))]
    pub async fn create_session(
        &self,
        cookies: &Cookies,
        user_id: UserId,
        username: &str,
    ) -> Result<SessionKey, Report<SessionError>> {
        if let Some(old_key) = self.cookies.read(cookies) {
            self.store.remove(&old_key).await?;
        }

        let key = SessionKey::new();
        let data = SessionData {
            user_id,
            username: username.to_string(),
            expires_at: self.expires_at(Utc::now()),
        };

        self.store.insert(key, data).await?;
        self.cookies.write(cookies, &key, self.idle_expiry);

        event!(Level::DEBUG, %user_id, "created session");
        Ok(key)
    }

    /// Look up the session attached to the request, extending its expiration.
    pub async fn get_session(
        &self,
        cookies: &Cookies,
    ) -> Result<Option<(SessionKey, SessionData)>, Report<SessionError>> {
        let Some(key) = self.cookies.read(cookies) else {
            return Ok(None);
        };

        let Some(mut data) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let new_expiry = self.expires_at(Utc::now());
        // Skip the write when the session was refreshed within the last minute.
        if new_expiry - data.expires_at > chrono::Duration::minutes(1)
            && self.store.set_expiry(&key, new_expiry).await?
        {
            data.expires_at = new_expiry;
            self.cookies.write(cookies, &key, self.idle_expiry);
        }

        Ok(Some((key, data)))
    }

    /// Destroy the session attached to the request, if any, and clear the cookie.
    #[instrument(skip(self, cookies))]
    pub async fn delete_session(&self, cookies: &Cookies) -> Result<(), Report<SessionError>> {
        if let Some(key) = self.cookies.read(cookies) {
            self.store.remove(&key).await?;
        }

        self.cookies.clear(cookies);
        Ok(())
    }

    /// Remove all expired sessions from the store
    pub async fn delete_expired_sessions(&self) -> Result<usize, Report<SessionError>> {
        let removed = self
            .store
            .remove_expired(Utc::now())
            .await
            .attach_printable("Removing expired sessions")?;
        if removed > 0 {
            event!(Level::INFO, removed, "removed expired sessions");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    fn data(user: i32, expires_at: DateTime<Utc>) -> SessionData {
        SessionData {
            user_id: UserId(user),
            username: format!("user{user}"),
            expires_at,
        }
    }

    #[test]
    fn session_key_round_trips_through_cookie_value() {
        let key = SessionKey::new();
        let parsed: SessionKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
        "not-a-key".parse::<SessionKey>().expect_err("invalid key");
    }

    #[tokio::test]
    async fn memory_store_hides_expired_sessions() {
        let store = MemorySessionStore::new();
        let live = SessionKey::new();
        let dead = SessionKey::new();
        let now = Utc::now();

        store
            .insert(live, data(1, now + chrono::Duration::hours(1)))
            .await
            .unwrap();
        store
            .insert(dead, data(2, now - chrono::Duration::seconds(1)))
            .await
            .unwrap();

        assert_eq!(store.get(&live).await.unwrap().unwrap().user_id, UserId(1));
        assert!(store.get(&dead).await.unwrap().is_none());

        let removed = store.remove_expired(now).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn set_expiry_on_missing_session() {
        let store = MemorySessionStore::new();
        let updated = store
            .set_expiry(&SessionKey::new(), Utc::now())
            .await
            .unwrap();
        assert!(!updated);
    }

    #[test]
    fn cookie_attributes() {
        let builder = SessionCookieBuilder::new("a test secret", true, SameSite::None);
        let key = SessionKey::new();
        let cookie = builder.create_cookie(&key, Duration::from_secs(3600));
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), key.to_string());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(
            cookie.max_age(),
            Some(tower_cookies::cookie::time::Duration::hours(1))
        );
    }

    #[test]
    fn removal_cookie_matches_session_cookie() {
        let builder = SessionCookieBuilder::new("a test secret", true, SameSite::None);
        let cookie = builder.removal_cookie();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }

    fn backend(store: Arc<MemorySessionStore>) -> SessionBackend {
        SessionBackend::new(
            store,
            SessionCookieBuilder::new("a test secret", false, SameSite::Lax),
            Duration::from_secs(60 * 60),
        )
    }

    #[tokio::test]
    async fn new_session_replaces_old_one() {
        let store = Arc::new(MemorySessionStore::new());
        let sessions = backend(store.clone());
        let cookies = Cookies::default();

        let first = sessions
            .create_session(&cookies, UserId(1), "alice")
            .await
            .unwrap();
        let second = sessions
            .create_session(&cookies, UserId(1), "alice")
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(store.get(&first).await.unwrap().is_none(), "old session removed");
        assert!(store.get(&second).await.unwrap().is_some());
        assert_eq!(store.len().await, 1);

        let (key, data) = sessions.get_session(&cookies).await.unwrap().unwrap();
        assert_eq!(key, second);
        assert_eq!(data.username, "alice");
    }

    #[tokio::test]
    async fn using_a_session_extends_it() {
        let store = Arc::new(MemorySessionStore::new());
        let sessions = backend(store.clone());
        let cookies = Cookies::default();

        let key = sessions
            .create_session(&cookies, UserId(1), "alice")
            .await
            .unwrap();

        let soon = Utc::now() + chrono::Duration::minutes(5);
        assert!(store.set_expiry(&key, soon).await.unwrap());

        let (_, data) = sessions.get_session(&cookies).await.unwrap().unwrap();
        let expected = Utc::now() + chrono::Duration::minutes(59);
        assert!(data.expires_at > expected);
        assert!(store.get(&key).await.unwrap().unwrap().expires_at > expected);
    }

    #[tokio::test]
    async fn delete_session_removes_from_store() {
        let store = Arc::new(MemorySessionStore::new());
        let sessions = backend(store.clone());
        let cookies = Cookies::default();

        let key = sessions
            .create_session(&cookies, UserId(1), "alice")
            .await
            .unwrap();
        sessions.delete_session(&cookies).await.unwrap();

        assert!(store.get(&key).await.unwrap().is_none());
        assert!(sessions.get_session(&cookies).await.unwrap().is_none());
    }
}
