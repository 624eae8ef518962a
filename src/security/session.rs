use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_cookies::cookie::{self, time};
use tower_cookies::Cookie;
use tracing::{debug, info};

use crate::shared::schema::sessions;
use crate::shared::utils::DbPool;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_timeout_minutes: i64,
    pub absolute_timeout_hours: i64,
    pub max_concurrent_sessions: usize,
    pub session_id_length: usize,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    pub cookie_same_site: SameSite,
    pub backend: SessionBackendKind,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 60 * 24 * 14,
            absolute_timeout_hours: 24 * 30,
            max_concurrent_sessions: 5,
            session_id_length: 32,
            cookie_name: "ticketdesk_session".into(),
            cookie_secure: false,
            cookie_http_only: true,
            cookie_same_site: SameSite::Lax,
            backend: SessionBackendKind::Memory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }

    fn to_cookie(self) -> cookie::SameSite {
        match self {
            Self::Strict => cookie::SameSite::Strict,
            Self::Lax => cookie::SameSite::Lax,
            Self::None => cookie::SameSite::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackendKind {
    Memory,
    Database,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub absolute_expires_at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

impl Session {
    pub fn new(user_id: i32, config: &SessionConfig) -> Self {
        let now = Utc::now();
        let idle_duration = Duration::minutes(config.idle_timeout_minutes);
        let absolute_duration = Duration::hours(config.absolute_timeout_hours);

        Self {
            id: generate_session_id(config.session_id_length),
            user_id,
            created_at: now,
            last_accessed_at: now,
            expires_at: now + idle_duration,
            absolute_expires_at: now + absolute_duration,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_expired(&self) -> bool {
        let now = Utc::now();
        now > self.expires_at || now > self.absolute_expires_at
    }

    pub fn touch(&mut self, idle_timeout_minutes: i64) {
        let now = Utc::now();
        self.last_accessed_at = now;
        self.expires_at = now + Duration::minutes(idle_timeout_minutes);
    }

    pub fn time_until_expiry(&self) -> Duration {
        let idle_remaining = self.expires_at - Utc::now();
        let absolute_remaining = self.absolute_expires_at - Utc::now();

        if idle_remaining < absolute_remaining {
            idle_remaining
        } else {
            absolute_remaining
        }
    }
}

pub trait SessionStore: Send + Sync {
    fn create(&self, session: Session) -> impl std::future::Future<Output = Result<()>> + Send;
    fn get(&self, session_id: &str) -> impl std::future::Future<Output = Result<Option<Session>>> + Send;
    fn update(&self, session: &Session) -> impl std::future::Future<Output = Result<()>> + Send;
    fn delete(&self, session_id: &str) -> impl std::future::Future<Output = Result<()>> + Send;
    fn get_user_sessions(&self, user_id: i32) -> impl std::future::Future<Output = Result<Vec<Session>>> + Send;
    fn cleanup_expired(&self) -> impl std::future::Future<Output = Result<usize>> + Send;
}

#[derive(Debug, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn update(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            sessions.insert(session.id.clone(), session.clone());
            Ok(())
        } else {
            Err(anyhow!("Session not found: {}", session.id))
        }
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }

    async fn get_user_sessions(&self, user_id: i32) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let mut sessions = self.sessions.write().await;
        let initial_count = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        Ok(initial_count - sessions.len())
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct SessionRow {
    id: String,
    user_id: i32,
    created_at: NaiveDateTime,
    last_accessed_at: NaiveDateTime,
    expires_at: NaiveDateTime,
    absolute_expires_at: NaiveDateTime,
    metadata: String,
}

impl SessionRow {
    fn from_session(session: &Session) -> Result<Self> {
        Ok(Self {
            id: session.id.clone(),
            user_id: session.user_id,
            created_at: session.created_at.naive_utc(),
            last_accessed_at: session.last_accessed_at.naive_utc(),
            expires_at: session.expires_at.naive_utc(),
            absolute_expires_at: session.absolute_expires_at.naive_utc(),
            metadata: serde_json::to_string(&session.metadata)
                .context("Failed to encode session metadata")?,
        })
    }

    fn into_session(self) -> Result<Session> {
        Ok(Session {
            id: self.id,
            user_id: self.user_id,
            created_at: self.created_at.and_utc(),
            last_accessed_at: self.last_accessed_at.and_utc(),
            expires_at: self.expires_at.and_utc(),
            absolute_expires_at: self.absolute_expires_at.and_utc(),
            metadata: serde_json::from_str(&self.metadata)
                .context("Failed to decode session metadata")?,
        })
    }
}

/// Sessions persisted in the `sessions` table so they survive restarts.
#[derive(Clone)]
pub struct DatabaseSessionStore {
    pool: DbPool,
}

impl DatabaseSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl SessionStore for DatabaseSessionStore {
    async fn create(&self, session: Session) -> Result<()> {
        let row = SessionRow::from_session(&session)?;
        let mut conn = self.pool.get()?;
        diesel::insert_into(sessions::table)
            .values(&row)
            .execute(&mut conn)
            .context("Failed to insert session")?;
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let mut conn = self.pool.get()?;
        let row = sessions::table
            .find(session_id)
            .select(SessionRow::as_select())
            .first(&mut conn)
            .optional()
            .context("Failed to load session")?;
        row.map(SessionRow::into_session).transpose()
    }

    async fn update(&self, session: &Session) -> Result<()> {
        let row = SessionRow::from_session(session)?;
        let mut conn = self.pool.get()?;
        let updated = diesel::update(sessions::table.find(&session.id))
            .set(&row)
            .execute(&mut conn)
            .context("Failed to update session")?;
        if updated == 0 {
            return Err(anyhow!("Session not found: {}", session.id));
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut conn = self.pool.get()?;
        diesel::delete(sessions::table.find(session_id))
            .execute(&mut conn)
            .context("Failed to delete session")?;
        Ok(())
    }

    async fn get_user_sessions(&self, user_id: i32) -> Result<Vec<Session>> {
        let mut conn = self.pool.get()?;
        let rows = sessions::table
            .filter(sessions::user_id.eq(user_id))
            .select(SessionRow::as_select())
            .load(&mut conn)
            .context("Failed to load user sessions")?;
        rows.into_iter().map(SessionRow::into_session).collect()
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now().naive_utc();
        let mut conn = self.pool.get()?;
        let deleted = diesel::delete(
            sessions::table.filter(
                sessions::expires_at
                    .lt(now)
                    .or(sessions::absolute_expires_at.lt(now)),
            ),
        )
        .execute(&mut conn)
        .context("Failed to clean up sessions")?;
        Ok(deleted)
    }
}

/// Store selected by `session.backend`.
#[derive(Clone)]
pub enum SessionBackend {
    Memory(InMemorySessionStore),
    Database(DatabaseSessionStore),
}

impl SessionBackend {
    pub fn from_kind(kind: SessionBackendKind, pool: &DbPool) -> Self {
        match kind {
            SessionBackendKind::Memory => Self::Memory(InMemorySessionStore::new()),
            SessionBackendKind::Database => Self::Database(DatabaseSessionStore::new(pool.clone())),
        }
    }
}

impl SessionStore for SessionBackend {
    async fn create(&self, session: Session) -> Result<()> {
        match self {
            Self::Memory(store) => store.create(session).await,
            Self::Database(store) => store.create(session).await,
        }
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        match self {
            Self::Memory(store) => store.get(session_id).await,
            Self::Database(store) => store.get(session_id).await,
        }
    }

    async fn update(&self, session: &Session) -> Result<()> {
        match self {
            Self::Memory(store) => store.update(session).await,
            Self::Database(store) => store.update(session).await,
        }
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        match self {
            Self::Memory(store) => store.delete(session_id).await,
            Self::Database(store) => store.delete(session_id).await,
        }
    }

    async fn get_user_sessions(&self, user_id: i32) -> Result<Vec<Session>> {
        match self {
            Self::Memory(store) => store.get_user_sessions(user_id).await,
            Self::Database(store) => store.get_user_sessions(user_id).await,
        }
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        match self {
            Self::Memory(store) => store.cleanup_expired().await,
            Self::Database(store) => store.cleanup_expired().await,
        }
    }
}

pub struct SessionManager<S: SessionStore> {
    store: S,
    config: SessionConfig,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: S, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub async fn create_session(&self, user_id: i32, user_agent: Option<&str>) -> Result<Session> {
        let existing_sessions = self.store.get_user_sessions(user_id).await?;
        let mut active: Vec<_> = existing_sessions
            .into_iter()
            .filter(|s| !s.is_expired())
            .collect();

        if active.len() >= self.config.max_concurrent_sessions {
            active.sort_by_key(|s| s.last_accessed_at);
            let sessions_to_remove = active.len() - self.config.max_concurrent_sessions + 1;
            for session in active.iter().take(sessions_to_remove) {
                self.store.delete(&session.id).await?;
                debug!("Removed oldest session for user {user_id}");
            }
        }

        let mut session = Session::new(user_id, &self.config);
        if let Some(ua) = user_agent {
            session = session.with_metadata("user_agent", ua);
        }

        self.store.create(session.clone()).await?;
        info!("Created session for user {user_id}");

        Ok(session)
    }

    /// Returns the session when it exists and is usable, sliding its idle
    /// expiry forward. Expired sessions are removed on sight.
    pub async fn validate_session(&self, session_id: &str) -> Result<Option<Session>> {
        let mut session = match self.store.get(session_id).await? {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            self.store.delete(session_id).await?;
            debug!("Cleaned up expired session");
            return Ok(None);
        }

        session.touch(self.config.idle_timeout_minutes);
        self.store.update(&session).await?;

        Ok(Some(session))
    }

    pub async fn destroy_session(&self, session_id: &str) -> Result<()> {
        self.store.delete(session_id).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<usize> {
        let cleaned = self.store.cleanup_expired().await?;
        if cleaned > 0 {
            info!("Cleaned up {cleaned} expired sessions");
        }
        Ok(cleaned)
    }

    pub fn build_cookie(&self, session: &Session) -> Cookie<'static> {
        let max_age = session.time_until_expiry().num_seconds().max(0);

        Cookie::build((self.config.cookie_name.clone(), session.id.clone()))
            .path("/")
            .secure(self.config.cookie_secure)
            .http_only(self.config.cookie_http_only)
            .same_site(self.config.cookie_same_site.to_cookie())
            .max_age(time::Duration::seconds(max_age))
            .build()
    }

    pub fn build_removal_cookie(&self) -> Cookie<'static> {
        Cookie::build(self.config.cookie_name.clone())
            .path("/")
            .build()
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }
}

pub fn generate_session_id(length: usize) -> String {
    use rand::Rng;

    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();

    (0..length)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_touch() {
        let config = SessionConfig::default();
        let mut session = Session::new(1, &config);
        let original_expires = session.expires_at;

        std::thread::sleep(std::time::Duration::from_millis(10));
        session.touch(config.idle_timeout_minutes);

        assert!(session.expires_at > original_expires);
    }

    #[test]
    fn test_negative_idle_timeout_expires_immediately() {
        let config = SessionConfig {
            idle_timeout_minutes: -1,
            ..SessionConfig::default()
        };
        let session = Session::new(1, &config);
        assert!(session.is_expired());
    }

    #[test]
    fn test_generate_session_id() {
        let id1 = generate_session_id(32);
        let id2 = generate_session_id(32);

        assert_eq!(id1.len(), 32);
        assert!(id1.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();

        assert_eq!(config.cookie_name, "ticketdesk_session");
        assert_eq!(config.max_concurrent_sessions, 5);
        assert!(config.cookie_http_only);
        assert_eq!(config.backend, SessionBackendKind::Memory);
    }

    #[test]
    fn test_same_site_as_str() {
        assert_eq!(SameSite::Strict.as_str(), "Strict");
        assert_eq!(SameSite::Lax.as_str(), "Lax");
        assert_eq!(SameSite::None.as_str(), "None");
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemorySessionStore::new();
        let config = SessionConfig::default();
        let session = Session::new(7, &config);
        let session_id = session.id.clone();

        store.create(session.clone()).await.expect("Create failed");

        let retrieved = store.get(&session_id).await.expect("Get failed");
        assert_eq!(retrieved.as_ref().map(|s| &s.id), Some(&session_id));

        store.delete(&session_id).await.expect("Delete failed");
        let deleted = store.get(&session_id).await.expect("Get failed");
        assert!(deleted.is_none());
    }

    #[tokio::test]
    async fn test_session_manager_validate_and_destroy() {
        let manager = SessionManager::new(InMemorySessionStore::new(), SessionConfig::default());

        let session = manager
            .create_session(3, Some("Test Agent"))
            .await
            .expect("Create failed");
        assert_eq!(session.metadata.get("user_agent").map(String::as_str), Some("Test Agent"));

        let validated = manager
            .validate_session(&session.id)
            .await
            .expect("Validate failed");
        assert_eq!(validated.map(|s| s.user_id), Some(3));

        manager
            .destroy_session(&session.id)
            .await
            .expect("Destroy failed");
        let gone = manager
            .validate_session(&session.id)
            .await
            .expect("Validate failed");
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_session_limit() {
        let config = SessionConfig {
            max_concurrent_sessions: 2,
            ..SessionConfig::default()
        };
        let store = InMemorySessionStore::new();
        let manager = SessionManager::new(store.clone(), config);

        for _ in 0..4 {
            manager.create_session(9, None).await.expect("Create failed");
        }

        let sessions = store.get_user_sessions(9).await.expect("List failed");
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn test_build_cookie() {
        let manager = SessionManager::new(InMemorySessionStore::new(), SessionConfig::default());
        let session = Session::new(1, &SessionConfig::default());
        let built = manager.build_cookie(&session);

        assert_eq!(built.name(), "ticketdesk_session");
        assert_eq!(built.value(), session.id);
        assert_eq!(built.path(), Some("/"));
        assert_eq!(built.http_only(), Some(true));
        assert_eq!(built.same_site(), Some(cookie::SameSite::Lax));
    }
}
