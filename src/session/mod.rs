use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Session key holding the authenticated account id
pub const UID: &str = "UID";

/// Session key holding the anti-forgery token
pub const CSRF: &str = "CSRF";

/// Lifetime of a session nobody has saved or refreshed yet
pub const FRESH_SESSION_SECS: i64 = 900;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session store error: {0}")]
    Store(String),
}

/// Server-side key/value session bound to one client
#[async_trait]
pub trait SessionStore: Send + Sync {
    fn id(&self) -> &str;

    fn get(&self, key: &str) -> Option<&Value>;

    fn set(&mut self, key: &str, value: Value);

    fn remove(&mut self, key: &str) -> bool;

    async fn save(&mut self) -> Result<(), SessionError>;

    fn is_expired(&self) -> bool {
        false
    }

    /// Push the expiry out by another TTL, in the backing store as well
    async fn refresh(&mut self) {}
}

#[derive(Debug, Clone)]
struct SessionRecord {
    values: HashMap<String, Value>,
    expires_at: DateTime<Utc>,
}

/// In-process session registry keyed by session id
#[derive(Clone)]
pub struct SessionManager {
    records: Arc<RwLock<HashMap<String, SessionRecord>>>,
    ttl: Duration,
    fresh_ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs),
            fresh_ttl: Duration::seconds(ttl_secs.min(FRESH_SESSION_SECS)),
        }
    }

    /// Override how long an untouched new session is kept
    pub fn with_fresh_ttl(mut self, secs: i64) -> Self {
        self.fresh_ttl = Duration::seconds(secs.min(self.ttl.num_seconds()));
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Open the session for `id`, starting a fresh one when the id is unknown or expired.
    /// Returns the session and whether it was newly created.
    pub async fn open(&self, id: Option<&str>) -> (ManagedSession, bool) {
        let now = Utc::now();

        if let Some(id) = id {
            let mut records = self.records.write().await;
            match records.get(id).cloned() {
                Some(record) if record.expires_at > now => {
                    let session = ManagedSession {
                        id: id.to_string(),
                        values: record.values,
                        expires_at: record.expires_at,
                        ttl: self.ttl,
                        manager: self.clone(),
                    };
                    return (session, false);
                }
                Some(_) => {
                    debug!("Session {} expired, starting a new one", id);
                    records.remove(id);
                }
                None => {}
            }
        }

        (self.create().await, true)
    }

    async fn create(&self) -> ManagedSession {
        let id = Self::new_id();
        let mut values = HashMap::new();
        values.insert(CSRF.to_string(), Value::String(Uuid::new_v4().simple().to_string()));

        // anonymous traffic must not pin a record for the full TTL
        let expires_at = Utc::now() + self.fresh_ttl;
        self.records.write().await.insert(
            id.clone(),
            SessionRecord {
                values: values.clone(),
                expires_at,
            },
        );

        ManagedSession {
            id,
            values,
            expires_at,
            ttl: self.ttl,
            manager: self.clone(),
        }
    }

    async fn store(&self, session: &ManagedSession) {
        self.records.write().await.insert(
            session.id.clone(),
            SessionRecord {
                values: session.values.clone(),
                expires_at: session.expires_at,
            },
        );
    }

    /// Move the stored expiry of `id` without touching its values
    async fn touch(&self, id: &str, expires_at: DateTime<Utc>) -> bool {
        match self.records.write().await.get_mut(id) {
            Some(record) => {
                record.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    /// Drop every expired record; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.expires_at > now);
        let removed = before - records.len();

        if removed > 0 {
            info!("Purged {} expired sessions", removed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

/// Working copy of a session; `save` writes it back to the manager
pub struct ManagedSession {
    id: String,
    values: HashMap<String, Value>,
    expires_at: DateTime<Utc>,
    ttl: Duration,
    manager: SessionManager,
}

impl ManagedSession {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[async_trait]
impl SessionStore for ManagedSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    async fn save(&mut self) -> Result<(), SessionError> {
        self.expires_at = Utc::now() + self.ttl;
        self.manager.store(self).await;
        Ok(())
    }

    fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    async fn refresh(&mut self) {
        self.expires_at = Utc::now() + self.ttl;
        if !self.manager.touch(&self.id, self.expires_at).await {
            debug!("Session {} vanished before refresh", self.id);
        }
    }
}
