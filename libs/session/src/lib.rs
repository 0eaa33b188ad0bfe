mod context;
mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;

pub use context::{Context, Slot};
pub use memory::MemorySessionStore;

/// Shared session store handle used across the service.
pub type SharedSessionStore = Arc<dyn SessionStore>;

/// Guard returned by [`SessionStore::lock`]; the session is exclusively held
/// until it is dropped.
pub type SessionGuard = OwnedMutexGuard<()>;

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Conversation state for one Messenger user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub external_user_id: String,
    pub context: Context,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl SessionRecord {
    pub fn new(external_user_id: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: SessionId::generate(),
            external_user_id: external_user_id.into(),
            context: Context::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the session bound to `external_user_id`, creating an empty one
    /// on first contact.
    async fn get_or_create(&self, external_user_id: &str) -> Result<SessionRecord>;
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>>;
    /// Replaces the stored context and refreshes `updated_at`. Returns false
    /// when the session no longer exists.
    async fn update_context(&self, id: &SessionId, context: Context) -> Result<bool>;
    async fn evict(&self, id: &SessionId) -> Result<()>;
    /// Evicts every session last updated before `cutoff`; returns how many.
    async fn evict_idle_since(&self, cutoff: OffsetDateTime) -> Result<usize>;
    /// Serializes work on one session across concurrent webhook events.
    async fn lock(&self, id: &SessionId) -> SessionGuard;
    async fn len(&self) -> usize;
}

/// Returns an in-memory session store wrapped in an [`Arc`].
pub fn shared_memory_store() -> SharedSessionStore {
    Arc::new(MemorySessionStore::new())
}

/// Periodically evicts sessions idle for longer than `ttl`.
pub fn spawn_idle_sweeper(
    store: SharedSessionStore,
    ttl: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let cutoff = OffsetDateTime::now_utc() - ttl;
            match store.evict_idle_since(cutoff).await {
                Ok(0) => {}
                Ok(evicted) => tracing::info!(evicted, "evicted idle sessions"),
                Err(err) => tracing::warn!(error = %err, "session sweep failed"),
            }
        }
    })
}
