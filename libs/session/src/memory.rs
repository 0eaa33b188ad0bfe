use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use metrics::counter;
use sos_telemetry::{SESSIONS_CREATED, SESSIONS_EVICTED};
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::{Context, SessionGuard, SessionId, SessionRecord, SessionStore};

#[derive(Default)]
pub struct MemorySessionStore {
    by_session: DashMap<SessionId, SessionRecord>,
    by_user: DashMap<String, SessionId>,
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn remove(&self, id: &SessionId) -> bool {
        let Some((_, record)) = self.by_session.remove(id) else {
            return false;
        };
        self.by_user
            .remove_if(&record.external_user_id, |_, bound| bound == id);
        self.locks.remove(id);
        true
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_or_create(&self, external_user_id: &str) -> Result<SessionRecord> {
        // The user entry guard is held while the record is inserted so two
        // first messages from one user cannot create two sessions.
        let entry = self.by_user.entry(external_user_id.to_string());
        let id = match entry {
            dashmap::Entry::Occupied(occupied) => {
                let id = occupied.get().clone();
                if let Some(record) = self.by_session.get(&id) {
                    return Ok(record.value().clone());
                }
                // Dangling binding: fall through and replace it.
                let record = SessionRecord::new(external_user_id);
                let new_id = record.id.clone();
                self.by_session.insert(new_id.clone(), record);
                occupied.replace_entry(new_id.clone());
                new_id
            }
            dashmap::Entry::Vacant(vacant) => {
                let record = SessionRecord::new(external_user_id);
                let id = record.id.clone();
                self.by_session.insert(id.clone(), record);
                vacant.insert(id.clone());
                id
            }
        };
        counter!(SESSIONS_CREATED).increment(1);
        tracing::debug!(session_id = %id, user = external_user_id, "created session");
        self.by_session
            .get(&id)
            .map(|record| record.value().clone())
            .ok_or_else(|| anyhow::anyhow!("session {id} vanished during creation"))
    }

    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        Ok(self.by_session.get(id).map(|entry| entry.value().clone()))
    }

    async fn update_context(&self, id: &SessionId, context: Context) -> Result<bool> {
        match self.by_session.get_mut(id) {
            Some(mut record) => {
                record.context = context;
                record.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn evict(&self, id: &SessionId) -> Result<()> {
        if self.remove(id) {
            counter!(SESSIONS_EVICTED).increment(1);
        }
        Ok(())
    }

    async fn evict_idle_since(&self, cutoff: OffsetDateTime) -> Result<usize> {
        let idle: Vec<SessionId> = self
            .by_session
            .iter()
            .filter(|entry| entry.value().updated_at < cutoff)
            .map(|entry| entry.key().clone())
            .collect();
        let evicted = idle.iter().filter(|id| self.remove(id)).count();
        if evicted > 0 {
            counter!(SESSIONS_EVICTED).increment(evicted as u64);
        }
        Ok(evicted)
    }

    async fn lock(&self, id: &SessionId) -> SessionGuard {
        let mutex = self
            .locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        mutex.lock_owned().await
    }

    async fn len(&self) -> usize {
        self.by_session.len()
    }
}
