use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use orderly_core::domain::session::{SenderId, Session};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store backend failure: {0}")]
    Backend(String),
}

/// Per-sender conversation state storage. `get_or_create` atomically installs
/// a fresh session for an unseen sender and reports `was_new` so the caller
/// can greet instead of interpreting the first message.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_or_create(
        &self,
        sender: &SenderId,
        now: DateTime<Utc>,
    ) -> Result<(Session, bool), StoreError>;

    async fn save(&self, session: Session) -> Result<(), StoreError>;

    async fn delete(&self, sender: &SenderId) -> Result<(), StoreError>;

    /// Drops sessions idle for longer than `max_idle`; returns how many were
    /// removed.
    async fn evict_idle(
        &self,
        max_idle: Duration,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(
        &self,
        sender: &SenderId,
        now: DateTime<Utc>,
    ) -> Result<(Session, bool), StoreError> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(&sender.0) {
            return Ok((session.clone(), false));
        }

        let session = Session::new(sender.clone(), now);
        sessions.insert(sender.0.clone(), session.clone());
        Ok((session, true))
    }

    async fn save(&self, session: Session) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.sender.0.clone(), session);
        Ok(())
    }

    async fn delete(&self, sender: &SenderId) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&sender.0);
        Ok(())
    }

    async fn evict_idle(
        &self,
        max_idle: Duration,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.idle_since(now) <= max_idle);
        Ok(before - sessions.len())
    }
}
