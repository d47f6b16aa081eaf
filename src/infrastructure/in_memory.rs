use crate::domain::ports::SessionStore;
use crate::domain::session::{PurchaseSession, SessionId, Transition};
use crate::error::{PurchaseError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};

struct SessionEntry {
    session: PurchaseSession,
    updates: watch::Sender<PurchaseSession>,
}

/// A thread-safe in-memory store for purchase sessions.
///
/// Uses `Arc<RwLock<HashMap>>` for shared concurrent access. Transitions are
/// applied while holding the write lock, which makes first-terminal-wins
/// atomic: once a session is terminal, the losing transition observes it and
/// fails with `InvalidState` instead of clobbering the winner.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    by_reference: Arc<RwLock<HashMap<String, SessionId>>>,
}

impl InMemorySessionStore {
    /// Creates a new, empty session store.
    pub fn new() -> Self {
        Self::default()
    }

    fn unknown(id: SessionId) -> PurchaseError {
        PurchaseError::InvalidState(format!("unknown session {id}"))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: PurchaseSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let (updates, _) = watch::channel(session.clone());
        sessions.insert(session.id(), SessionEntry { session, updates });
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Option<PurchaseSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id).map(|entry| entry.session.clone()))
    }

    async fn apply(&self, id: SessionId, transition: Transition) -> Result<PurchaseSession> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id).ok_or_else(|| Self::unknown(id))?;
        let changed = entry.session.apply(transition)?;
        if changed {
            // Receivers may have gone away; that is not an error
            let _ = entry.updates.send(entry.session.clone());
        }
        Ok(entry.session.clone())
    }

    async fn index_reference(&self, reference: &str, id: SessionId) -> Result<()> {
        let mut by_reference = self.by_reference.write().await;
        by_reference.insert(reference.to_string(), id);
        Ok(())
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<SessionId>> {
        let by_reference = self.by_reference.read().await;
        Ok(by_reference.get(reference).copied())
    }

    async fn remove(&self, id: SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&id);
        drop(sessions);
        let mut by_reference = self.by_reference.write().await;
        by_reference.retain(|_, indexed| *indexed != id);
        Ok(())
    }

    async fn subscribe(&self, id: SessionId) -> Result<watch::Receiver<PurchaseSession>> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(&id).ok_or_else(|| Self::unknown(id))?;
        Ok(entry.updates.subscribe())
    }
}
