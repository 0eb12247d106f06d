use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use concierge_core::ConversationSession;
use tokio::sync::Mutex;

/// A session shared between transports. The orchestrator holds the lock for a whole turn.
pub type SharedSession = Arc<Mutex<ConversationSession>>;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, session_id: &str, app_id: &str, user_id: &str) -> SharedSession {
        if let Some(existing) = self.get(session_id) {
            return existing;
        }
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(session_id.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(ConversationSession::new(session_id, app_id, user_id)))
        }))
    }

    pub fn get(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).get(session_id).cloned()
    }

    pub fn remove(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner).remove(session_id)
    }

    pub fn clear(&self) {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
