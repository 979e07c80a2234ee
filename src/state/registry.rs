//! Registry of live sprint sessions, the single source of truth for existence.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::SprintConfig;

use super::session::SprintSession;

/// Shared handle to one session aggregate.
///
/// The mutex serialises every mutation (join, tap, tick, finish) for that
/// session while leaving unrelated sessions fully concurrent.
pub type SessionHandle = Arc<Mutex<SprintSession>>;

/// Concurrent map from session id to live aggregate.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session in `waiting` state and insert it.
    pub fn create(&self, config: &SprintConfig) -> (Uuid, SessionHandle) {
        let session = SprintSession::new(config);
        let id = session.id();
        let handle: SessionHandle = Arc::new(Mutex::new(session));
        self.sessions.insert(id, handle.clone());
        (id, handle)
    }

    /// Look up a live session by id.
    pub fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    /// Evict a session; removing a missing id is not an error.
    pub fn remove(&self, id: Uuid) {
        self.sessions.remove(&id);
    }

    /// Ids of all live sessions, snapshotted for the idle sweeper.
    pub fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
