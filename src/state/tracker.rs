//! Mapping from live connections to the session they last joined.

use dashmap::DashMap;
use uuid::Uuid;

/// Connection-to-session index maintained in lockstep with roster membership.
///
/// A disconnect event only carries a connection id; this index finds the right
/// aggregate without scanning every session. It also defines broadcast group
/// membership: the group for a session is exactly the connections currently
/// mapped to it.
#[derive(Default)]
pub struct ConnectionTracker {
    entries: DashMap<Uuid, Uuid>,
}

impl ConnectionTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `connection_id` joined `session_id`, overwriting any
    /// previous association.
    pub fn insert(&self, connection_id: Uuid, session_id: Uuid) {
        self.entries.insert(connection_id, session_id);
    }

    /// Drop the association for a connection, returning the session it was in.
    pub fn remove(&self, connection_id: Uuid) -> Option<Uuid> {
        self.entries.remove(&connection_id).map(|(_, session)| session)
    }

    /// Session the connection last joined, if any.
    pub fn session_for(&self, connection_id: Uuid) -> Option<Uuid> {
        self.entries.get(&connection_id).map(|entry| *entry.value())
    }

    /// Connections currently associated with `session_id`.
    pub fn connections_for(&self, session_id: Uuid) -> Vec<Uuid> {
        self.entries
            .iter()
            .filter(|entry| *entry.value() == session_id)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Drop every association pointing at `session_id`, used at eviction so
    /// later disconnects from those connections become no-ops.
    pub fn remove_session(&self, session_id: Uuid) {
        self.entries.retain(|_, tracked| *tracked != session_id);
    }
}
