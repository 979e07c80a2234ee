//! Database model definitions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One persisted sprint result row, written once per player when a session
/// finishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SprintResultEntity {
    /// Session the result belongs to; query key for result lookups.
    pub session_id: Uuid,
    /// Connection that produced the taps.
    pub connection_id: Uuid,
    /// Authenticated user, absent for anonymous participants.
    pub user_id: Option<Uuid>,
    /// Display name at finish time.
    pub display_name: String,
    /// Frozen tap total for the window.
    pub tap_count: u32,
    /// Unix epoch milliseconds when the row was recorded.
    pub recorded_at_ms: u64,
}
