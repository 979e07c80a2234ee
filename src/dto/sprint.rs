//! REST payloads for session bootstrap and result queries.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::SprintResultEntity;

use super::format_epoch_ms;

/// Response returned when a session has been created.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionCreated {
    /// Identifier clients use to join and query the session.
    pub session_id: Uuid,
}

/// One persisted result row as served to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResultRow {
    /// Session the result belongs to.
    pub session_id: Uuid,
    /// Authenticated user, absent for anonymous participants.
    pub user_id: Option<Uuid>,
    /// Display name at finish time.
    pub display_name: String,
    /// Frozen tap total for the window.
    pub tap_count: u32,
    /// RFC 3339 timestamp of when the row was recorded.
    pub recorded_at: String,
}

impl From<SprintResultEntity> for ResultRow {
    fn from(value: SprintResultEntity) -> Self {
        Self {
            session_id: value.session_id,
            user_id: value.user_id,
            display_name: value.display_name,
            tap_count: value.tap_count,
            recorded_at: format_epoch_ms(value.recorded_at_ms),
        }
    }
}
