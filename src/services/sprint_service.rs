//! Inbound sprint operations: session bootstrap, joins, taps, disconnects,
//! and result queries.

use tracing::info;
use uuid::Uuid;

use crate::{
    dto::{sprint::ResultRow, ws::SprintOutboundMessage},
    error::ServiceError,
    services::{broadcast, orchestrator},
    state::SharedState,
};

/// Allocate a fresh session in `waiting` state and return its id.
pub fn create_session(state: &SharedState) -> Uuid {
    let (session_id, _handle) = state.registry().create(state.config().sprint());
    info!(session_id = %session_id, "sprint session created");
    session_id
}

/// Register `connection_id` as a player of `session_id`.
///
/// The first successful join flips the session into countdown and hands the
/// timers to the orchestrator. The roster broadcast doubles as the join
/// acknowledgement: the tracker entry is inserted first, so the joiner
/// receives the current roster and status immediately.
pub async fn join(
    state: &SharedState,
    connection_id: Uuid,
    session_id: Uuid,
    display_name: Option<String>,
    user_id: Option<Uuid>,
) -> Result<(), ServiceError> {
    let handle = state
        .registry()
        .get(session_id)
        .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))?;

    // A connection belongs to at most one session. Joining a new one leaves
    // the previous session through the regular disconnect path, before the
    // new session lock is taken so only one session is ever locked at a time.
    if state
        .tracker()
        .session_for(connection_id)
        .is_some_and(|previous| previous != session_id)
    {
        disconnect(state, connection_id).await;
    }

    let mut session = handle.lock().await;
    session.join(connection_id, display_name, user_id)?;
    state.tracker().insert(connection_id, session_id);

    let countdown_began = session.begin_countdown();
    broadcast::broadcast_to_session(state, session_id, &SprintOutboundMessage::roster(&session));
    drop(session);

    if countdown_began {
        info!(session_id = %session_id, "first player joined; countdown begins");
        orchestrator::spawn_countdown(state.clone(), session_id);
    }
    Ok(())
}

/// Count one tap for the calling connection.
///
/// Taps against unknown sessions or outside the active window are ordinary
/// network races, not caller misuse, and are dropped silently.
pub async fn tap(state: &SharedState, connection_id: Uuid, session_id: Uuid) {
    let Some(handle) = state.registry().get(session_id) else {
        return;
    };

    let mut session = handle.lock().await;
    if let Some(delta) = session.record_tap(connection_id) {
        broadcast::broadcast_to_session(state, session_id, &SprintOutboundMessage::tap(&delta));
    }
}

/// Handle a closed connection, updating whichever session it last joined.
///
/// Tolerates connections that never joined and sessions already finished or
/// evicted.
pub async fn disconnect(state: &SharedState, connection_id: Uuid) {
    let Some(session_id) = state.tracker().remove(connection_id) else {
        return;
    };
    let Some(handle) = state.registry().get(session_id) else {
        return;
    };

    let mut session = handle.lock().await;
    if session.mark_disconnected(connection_id) {
        broadcast::broadcast_to_session(
            state,
            session_id,
            &SprintOutboundMessage::roster(&session),
        );
    }
}

/// Persisted results for a session, tap count descending.
///
/// Durable rows outlive the in-memory aggregate, so this keeps answering
/// after eviction for as long as the store retains the rows.
pub async fn session_results(
    state: &SharedState,
    session_id: Uuid,
) -> Result<Vec<ResultRow>, ServiceError> {
    let store = state.require_result_store().await?;
    let rows = store.read_results(session_id).await?;

    if rows.is_empty() && state.registry().get(session_id).is_none() {
        return Err(ServiceError::SessionNotFound(session_id.to_string()));
    }

    Ok(rows.into_iter().map(Into::into).collect())
}
