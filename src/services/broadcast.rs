//! Best-effort event delivery to the connections of one session group.

use axum::extract::ws::Message;
use tracing::warn;
use uuid::Uuid;

use crate::{dto::ws::SprintOutboundMessage, state::AppState};

/// Deliver `message` to every connection currently tracked for `session_id`,
/// and to no others.
///
/// Membership is recomputed from the connection tracker on every call, so
/// there is no hidden group state to fall out of sync. Delivery is
/// best-effort: closed writer channels are skipped. Per-session ordering holds
/// because callers broadcast while holding the session mutex and each
/// connection drains a FIFO channel.
pub fn broadcast_to_session(state: &AppState, session_id: Uuid, message: &SprintOutboundMessage) {
    let Some(payload) = serialize(message) else {
        return;
    };

    for connection_id in state.tracker().connections_for(session_id) {
        if let Some(connection) = state.connections().get(&connection_id) {
            let _ = connection.tx.send(Message::Text(payload.clone().into()));
        }
    }
}

/// Deliver `message` to a single connection, used for surfaced rejections.
pub fn send_to_connection(state: &AppState, connection_id: Uuid, message: &SprintOutboundMessage) {
    let Some(payload) = serialize(message) else {
        return;
    };

    if let Some(connection) = state.connections().get(&connection_id) {
        let _ = connection.tx.send(Message::Text(payload.into()));
    }
}

fn serialize(message: &SprintOutboundMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(error = %err, "failed to serialize outbound sprint event");
            None
        }
    }
}
