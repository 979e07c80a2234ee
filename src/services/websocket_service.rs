//! Lifecycle handling for individual sprint WebSocket connections.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{SprintInboundMessage, SprintOutboundMessage},
    services::{broadcast, sprint_service},
    state::{SharedState, SprintConnection},
};

/// Handle the full lifecycle for an individual sprint WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we
    // await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    state.connections().insert(
        connection_id,
        SprintConnection {
            tx: outbound_tx.clone(),
        },
    );
    info!(id = %connection_id, "sprint client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                handle_inbound(&state, connection_id, &text).await;
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(id = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.connections().remove(&connection_id);
    sprint_service::disconnect(&state, connection_id).await;
    info!(id = %connection_id, "sprint client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Parse one text frame and dispatch it to the sprint service.
///
/// Surfaced rejections (unknown session, late join, malformed payload) go
/// back to the offending connection only.
async fn handle_inbound(state: &SharedState, connection_id: Uuid, text: &str) {
    match SprintInboundMessage::from_json_str(text) {
        Ok(SprintInboundMessage::Join {
            session_id,
            display_name,
            token,
        }) => {
            let user_id = resolve_user(state, token.as_deref()).await;
            if let Err(err) =
                sprint_service::join(state, connection_id, session_id, display_name, user_id).await
            {
                info!(id = %connection_id, session_id = %session_id, error = %err, "join rejected");
                broadcast::send_to_connection(
                    state,
                    connection_id,
                    &SprintOutboundMessage::error(&err),
                );
            }
        }
        Ok(SprintInboundMessage::Tap { session_id }) => {
            sprint_service::tap(state, connection_id, session_id).await;
        }
        Err(err) => {
            warn!(id = %connection_id, error = %err, "rejected malformed sprint message");
            broadcast::send_to_connection(
                state,
                connection_id,
                &SprintOutboundMessage::error(&err),
            );
        }
    }
}

/// Attach an authenticated user id when the caller presented a valid token.
///
/// Invalid tokens are not an error; the player just joins anonymously.
async fn resolve_user(state: &SharedState, token: Option<&str>) -> Option<Uuid> {
    let token = token?;
    let resolver = state.identity_resolver().await?;
    match resolver.resolve(token).await {
        Some(identity) => Some(identity.user_id),
        None => {
            warn!("invalid token presented on join; continuing anonymously");
            None
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
