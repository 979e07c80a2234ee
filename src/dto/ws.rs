//! WebSocket protocol between sprint clients and the backend.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::ServiceError,
    state::session::{FinalStandings, RankedPlayer, SprintSession, TapDelta},
};

/// Maximum accepted length for a client-chosen display name.
const MAX_DISPLAY_NAME_LEN: usize = 32;

/// Messages accepted from sprint WebSocket clients.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SprintInboundMessage {
    /// Join a session, optionally with a display name and an auth token.
    Join {
        /// Target session id.
        session_id: Uuid,
        /// Chosen display name; an anonymous label is derived when absent.
        #[serde(default)]
        display_name: Option<String>,
        /// Bearer token resolved into a user id when present.
        #[serde(default)]
        token: Option<String>,
    },
    /// One unit of input during the active window.
    Tap {
        /// Target session id.
        session_id: Uuid,
    },
}

impl SprintInboundMessage {
    /// Parse and validate an inbound frame, rejecting malformed payloads at
    /// the boundary before they reach any aggregate.
    pub fn from_json_str(raw: &str) -> Result<Self, ServiceError> {
        let message: Self = serde_json::from_str(raw)
            .map_err(|err| ServiceError::InvalidEvent(err.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    fn validate(&self) -> Result<(), ServiceError> {
        if let Self::Join {
            display_name: Some(name),
            ..
        } = self
        {
            if name.trim().is_empty() {
                return Err(ServiceError::InvalidEvent("display name is empty".into()));
            }
            if name.chars().count() > MAX_DISPLAY_NAME_LEN {
                return Err(ServiceError::InvalidEvent(format!(
                    "display name exceeds {MAX_DISPLAY_NAME_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

/// Roster entry as broadcast to the session group.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// Connection that owns the roster entry.
    pub connection_id: Uuid,
    /// Display name shown to other players.
    pub display_name: String,
    /// Current tap total.
    pub tap_count: u32,
    /// Whether the connection is still open.
    pub connected: bool,
}

/// One ranked line of the final standings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RankedResult {
    /// Zero-based rank, 0 is the winner.
    pub rank: usize,
    /// Connection that owned the roster entry.
    pub connection_id: Uuid,
    /// Display name at finish time.
    pub display_name: String,
    /// Frozen tap total.
    pub tap_count: u32,
}

impl From<&RankedPlayer> for RankedResult {
    fn from(value: &RankedPlayer) -> Self {
        Self {
            rank: value.rank,
            connection_id: value.connection_id,
            display_name: value.display_name.clone(),
            tap_count: value.tap_count,
        }
    }
}

/// Events broadcast to every connection in a session group.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SprintOutboundMessage {
    /// Roster or phase changed.
    RosterUpdated {
        /// Current roster in join order.
        players: Vec<PlayerSummary>,
        /// Current phase name.
        status: String,
    },
    /// One countdown second elapsed.
    CountdownTick {
        /// Seconds left before the window opens.
        seconds_remaining: u32,
    },
    /// The tap window just opened.
    GameStarted {
        /// Window length in milliseconds.
        duration_ms: u64,
    },
    /// A tap was accepted.
    TapUpdated {
        /// Connection that tapped.
        connection_id: Uuid,
        /// Display name of the tapping player.
        display_name: String,
        /// New total after the increment.
        tap_count: u32,
    },
    /// The window closed and standings are final.
    GameFinished {
        /// Players ordered by rank.
        ranked_results: Vec<RankedResult>,
        /// Rank-0 entry, absent when nobody joined.
        winner: Option<RankedResult>,
    },
    /// A surfaced rejection, sent only to the offending connection.
    SprintError {
        /// Stable machine-readable code.
        code: String,
        /// Human readable description.
        message: String,
    },
}

impl SprintOutboundMessage {
    /// Roster broadcast built from the current aggregate state.
    pub fn roster(session: &SprintSession) -> Self {
        Self::RosterUpdated {
            players: session
                .players()
                .map(|player| PlayerSummary {
                    connection_id: player.connection_id,
                    display_name: player.display_name.clone(),
                    tap_count: player.tap_count,
                    connected: player.connected,
                })
                .collect(),
            status: session.phase().as_str().to_string(),
        }
    }

    /// Tap broadcast built from an accepted delta.
    pub fn tap(delta: &TapDelta) -> Self {
        Self::TapUpdated {
            connection_id: delta.connection_id,
            display_name: delta.display_name.clone(),
            tap_count: delta.tap_count,
        }
    }

    /// Final standings broadcast built from the finish snapshot.
    pub fn finished(standings: &FinalStandings) -> Self {
        Self::GameFinished {
            ranked_results: standings.ranked.iter().map(RankedResult::from).collect(),
            winner: standings.winner().map(RankedResult::from),
        }
    }

    /// Error frame for a surfaced rejection.
    pub fn error(err: &ServiceError) -> Self {
        Self::SprintError {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
