//! In-memory aggregate for one sprint session: phase machine, roster, and tap counters.

use indexmap::IndexMap;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::SprintConfig;

/// High-level phases a sprint session moves through, strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprintPhase {
    /// Session exists but no player has joined yet.
    Waiting,
    /// At least one player joined; the pre-game countdown is ticking.
    Countdown,
    /// The tap window is open and taps are counted.
    Active,
    /// The window closed; the aggregate is read-only.
    Finished,
}

impl SprintPhase {
    /// Wire name of the phase, used in roster broadcasts.
    pub fn as_str(&self) -> &'static str {
        match self {
            SprintPhase::Waiting => "waiting",
            SprintPhase::Countdown => "countdown",
            SprintPhase::Active => "active",
            SprintPhase::Finished => "finished",
        }
    }
}

/// Error returned when a join is rejected by the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// The session already entered its active window (or finished); late
    /// joiners are told, not silently dropped.
    #[error("session already started")]
    AlreadyStarted,
}

/// Player info tracked inside a session roster.
#[derive(Debug, Clone)]
pub struct Player {
    /// Connection that owns this roster entry.
    pub connection_id: Uuid,
    /// Display name, derived from the connection id when the client sent none.
    pub display_name: String,
    /// Optional authenticated identity attached at join time.
    pub user_id: Option<Uuid>,
    /// Taps accepted for this player while the session was active.
    pub tap_count: u32,
    /// Cleared on disconnect; the record is kept so accumulated taps still rank.
    pub connected: bool,
}

/// Outcome of one countdown tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownStep {
    /// Countdown continues with this many seconds remaining.
    Tick(u32),
    /// Countdown passed below zero; the session just became active.
    Started,
}

/// Tap delta reported back so it can be broadcast to the session group.
#[derive(Debug, Clone)]
pub struct TapDelta {
    /// Connection that tapped.
    pub connection_id: Uuid,
    /// Display name of the tapping player.
    pub display_name: String,
    /// New total after the increment.
    pub tap_count: u32,
}

/// One entry of the final ranking computed at the finish transition.
#[derive(Debug, Clone)]
pub struct RankedPlayer {
    /// Zero-based rank, 0 is the winner.
    pub rank: usize,
    /// Connection that owned the roster entry.
    pub connection_id: Uuid,
    /// Display name at finish time.
    pub display_name: String,
    /// Authenticated identity, when the player joined with a valid token.
    pub user_id: Option<Uuid>,
    /// Frozen tap total.
    pub tap_count: u32,
}

/// Snapshot taken exactly once when the session finishes.
#[derive(Debug, Clone)]
pub struct FinalStandings {
    /// Players ordered by tap count descending, ties broken by join order.
    pub ranked: Vec<RankedPlayer>,
}

impl FinalStandings {
    /// Rank-0 entry, absent when nobody ever joined.
    pub fn winner(&self) -> Option<&RankedPlayer> {
        self.ranked.first()
    }
}

/// Aggregated state for one sprint session.
///
/// All mutation goes through the owning `Mutex` in the registry, so methods
/// take `&mut self` and never need interior synchronisation themselves.
#[derive(Debug)]
pub struct SprintSession {
    id: Uuid,
    phase: SprintPhase,
    players: IndexMap<Uuid, Player>,
    countdown_remaining: i64,
    countdown_seconds: u32,
    window_duration_ms: u64,
    started_at: Option<Instant>,
    ends_at: Option<Instant>,
    last_activity: Instant,
}

impl SprintSession {
    /// Create a fresh session in `waiting` state, copying the timing knobs so
    /// later config changes never affect a running game.
    pub fn new(config: &SprintConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: SprintPhase::Waiting,
            players: IndexMap::new(),
            countdown_remaining: i64::from(config.countdown_seconds),
            countdown_seconds: config.countdown_seconds,
            window_duration_ms: config.window_duration_ms,
            started_at: None,
            ends_at: None,
            last_activity: Instant::now(),
        }
    }

    /// Session identifier, also the broadcast group name.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current phase.
    pub fn phase(&self) -> SprintPhase {
        self.phase
    }

    /// Length of the tap window copied from config at creation.
    pub fn window_duration_ms(&self) -> u64 {
        self.window_duration_ms
    }

    /// Instant the window opened; fixed exactly once on entering `active`.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Scheduled end of the window, never recomputed.
    pub fn ends_at(&self) -> Option<Instant> {
        self.ends_at
    }

    /// Timestamp of the last join/disconnect, used by the idle sweeper.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Register a connection as a player with a zeroed tap counter.
    ///
    /// Rejects with [`JoinError::AlreadyStarted`] once the session is active
    /// or finished; joining mid-countdown is allowed.
    pub fn join(
        &mut self,
        connection_id: Uuid,
        display_name: Option<String>,
        user_id: Option<Uuid>,
    ) -> Result<(), JoinError> {
        match self.phase {
            SprintPhase::Waiting | SprintPhase::Countdown => {}
            SprintPhase::Active | SprintPhase::Finished => return Err(JoinError::AlreadyStarted),
        }

        let display_name =
            display_name.unwrap_or_else(|| anonymous_display_name(&connection_id));
        self.players.insert(
            connection_id,
            Player {
                connection_id,
                display_name,
                user_id,
                tap_count: 0,
                connected: true,
            },
        );
        self.last_activity = Instant::now();
        Ok(())
    }

    /// Flip `waiting` to `countdown`, resetting the remaining seconds.
    ///
    /// Returns `false` when the session is past `waiting`, so a racing second
    /// join cannot restart the countdown.
    pub fn begin_countdown(&mut self) -> bool {
        if self.phase != SprintPhase::Waiting {
            return false;
        }
        self.phase = SprintPhase::Countdown;
        self.countdown_remaining = i64::from(self.countdown_seconds);
        true
    }

    /// Apply one countdown tick.
    ///
    /// Returns `None` when the session is not counting down (stale timer);
    /// [`CountdownStep::Started`] marks the transition into the active window
    /// and fixes `started_at`/`ends_at` exactly once.
    pub fn tick_countdown(&mut self) -> Option<CountdownStep> {
        if self.phase != SprintPhase::Countdown {
            return None;
        }

        self.countdown_remaining -= 1;
        if self.countdown_remaining >= 0 {
            return Some(CountdownStep::Tick(self.countdown_remaining as u32));
        }

        let now = Instant::now();
        self.phase = SprintPhase::Active;
        self.started_at = Some(now);
        self.ends_at = Some(now + std::time::Duration::from_millis(self.window_duration_ms));
        Some(CountdownStep::Started)
    }

    /// Count one tap for a connected player while the window is open.
    ///
    /// Taps for unknown connections, disconnected players, or outside the
    /// active phase are stale network events and silently ignored.
    pub fn record_tap(&mut self, connection_id: Uuid) -> Option<TapDelta> {
        if self.phase != SprintPhase::Active {
            return None;
        }
        let player = self.players.get_mut(&connection_id)?;
        if !player.connected {
            return None;
        }
        player.tap_count += 1;
        Some(TapDelta {
            connection_id,
            display_name: player.display_name.clone(),
            tap_count: player.tap_count,
        })
    }

    /// Close the tap window and freeze the final standings.
    ///
    /// Only valid from `active`; returns `None` for stale or duplicate timer
    /// callbacks. Disconnected players keep their accumulated taps and are
    /// still ranked.
    pub fn finish(&mut self) -> Option<FinalStandings> {
        if self.phase != SprintPhase::Active {
            return None;
        }
        self.phase = SprintPhase::Finished;

        // IndexMap preserves join order, so a stable sort on tap count keeps
        // earlier joiners ahead on ties.
        let mut ranked: Vec<RankedPlayer> = self
            .players
            .values()
            .map(|player| RankedPlayer {
                rank: 0,
                connection_id: player.connection_id,
                display_name: player.display_name.clone(),
                user_id: player.user_id,
                tap_count: player.tap_count,
            })
            .collect();
        ranked.sort_by(|a, b| b.tap_count.cmp(&a.tap_count));
        for (index, entry) in ranked.iter_mut().enumerate() {
            entry.rank = index;
        }

        Some(FinalStandings { ranked })
    }

    /// Handle a disconnect for `connection_id`.
    ///
    /// Before the game starts the roster entry is removed outright (nothing to
    /// tally); during the active window the record is kept with `connected`
    /// cleared so the player's taps still count at finish. Returns `true`
    /// when the roster changed.
    pub fn mark_disconnected(&mut self, connection_id: Uuid) -> bool {
        match self.phase {
            SprintPhase::Waiting | SprintPhase::Countdown => {
                let removed = self.players.shift_remove(&connection_id).is_some();
                if removed {
                    self.last_activity = Instant::now();
                }
                removed
            }
            SprintPhase::Active => match self.players.get_mut(&connection_id) {
                Some(player) if player.connected => {
                    player.connected = false;
                    true
                }
                _ => false,
            },
            // Read-only once finished.
            SprintPhase::Finished => false,
        }
    }

    /// Iterate the current roster in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }
}

/// Stable anonymous label derived from the connection id.
fn anonymous_display_name(connection_id: &Uuid) -> String {
    let simple = connection_id.simple().to_string();
    format!("player-{}", &simple[..6])
}
