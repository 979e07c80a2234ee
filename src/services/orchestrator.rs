//! Timer-driven phase transitions: countdown ticks, the end-of-window
//! deadline, post-finish eviction, and idle-session reaping.
//!
//! Every timer callback re-resolves the session through the registry and
//! re-checks its phase under the lock before acting, so a late-firing timer
//! can never race a concurrent join or tap into an invalid transition.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::{Instant, interval, sleep, sleep_until};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    dao::{models::SprintResultEntity, result_store::ResultStore},
    dto::ws::SprintOutboundMessage,
    services::broadcast,
    state::{SharedState, session::{CountdownStep, FinalStandings, SprintPhase}},
};

/// How often the idle sweeper scans the registry.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);
/// Best-effort attempts per result row before giving up.
const PERSIST_ATTEMPTS: u32 = 2;

/// Drive the countdown for a session with a 1-second periodic tick.
pub fn spawn_countdown(state: SharedState, session_id: Uuid) {
    tokio::spawn(run_countdown(state, session_id));
}

async fn run_countdown(state: SharedState, session_id: Uuid) {
    let mut ticker = interval(Duration::from_secs(1));
    // The first tick of a tokio interval completes immediately; consume it so
    // the countdown decrements once per elapsed second.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(handle) = state.registry().get(session_id) else {
            return;
        };
        let mut session = handle.lock().await;
        match session.tick_countdown() {
            Some(CountdownStep::Tick(seconds_remaining)) => {
                broadcast::broadcast_to_session(
                    &state,
                    session_id,
                    &SprintOutboundMessage::CountdownTick { seconds_remaining },
                );
            }
            Some(CountdownStep::Started) => {
                let duration_ms = session.window_duration_ms();
                // The aggregate stamped the deadline when it flipped to
                // active; one deferred sleep until that instant instead of a
                // tick-counted loop, so many ticks cannot accumulate drift.
                let deadline = session
                    .ends_at()
                    .unwrap_or_else(|| Instant::now() + Duration::from_millis(duration_ms));
                broadcast::broadcast_to_session(
                    &state,
                    session_id,
                    &SprintOutboundMessage::GameStarted { duration_ms },
                );
                drop(session);

                info!(session_id = %session_id, duration_ms, "sprint window opened");
                spawn_finish(state.clone(), session_id, deadline);
                return;
            }
            // Session gone or no longer counting down; this timer is stale.
            None => return,
        }
    }
}

fn spawn_finish(state: SharedState, session_id: Uuid, deadline: Instant) {
    tokio::spawn(async move {
        sleep_until(deadline).await;
        finish_session(state, session_id).await;
    });
}

async fn finish_session(state: SharedState, session_id: Uuid) {
    let Some(handle) = state.registry().get(session_id) else {
        return;
    };

    let mut session = handle.lock().await;
    let window_elapsed_ms = session
        .started_at()
        .map(|started| started.elapsed().as_millis() as u64)
        .unwrap_or_default();
    let Some(standings) = session.finish() else {
        warn!(session_id = %session_id, "stale finish timer ignored");
        return;
    };
    // Standings reach connected clients before any storage I/O happens; the
    // game's outcome is already determined in memory.
    broadcast::broadcast_to_session(
        &state,
        session_id,
        &SprintOutboundMessage::finished(&standings),
    );
    drop(session);

    info!(
        session_id = %session_id,
        players = standings.ranked.len(),
        window_elapsed_ms,
        winner = standings.winner().map(|w| w.display_name.as_str()).unwrap_or("none"),
        "sprint finished"
    );

    tokio::spawn(persist_standings(state.clone(), session_id, standings));

    let grace = state.config().sprint().finish_grace;
    tokio::spawn(async move {
        sleep(grace).await;
        state.registry().remove(session_id);
        state.tracker().remove_session(session_id);
        info!(session_id = %session_id, "evicted finished session");
    });
}

async fn persist_standings(state: SharedState, session_id: Uuid, standings: FinalStandings) {
    let Some(store) = state.result_store().await else {
        warn!(session_id = %session_id, "no result store installed; results not persisted");
        return;
    };

    let recorded_at_ms = epoch_ms_now();
    for entry in &standings.ranked {
        let row = SprintResultEntity {
            session_id,
            connection_id: entry.connection_id,
            user_id: entry.user_id,
            display_name: entry.display_name.clone(),
            tap_count: entry.tap_count,
            recorded_at_ms,
        };
        write_with_retry(store.as_ref(), row).await;
    }
}

async fn write_with_retry(store: &dyn ResultStore, row: SprintResultEntity) {
    for attempt in 1..=PERSIST_ATTEMPTS {
        match store.write_result(row.clone()).await {
            Ok(()) => return,
            Err(err) if attempt < PERSIST_ATTEMPTS => {
                warn!(
                    session_id = %row.session_id,
                    connection_id = %row.connection_id,
                    attempt,
                    error = %err,
                    "result write failed; retrying"
                );
            }
            Err(err) => {
                error!(
                    session_id = %row.session_id,
                    connection_id = %row.connection_id,
                    error = %err,
                    "giving up on result write"
                );
            }
        }
    }
}

/// Periodically evict `waiting` sessions nobody ever joined, so abandoned
/// aggregates do not leak for the process lifetime.
pub fn spawn_idle_sweeper(state: SharedState) {
    tokio::spawn(async move {
        let mut ticker = interval(SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_idle_sessions(&state).await;
        }
    });
}

/// One sweep over the registry, exposed separately so tests can drive it.
pub async fn sweep_idle_sessions(state: &SharedState) {
    let idle_timeout = state.config().sprint().idle_timeout;

    for session_id in state.registry().session_ids() {
        let Some(handle) = state.registry().get(session_id) else {
            continue;
        };
        let session = handle.lock().await;
        let reap = session.phase() == SprintPhase::Waiting
            && session.is_empty()
            && session.last_activity().elapsed() >= idle_timeout;
        drop(session);

        if reap {
            state.registry().remove(session_id);
            info!(
                session_id = %session_id,
                live_sessions = state.registry().session_count(),
                "reaped idle waiting session"
            );
        }
    }
}

fn epoch_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
