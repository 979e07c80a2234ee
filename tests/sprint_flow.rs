//! End-to-end sprint flows driven through the service layer with a paused
//! tokio clock, covering countdown, the tap window, ranking, persistence,
//! eviction, and cross-session isolation.

use std::{sync::Arc, time::Duration};

use axum::extract::ws::Message;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::sleep;
use uuid::Uuid;

use sprint_back::{
    config::{AppConfig, SprintConfig},
    dao::result_store::{ResultStore, memory::MemoryResultStore},
    services::{orchestrator, sprint_service},
    state::{AppState, SharedState, SprintConnection, session::SprintPhase},
};

const COUNTDOWN_SECONDS: u32 = 3;
const WINDOW_MS: u64 = 15_000;

async fn test_state() -> (SharedState, Arc<MemoryResultStore>) {
    let state = AppState::new(AppConfig::with_sprint(SprintConfig {
        countdown_seconds: COUNTDOWN_SECONDS,
        window_duration_ms: WINDOW_MS,
        finish_grace: Duration::from_secs(30),
        idle_timeout: Duration::from_secs(300),
    }));
    let store = Arc::new(MemoryResultStore::new());
    state
        .install_result_store(store.clone() as Arc<dyn ResultStore>)
        .await;
    (state, store)
}

/// Register a fake client connection and keep its receive side.
fn attach_client(state: &SharedState) -> (Uuid, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = Uuid::new_v4();
    state.connections().insert(id, SprintConnection { tx });
    (id, rx)
}

/// Pull every queued event off a client channel as parsed JSON.
fn drain_events(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
    let mut events = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let Message::Text(text) = message {
            events.push(serde_json::from_str(&text).expect("broadcast frames are JSON"));
        }
    }
    events
}

fn events_named<'a>(events: &'a [Value], name: &str) -> Vec<&'a Value> {
    events
        .iter()
        .filter(|event| event["event"] == name)
        .collect()
}

async fn phase_of(state: &SharedState, session_id: Uuid) -> Option<SprintPhase> {
    match state.registry().get(session_id) {
        Some(handle) => Some(handle.lock().await.phase()),
        None => None,
    }
}

#[tokio::test(start_paused = true)]
async fn full_sprint_from_countdown_to_persisted_results() {
    let (state, store) = test_state().await;
    let session_id = sprint_service::create_session(&state);

    let (alice, mut alice_rx) = attach_client(&state);
    let (bob, mut bob_rx) = attach_client(&state);

    sprint_service::join(&state, alice, session_id, Some("alice".into()), None)
        .await
        .unwrap();
    sprint_service::join(&state, bob, session_id, Some("bob".into()), None)
        .await
        .unwrap();

    // More than enough ticks for the whole countdown.
    sleep(Duration::from_secs(5)).await;
    assert_eq!(phase_of(&state, session_id).await, Some(SprintPhase::Active));

    {
        let handle = state.registry().get(session_id).unwrap();
        let session = handle.lock().await;
        assert!(session.players().all(|player| player.tap_count == 0));
    }

    for _ in 0..7 {
        sprint_service::tap(&state, alice, session_id).await;
    }
    for _ in 0..3 {
        sprint_service::tap(&state, bob, session_id).await;
    }

    // Advance past the end of the window.
    sleep(Duration::from_millis(WINDOW_MS + 1_000)).await;
    assert_eq!(
        phase_of(&state, session_id).await,
        Some(SprintPhase::Finished)
    );

    // A tap in flight when the window closed is dropped, not counted.
    sprint_service::tap(&state, alice, session_id).await;

    let alice_events = drain_events(&mut alice_rx);
    let ticks = events_named(&alice_events, "countdown-tick");
    assert_eq!(ticks.len(), COUNTDOWN_SECONDS as usize);
    assert_eq!(ticks.last().unwrap()["seconds_remaining"], 0);

    let started = events_named(&alice_events, "game-started");
    assert_eq!(started.len(), 1);
    assert_eq!(started[0]["duration_ms"], WINDOW_MS);

    let finished = events_named(&alice_events, "game-finished");
    assert_eq!(finished.len(), 1);
    let ranked = finished[0]["ranked_results"].as_array().unwrap();
    assert_eq!(ranked[0]["display_name"], "alice");
    assert_eq!(ranked[0]["rank"], 0);
    assert_eq!(ranked[0]["tap_count"], 7);
    assert_eq!(ranked[1]["display_name"], "bob");
    assert_eq!(ranked[1]["rank"], 1);
    assert_eq!(ranked[1]["tap_count"], 3);
    assert_eq!(finished[0]["winner"]["display_name"], "alice");

    // Both members saw the same final standings.
    let bob_events = drain_events(&mut bob_rx);
    assert_eq!(events_named(&bob_events, "game-finished").len(), 1);

    // Tap totals broadcast while active equal the accepted tap events.
    let alice_taps: Vec<_> = events_named(&alice_events, "tap-updated")
        .into_iter()
        .filter(|event| event["display_name"] == "alice")
        .collect();
    assert_eq!(alice_taps.len(), 7);
    assert_eq!(alice_taps.last().unwrap()["tap_count"], 7);

    // Persisted rows match the broadcast ranking.
    let rows = store.read_results(session_id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].display_name, "alice");
    assert_eq!(rows[0].tap_count, 7);
    assert_eq!(rows[1].tap_count, 3);

    // After the grace period the aggregate is evicted, while persisted
    // results stay queryable through the service.
    sleep(Duration::from_secs(31)).await;
    assert_eq!(phase_of(&state, session_id).await, None);
    let served = sprint_service::session_results(&state, session_id)
        .await
        .unwrap();
    assert_eq!(served.len(), 2);
    assert_eq!(served[0].display_name, "alice");
}

#[tokio::test(start_paused = true)]
async fn late_join_is_rejected_without_roster_mutation() {
    let (state, _store) = test_state().await;
    let session_id = sprint_service::create_session(&state);

    let (alice, _alice_rx) = attach_client(&state);
    sprint_service::join(&state, alice, session_id, Some("alice".into()), None)
        .await
        .unwrap();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(phase_of(&state, session_id).await, Some(SprintPhase::Active));

    let (late, _late_rx) = attach_client(&state);
    let err = sprint_service::join(&state, late, session_id, Some("late".into()), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "session-already-started");

    let handle = state.registry().get(session_id).unwrap();
    let session = handle.lock().await;
    assert_eq!(session.players().count(), 1);
}

#[tokio::test(start_paused = true)]
async fn join_against_unknown_session_is_not_found() {
    let (state, _store) = test_state().await;
    let (conn, _rx) = attach_client(&state);

    let err = sprint_service::join(&state, conn, Uuid::new_v4(), None, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "session-not-found");
}

#[tokio::test(start_paused = true)]
async fn empty_session_waits_until_the_idle_sweeper_reaps_it() {
    let (state, _store) = test_state().await;
    let session_id = sprint_service::create_session(&state);

    // Nobody ever joins: no countdown starts and the session keeps waiting.
    sleep(Duration::from_secs(100)).await;
    assert_eq!(phase_of(&state, session_id).await, Some(SprintPhase::Waiting));
    orchestrator::sweep_idle_sessions(&state).await;
    assert_eq!(phase_of(&state, session_id).await, Some(SprintPhase::Waiting));

    sleep(Duration::from_secs(250)).await;
    orchestrator::sweep_idle_sessions(&state).await;
    assert_eq!(phase_of(&state, session_id).await, None);
}

#[tokio::test(start_paused = true)]
async fn disconnected_player_keeps_taps_and_is_still_ranked() {
    let (state, store) = test_state().await;
    let session_id = sprint_service::create_session(&state);

    let (alice, _alice_rx) = attach_client(&state);
    let (bob, mut bob_rx) = attach_client(&state);
    sprint_service::join(&state, alice, session_id, Some("alice".into()), None)
        .await
        .unwrap();
    sprint_service::join(&state, bob, session_id, Some("bob".into()), None)
        .await
        .unwrap();
    sleep(Duration::from_secs(5)).await;

    for _ in 0..5 {
        sprint_service::tap(&state, alice, session_id).await;
    }
    state.connections().remove(&alice);
    sprint_service::disconnect(&state, alice).await;

    // Taps from the departed connection are ignored.
    sprint_service::tap(&state, alice, session_id).await;
    sprint_service::tap(&state, bob, session_id).await;

    sleep(Duration::from_millis(WINDOW_MS + 1_000)).await;

    let bob_events = drain_events(&mut bob_rx);
    let finished = events_named(&bob_events, "game-finished");
    assert_eq!(finished[0]["winner"]["display_name"], "alice");
    assert_eq!(finished[0]["winner"]["tap_count"], 5);

    let rows = store.read_results(session_id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].display_name, "alice");
    assert_eq!(rows[0].tap_count, 5);
}

#[tokio::test(start_paused = true)]
async fn concurrent_sessions_do_not_influence_each_other() {
    let (state, store) = test_state().await;
    let first = sprint_service::create_session(&state);
    let second = sprint_service::create_session(&state);

    let (alice, mut alice_rx) = attach_client(&state);
    let (carol, mut carol_rx) = attach_client(&state);
    sprint_service::join(&state, alice, first, Some("alice".into()), None)
        .await
        .unwrap();
    sprint_service::join(&state, carol, second, Some("carol".into()), None)
        .await
        .unwrap();
    sleep(Duration::from_secs(5)).await;

    // Interleave taps across the two sessions.
    for _ in 0..4 {
        sprint_service::tap(&state, alice, first).await;
        sprint_service::tap(&state, carol, second).await;
        sprint_service::tap(&state, carol, second).await;
    }
    // Cross-session taps hit an unknown connection and are dropped.
    sprint_service::tap(&state, alice, second).await;
    sprint_service::tap(&state, carol, first).await;

    sleep(Duration::from_millis(WINDOW_MS + 1_000)).await;

    let alice_events = drain_events(&mut alice_rx);
    let carol_events = drain_events(&mut carol_rx);
    let first_finish = events_named(&alice_events, "game-finished");
    let second_finish = events_named(&carol_events, "game-finished");
    assert_eq!(first_finish[0]["winner"]["tap_count"], 4);
    assert_eq!(second_finish[0]["winner"]["tap_count"], 8);

    // Events stayed inside their own session group.
    assert!(events_named(&alice_events, "tap-updated")
        .iter()
        .all(|event| event["display_name"] == "alice"));

    let first_rows = store.read_results(first).await.unwrap();
    let second_rows = store.read_results(second).await.unwrap();
    assert_eq!(first_rows.len(), 1);
    assert_eq!(first_rows[0].tap_count, 4);
    assert_eq!(second_rows[0].tap_count, 8);
}

#[tokio::test(start_paused = true)]
async fn joining_a_second_session_leaves_no_ghost_in_the_first() {
    let (state, store) = test_state().await;
    let first = sprint_service::create_session(&state);
    let second = sprint_service::create_session(&state);

    let (conn, mut rx) = attach_client(&state);
    sprint_service::join(&state, conn, first, Some("alice".into()), None)
        .await
        .unwrap();
    // Switch sessions mid-countdown: the move leaves the first roster.
    sprint_service::join(&state, conn, second, Some("alice".into()), None)
        .await
        .unwrap();

    assert_eq!(state.tracker().session_for(conn), Some(second));
    {
        let handle = state.registry().get(first).unwrap();
        let session = handle.lock().await;
        assert_eq!(session.players().count(), 0);
    }

    sleep(Duration::from_secs(5)).await;
    for _ in 0..3 {
        sprint_service::tap(&state, conn, second).await;
    }
    // The first session no longer knows this connection.
    sprint_service::tap(&state, conn, first).await;

    sleep(Duration::from_millis(WINDOW_MS + 1_000)).await;

    // Standings arrive only from the session the player ended up in.
    let events = drain_events(&mut rx);
    let finished = events_named(&events, "game-finished");
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0]["winner"]["tap_count"], 3);

    let first_rows = store.read_results(first).await.unwrap();
    assert!(first_rows.is_empty());
    let second_rows = store.read_results(second).await.unwrap();
    assert_eq!(second_rows.len(), 1);
    assert_eq!(second_rows[0].display_name, "alice");
    assert_eq!(second_rows[0].tap_count, 3);
}

#[tokio::test(start_paused = true)]
async fn interleaved_tap_tasks_neither_lose_nor_duplicate_taps() {
    let (state, store) = test_state().await;
    let session_id = sprint_service::create_session(&state);

    let (alice, _alice_rx) = attach_client(&state);
    let (bob, _bob_rx) = attach_client(&state);
    sprint_service::join(&state, alice, session_id, Some("alice".into()), None)
        .await
        .unwrap();
    sprint_service::join(&state, bob, session_id, Some("bob".into()), None)
        .await
        .unwrap();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(phase_of(&state, session_id).await, Some(SprintPhase::Active));

    // Several tasks hammer the same session at once; yielding between taps
    // forces their lock acquisitions to interleave.
    let mut tasks = Vec::new();
    for _ in 0..4 {
        let state = state.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..25 {
                sprint_service::tap(&state, alice, session_id).await;
                tokio::task::yield_now().await;
            }
        }));
    }
    for _ in 0..2 {
        let state = state.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..25 {
                sprint_service::tap(&state, bob, session_id).await;
                tokio::task::yield_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    {
        let handle = state.registry().get(session_id).unwrap();
        let session = handle.lock().await;
        let counts: Vec<_> = session
            .players()
            .map(|player| (player.display_name.clone(), player.tap_count))
            .collect();
        assert_eq!(
            counts,
            vec![("alice".to_string(), 100), ("bob".to_string(), 50)]
        );
    }

    sleep(Duration::from_millis(WINDOW_MS + 1_000)).await;
    let rows = store.read_results(session_id).await.unwrap();
    assert_eq!(rows[0].display_name, "alice");
    assert_eq!(rows[0].tap_count, 100);
    assert_eq!(rows[1].display_name, "bob");
    assert_eq!(rows[1].tap_count, 50);
}

#[tokio::test(start_paused = true)]
async fn results_for_a_session_that_never_existed_are_not_found() {
    let (state, _store) = test_state().await;
    let err = sprint_service::session_results(&state, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "session-not-found");
}

#[tokio::test(start_paused = true)]
async fn results_are_degraded_without_a_store() {
    let state = AppState::new(AppConfig::default());
    let err = sprint_service::session_results(&state, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "storage-unavailable");
}
