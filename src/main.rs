//! Sprint backend binary entrypoint wiring REST, WebSocket, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sprint_back::{
    config::AppConfig,
    dao::result_store::{ResultStore, memory::MemoryResultStore},
    routes,
    services::orchestrator,
    state::{AppState, SharedState},
};

#[cfg(feature = "mongo-store")]
use sprint_back::{
    dao::{result_store::mongodb::MongoResultStore, storage::StorageError},
    services::storage_supervisor,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    init_result_store(&app_state).await;
    orchestrator::spawn_idle_sweeper(app_state.clone());

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the result store backend selected by `RESULT_STORE`.
///
/// `memory` (the default) installs the in-process store immediately; `mongo`
/// hands the connection to the storage supervisor, which retries in the
/// background and toggles degraded mode when connectivity changes.
async fn init_result_store(state: &SharedState) {
    let backend = env::var("RESULT_STORE").unwrap_or_else(|_| "memory".into());
    match backend.as_str() {
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            let uri =
                env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
            let db_name = env::var("MONGO_DB").ok();
            tokio::spawn(storage_supervisor::run(state.clone(), move || {
                let uri = uri.clone();
                let db_name = db_name.clone();
                async move {
                    let store = MongoResultStore::connect(&uri, db_name.as_deref())
                        .await
                        .map_err(StorageError::from)?;
                    Ok(Arc::new(store) as Arc<dyn ResultStore>)
                }
            }));
        }
        other => {
            if other != "memory" {
                warn!(backend = other, "unsupported RESULT_STORE backend; using memory");
            }
            state
                .install_result_store(Arc::new(MemoryResultStore::new()) as Arc<dyn ResultStore>)
                .await;
            info!("using in-memory result store");
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
