//! Shared application state: session registry, connection tracking, and
//! installed collaborators (result store, identity resolver).

pub mod registry;
pub mod session;
pub mod tracker;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::result_store::ResultStore,
    error::ServiceError,
    services::identity::IdentityResolver,
};

pub use self::registry::{SessionHandle, SessionRegistry};
pub use self::tracker::ConnectionTracker;

/// Shared, cheaply clonable handle to the whole application state.
pub type SharedState = Arc<AppState>;

/// Handle used to push messages to a connected sprint client; the connection
/// id lives in the map key.
#[derive(Clone)]
pub struct SprintConnection {
    /// Writer channel draining into the connection's WebSocket.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state storing live sessions and connections.
pub struct AppState {
    config: AppConfig,
    registry: SessionRegistry,
    tracker: ConnectionTracker,
    connections: DashMap<Uuid, SprintConnection>,
    result_store: RwLock<Option<Arc<dyn ResultStore>>>,
    identity: RwLock<Option<Arc<dyn IdentityResolver>>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a result store is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            config,
            registry: SessionRegistry::new(),
            tracker: ConnectionTracker::new(),
            connections: DashMap::new(),
            result_store: RwLock::new(None),
            identity: RwLock::new(None),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of live sprint sessions.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Connection-to-session index.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Live client connections keyed by connection id.
    pub fn connections(&self) -> &DashMap<Uuid, SprintConnection> {
        &self.connections
    }

    /// Obtain a handle to the current result store, if one is installed.
    pub async fn result_store(&self) -> Option<Arc<dyn ResultStore>> {
        let guard = self.result_store.read().await;
        guard.as_ref().cloned()
    }

    /// Result store handle or a degraded-mode error for request paths that
    /// cannot proceed without one.
    pub async fn require_result_store(&self) -> Result<Arc<dyn ResultStore>, ServiceError> {
        self.result_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a result store implementation and leave degraded mode.
    pub async fn install_result_store(&self, store: Arc<dyn ResultStore>) {
        let mut guard = self.result_store.write().await;
        *guard = Some(store);
    }

    /// Remove the current result store and enter degraded mode.
    pub async fn clear_result_store(&self) {
        let mut guard = self.result_store.write().await;
        guard.take();
    }

    /// Whether the backend currently runs without a result store.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.result_store.read().await;
        guard.is_none()
    }

    /// Install the identity collaborator used to attach user ids to joins.
    pub async fn install_identity_resolver(&self, resolver: Arc<dyn IdentityResolver>) {
        let mut guard = self.identity.write().await;
        *guard = Some(resolver);
    }

    /// Identity resolver handle, absent when every player is anonymous.
    pub async fn identity_resolver(&self) -> Option<Arc<dyn IdentityResolver>> {
        let guard = self.identity.read().await;
        guard.as_ref().cloned()
    }
}
