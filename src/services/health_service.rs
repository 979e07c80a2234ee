use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with the current health status, probing the result store.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.result_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "result store health check failed");
            }
        }
        None => warn!("result store unavailable (degraded mode)"),
    }

    if state.is_degraded().await {
        HealthResponse::degraded()
    } else {
        HealthResponse::ok()
    }
}
