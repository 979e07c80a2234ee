use serde::Serialize;
use utoipa::ToSchema;

/// Payload served by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `"ok"` when a result store is installed, `"degraded"` otherwise.
    pub status: String,
}

impl HealthResponse {
    /// Backend fully operational, result store installed.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    /// Backend serving sprints but unable to persist or read results.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
        }
    }
}
