use utoipa::OpenApi;

/// Aggregated OpenAPI specification for the sprint backend.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sprint::create_session,
        crate::routes::sprint::session_results,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sprint::SessionCreated,
            crate::dto::sprint::ResultRow,
            crate::dto::ws::SprintInboundMessage,
            crate::dto::ws::SprintOutboundMessage,
            crate::dto::ws::PlayerSummary,
            crate::dto::ws::RankedResult,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sprint", description = "Session bootstrap and result queries"),
        (name = "ws", description = "WebSocket operations for sprint clients"),
    )
)]
pub struct ApiDoc;
