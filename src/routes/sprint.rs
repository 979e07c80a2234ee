use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::sprint::{ResultRow, SessionCreated},
    error::AppError,
    services::sprint_service,
    state::SharedState,
};

/// Routes handling session bootstrap and persisted result queries.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sprints", post(create_session))
        .route("/sprints/{id}/results", get(session_results))
}

/// Allocate a fresh sprint session and return its id.
#[utoipa::path(
    post,
    path = "/sprints",
    tag = "sprint",
    responses(
        (status = 200, description = "Session created", body = SessionCreated)
    )
)]
pub async fn create_session(State(state): State<SharedState>) -> Json<SessionCreated> {
    let session_id = sprint_service::create_session(&state);
    Json(SessionCreated { session_id })
}

/// Persisted results for a session, ordered by tap count descending.
#[utoipa::path(
    get,
    path = "/sprints/{id}/results",
    tag = "sprint",
    params(("id" = Uuid, Path, description = "Identifier of the session to query")),
    responses(
        (status = 200, description = "Persisted results", body = [ResultRow]),
        (status = 404, description = "Unknown session with no persisted results")
    )
)]
pub async fn session_results(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ResultRow>>, AppError> {
    let rows = sprint_service::session_results(&state, id).await?;
    Ok(Json(rows))
}
