use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Mount the Swagger UI at `/docs` over the sprint API's OpenAPI document.
pub fn router(state: SharedState) -> Router<SharedState> {
    let swagger: Router<SharedState> = SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into();

    swagger.with_state(state)
}
