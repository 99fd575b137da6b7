pub mod protocol;
pub mod rest;
pub mod state;

use axum::{routing::post, Router};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use rest::{generate_study_item_handler, ApiDoc};
pub use state::AppState;

/// The API routes plus the Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/api/generate-study-item", post(generate_study_item_handler))
        .with_state(app_state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
