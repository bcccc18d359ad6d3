use std::path::PathBuf;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::v1;
use super::AppState;

/// Upper bound on request bodies. Base64 inflates a frame by a third, so
/// this comfortably covers full-resolution uploads from phone cameras.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let v1 = v1::router::v1_router();

    let captures_dir = PathBuf::from(&state.config.storage.data_dir).join("captures");

    Router::new()
        .nest("/api/v1", v1)
        .nest_service("/captures", ServeDir::new(captures_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
