use axum::{
    routing::{get, post},
    Router,
};

use crate::api::state::AppState;

use super::handlers;

pub fn v1_router() -> Router<AppState> {
    let results = Router::new()
        .route("/", get(handlers::results::list_results))
        .route("/{resultId}", get(handlers::results::get_result));

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/openapi.json", get(super::openapi::openapi_json))
        .merge(super::openapi::redoc_router());

    let capture_routes = Router::new()
        .route("/captures", post(handlers::captures::submit_capture))
        .route("/captures:trigger", post(handlers::captures::fire_trigger))
        .nest("/results", results)
        .route("/results:clear", post(handlers::results::clear_results));

    Router::new().merge(public_routes).merge(capture_routes)
}
