use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::handlers;
use super::response;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lectern API",
        version = "1.0.0",
        description = "Capture-to-speech OCR appliance. REST API for triggering \
            capture sessions and browsing the result history.",
    ),
    paths(
        handlers::health::health_check,
        handlers::captures::submit_capture,
        handlers::captures::fire_trigger,
        handlers::results::list_results,
        handlers::results::get_result,
        handlers::results::clear_results,
    ),
    components(schemas(
        // Response envelope
        response::ErrorCode,
        response::ApiError,
        response::ResponseMeta,
        // Records
        models::RecordStatus,
        models::OcrRecord,
        // Captures
        handlers::captures::SubmitCaptureRequest,
        // Results
        handlers::results::ClearResultsResponse,
        // Health (handler-local types)
        handlers::health::HealthData,
        handlers::health::SessionStatus,
        handlers::health::CameraStatus,
        handlers::health::AudioStatus,
        handlers::health::BackendStatus,
        handlers::health::PrecheckStatus,
        handlers::health::HistoryStatus,
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "captures", description = "Trigger capture sessions"),
        (name = "results", description = "Result history browsing and clearing"),
    ),
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
