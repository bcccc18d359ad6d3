//! v1 Capture handlers.

use axum::extract::State;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::api::v1::response::{ApiError, ApiResponse, ErrorCode};
use crate::api::AppState;
use crate::models::{OcrRecord, TriggerEvent};

/// Body for `POST /api/v1/captures`.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SubmitCaptureRequest {
    /// Base64-encoded image bytes. A `data:` URL prefix is tolerated.
    pub frame: String,
    /// Prompt override for this capture only.
    #[serde(default)]
    pub prompt: Option<String>,
}

/// `POST /api/v1/captures`
///
/// Runs one capture session on an uploaded frame. The response is the
/// finished result record, whatever its outcome, so a recognition failure
/// still answers 200 with a record of status `error`.
#[utoipa::path(
    post,
    path = "/api/v1/captures",
    tag = "captures",
    operation_id = "captures.submit",
    request_body = SubmitCaptureRequest,
    responses(
        (status = 200, description = "Capture session finished", body = OcrRecord),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 409, description = "A session is already in flight", body = ApiError),
    )
)]
pub async fn submit_capture(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<SubmitCaptureRequest>,
) -> ApiResponse<OcrRecord> {
    if req.frame.trim().is_empty() {
        return ApiResponse::error(ErrorCode::InvalidRequest, "Frame cannot be empty");
    }

    let encoded = strip_data_url(&req.frame);
    let bytes = match STANDARD.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(_) => {
            return ApiResponse::error(ErrorCode::InvalidRequest, "Frame is not valid base64")
        }
    };
    if bytes.is_empty() {
        return ApiResponse::error(ErrorCode::InvalidRequest, "Frame decoded to zero bytes");
    }

    let event = TriggerEvent::from_request(bytes, req.prompt);
    match state.orchestrator.submit_trigger(event).await {
        Ok(outcome) => ApiResponse::success(outcome.record),
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/captures:trigger`
///
/// Fires the same capture pipeline a hardware press would, acquiring the
/// frame from the local source. Takes no body.
#[utoipa::path(
    post,
    path = "/api/v1/captures:trigger",
    tag = "captures",
    operation_id = "captures.trigger",
    responses(
        (status = 200, description = "Capture session finished", body = OcrRecord),
        (status = 409, description = "A session is already in flight", body = ApiError),
        (status = 503, description = "Service shutting down", body = ApiError),
    )
)]
pub async fn fire_trigger(State(state): State<AppState>) -> ApiResponse<OcrRecord> {
    let event = TriggerEvent::from_remote_trigger();
    match state.orchestrator.submit_trigger(event).await {
        Ok(outcome) => ApiResponse::success(outcome.record),
        Err(e) => e.into(),
    }
}

/// Browsers send canvas exports as `data:image/jpeg;base64,<payload>`.
fn strip_data_url(frame: &str) -> &str {
    match frame.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => frame,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_data_url_removes_prefix() {
        assert_eq!(strip_data_url("data:image/png;base64,AAAA"), "AAAA");
    }

    #[test]
    fn strip_data_url_passes_plain_base64_through() {
        assert_eq!(strip_data_url("AAAA"), "AAAA");
    }

    #[test]
    fn strip_data_url_ignores_non_data_prefixes() {
        assert_eq!(strip_data_url("junk;base64,AAAA"), "junk;base64,AAAA");
    }
}
