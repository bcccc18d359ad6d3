//! v1 Result history handlers.

use axum::extract::{Path, State};
use serde::Serialize;

use crate::api::v1::response::{ApiError, ApiResponse, ErrorCode, ResponseMeta};
use crate::api::AppState;
use crate::models::OcrRecord;

/// `GET /api/v1/results`
///
/// Full result history, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/results",
    tag = "results",
    operation_id = "results.list",
    responses(
        (status = 200, description = "Result history, newest first", body = Vec<OcrRecord>),
    )
)]
pub async fn list_results(State(state): State<AppState>) -> ApiResponse<Vec<OcrRecord>> {
    let records = state.store.list().await;
    let total = records.len() as u64;
    ApiResponse::success_with_meta(records, ResponseMeta { total: Some(total) })
}

/// `GET /api/v1/results/{resultId}`
#[utoipa::path(
    get,
    path = "/api/v1/results/{resultId}",
    tag = "results",
    operation_id = "results.get",
    params(("resultId" = u64, Path, description = "Result ID")),
    responses(
        (status = 200, description = "Result found", body = OcrRecord),
        (status = 404, description = "Result not found", body = ApiError),
    )
)]
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResponse<OcrRecord> {
    match state.store.list().await.into_iter().find(|r| r.id == id) {
        Some(record) => ApiResponse::success(record),
        None => ApiResponse::error(ErrorCode::NotFound, format!("Result {id} not found")),
    }
}

/// Body of a successful `results:clear` call.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ClearResultsResponse {
    /// How many records were removed.
    pub removed: usize,
}

/// `POST /api/v1/results:clear`
///
/// Empties the history in one step. Clearing an empty history succeeds
/// with `removed: 0`.
#[utoipa::path(
    post,
    path = "/api/v1/results:clear",
    tag = "results",
    operation_id = "results.clear",
    responses(
        (status = 200, description = "History cleared", body = ClearResultsResponse),
        (status = 500, description = "History file could not be rewritten", body = ApiError),
    )
)]
pub async fn clear_results(State(state): State<AppState>) -> ApiResponse<ClearResultsResponse> {
    match state.store.clear().await {
        Ok(removed) => ApiResponse::success(ClearResultsResponse { removed }),
        Err(e) => e.into(),
    }
}
