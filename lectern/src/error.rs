use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LecternError {
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    #[error("Preprocess error: {0}")]
    Preprocess(String),

    #[error("OCR backend timed out after {0} seconds")]
    BackendTimeout(u64),

    #[error("OCR backend connection error: {0}")]
    BackendConnection(String),

    #[error("OCR backend rejected request ({code}): {message}")]
    Remote { code: u16, message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("A capture session is already in progress")]
    Busy,

    #[error("Session cancelled by shutdown")]
    Cancelled,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for LecternError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            LecternError::Acquisition(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            LecternError::Preprocess(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            LecternError::BackendTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            LecternError::BackendConnection(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            LecternError::Remote { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            LecternError::Persistence(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            LecternError::Playback(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            LecternError::Busy => (StatusCode::CONFLICT, self.to_string()),
            LecternError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            LecternError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            LecternError::Http(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            LecternError::Json(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            LecternError::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            LecternError::Image(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            LecternError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, LecternError>;
