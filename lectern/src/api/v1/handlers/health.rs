use axum::extract::State;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::v1::response::ApiResponse;

/// Health data returned inside the v1 envelope.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub session: SessionStatus,
    pub camera: CameraStatus,
    pub audio: AudioStatus,
    pub backend: BackendStatus,
    pub precheck: PrecheckStatus,
    pub history: HistoryStatus,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct SessionStatus {
    /// Current pipeline stage, `idle` when no session is running.
    pub state: String,
    pub trigger_mode: String,
    /// Triggers rejected since startup because a session was in flight.
    pub dropped_triggers: u64,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CameraStatus {
    pub status: String,
    pub device: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AudioStatus {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct BackendStatus {
    pub status: String,
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct PrecheckStatus {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct HistoryStatus {
    pub count: usize,
}

/// `GET /api/v1/health`
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health status", body = HealthData),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthData> {
    let session = SessionStatus {
        state: state.orchestrator.state().to_string(),
        trigger_mode: state.config.trigger.mode.to_string(),
        dropped_triggers: state.orchestrator.dropped_count(),
    };

    let camera = CameraStatus {
        status: if state.acquirer.is_available() {
            "available".to_string()
        } else {
            "unavailable".to_string()
        },
        device: state.config.camera.device.clone(),
    };

    let audio = AudioStatus {
        status: if state.player.is_available() {
            "available".to_string()
        } else {
            "unavailable".to_string()
        },
    };

    let backend = BackendStatus {
        status: "configured".to_string(),
        api_url: state.config.backend.api_url.clone(),
    };

    let precheck = PrecheckStatus {
        enabled: state.config.precheck.enabled,
        model: state
            .config
            .precheck
            .enabled
            .then(|| state.config.precheck.model.clone()),
    };

    let history = HistoryStatus {
        count: state.store.count().await,
    };

    ApiResponse::success(HealthData {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        session,
        camera,
        audio,
        backend,
        precheck,
        history,
    })
}
