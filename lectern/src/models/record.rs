use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one capture session, as stored and served.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Completed,
    Error,
    Skipped,
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Unknown record status: {s}")),
        }
    }
}

/// Durable result of one capture session. Ids are unique and strictly
/// increasing in append order; records persist until an explicit clear.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct OcrRecord {
    pub id: u64,
    pub status: RecordStatus,
    /// Recognized text. Present when `status` is `completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Failure detail. Present when `status` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why the frame was not submitted. Present when `status` is `skipped`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Relative path of the saved capture, when capture saving is on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// When the session finished.
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

/// A record that has not been assigned an id yet. The store turns a draft
/// into an [`OcrRecord`] on append.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub status: RecordStatus,
    pub text: Option<String>,
    pub error: Option<String>,
    pub skip_reason: Option<String>,
    pub image_path: Option<String>,
}

impl RecordDraft {
    pub fn completed(text: impl Into<String>) -> Self {
        Self {
            status: RecordStatus::Completed,
            text: Some(text.into()),
            error: None,
            skip_reason: None,
            image_path: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: RecordStatus::Error,
            text: None,
            error: Some(detail.into()),
            skip_reason: None,
            image_path: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: RecordStatus::Skipped,
            text: None,
            error: None,
            skip_reason: Some(reason.into()),
            image_path: None,
        }
    }

    pub fn with_image_path(mut self, path: impl Into<String>) -> Self {
        self.image_path = Some(path.into());
        self
    }
}
