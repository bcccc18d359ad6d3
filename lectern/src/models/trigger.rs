use chrono::{DateTime, Utc};

/// Where a trigger event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOrigin {
    /// Hardware edge from the level probe.
    Edge,
    /// Client request carrying its own frame.
    Request,
    /// Scheduled (simulation) loop.
    Schedule,
}

impl std::fmt::Display for TriggerOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Edge => write!(f, "edge"),
            Self::Request => write!(f, "request"),
            Self::Schedule => write!(f, "schedule"),
        }
    }
}

/// One request for a capture→recognize→feedback cycle. Request-origin
/// events carry the already-decoded frame; edge and schedule events leave
/// `frame` empty and the local camera supplies it.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub origin: TriggerOrigin,
    pub at: DateTime<Utc>,
    pub frame: Option<Vec<u8>>,
    pub prompt: Option<String>,
}

impl TriggerEvent {
    pub fn from_hardware(origin: TriggerOrigin) -> Self {
        Self {
            origin,
            at: Utc::now(),
            frame: None,
            prompt: None,
        }
    }

    pub fn from_request(frame: Vec<u8>, prompt: Option<String>) -> Self {
        Self {
            origin: TriggerOrigin::Request,
            at: Utc::now(),
            frame: Some(frame),
            prompt,
        }
    }

    /// Client-requested capture that uses the local frame source instead
    /// of an uploaded frame.
    pub fn from_remote_trigger() -> Self {
        Self {
            origin: TriggerOrigin::Request,
            at: Utc::now(),
            frame: None,
            prompt: None,
        }
    }
}
