//! Frame acquisition.
//!
//! A session's image comes from one of two places: the configured capture
//! device, or a frame the caller uploaded with the trigger request. Device
//! drivers themselves live outside this service; `CAMERA_DEVICE` points at an
//! image file kept fresh by whatever capture process the deployment runs
//! (tethered camera daemons and snapshot scripts both work). A bare index
//! like `0` therefore has nothing to bind to and degrades to an unavailable
//! backend that reports itself at startup and on every acquire.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::CameraConfig;
use crate::error::{LecternError, Result};

/// A decoded-and-validated frame with its pixel dimensions.
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RawFrame {
    /// Validate an externally supplied frame. The bytes are kept as-is; only
    /// the header is decoded to establish dimensions.
    pub fn decode(bytes: Vec<u8>) -> Result<Self> {
        let (width, height) = image::load_from_memory(&bytes)
            .map(|img| (img.width(), img.height()))
            .map_err(|e| LecternError::Acquisition(format!("Unreadable frame: {e}")))?;

        Ok(Self {
            bytes,
            width,
            height,
        })
    }
}

enum FrameBackend {
    /// Re-read an image file on every acquire.
    Still { path: PathBuf },
    Unavailable { reason: String },
}

pub struct FrameAcquirer {
    backend: FrameBackend,
    config: CameraConfig,
}

impl FrameAcquirer {
    pub fn new(config: &CameraConfig) -> Self {
        let backend = if config.device.parse::<u32>().is_ok() {
            let reason = format!(
                "Camera index {} has no driver binding in this service; \
                 set CAMERA_DEVICE to an image file refreshed by your capture process",
                config.device
            );
            warn!("{}", reason);
            FrameBackend::Unavailable { reason }
        } else {
            let path = PathBuf::from(&config.device);
            info!(path = %path.display(), "File-backed frame source initialized");
            FrameBackend::Still { path }
        };

        Self {
            backend,
            config: config.clone(),
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, FrameBackend::Unavailable { .. })
    }

    /// Grab one frame from the device, bounded by `ACQUIRE_TIMEOUT`. The
    /// preview and settle delays run inside the same budget, so a long
    /// preview cannot stretch the stage past its configured bound.
    pub async fn acquire(&self) -> Result<RawFrame> {
        let timeout_duration = Duration::from_secs(self.config.acquire_timeout_secs);

        let result = tokio::time::timeout(timeout_duration, self.acquire_internal()).await;

        match result {
            Ok(inner_result) => inner_result,
            Err(_) => Err(LecternError::Acquisition(format!(
                "Frame acquisition timed out after {} seconds",
                self.config.acquire_timeout_secs
            ))),
        }
    }

    async fn acquire_internal(&self) -> Result<RawFrame> {
        let path = match &self.backend {
            FrameBackend::Still { path } => path.clone(),
            FrameBackend::Unavailable { reason } => {
                return Err(LecternError::Acquisition(reason.clone()));
            }
        };

        if self.config.show_preview {
            tokio::time::sleep(Duration::from_secs_f64(self.config.preview_duration_secs)).await;
        }
        if self.config.capture_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.capture_delay_ms)).await;
        }

        let bytes = tokio::task::spawn_blocking(move || std::fs::read(&path))
            .await
            .map_err(|e| LecternError::Acquisition(format!("Frame read task panicked: {e}")))?
            .map_err(|e| LecternError::Acquisition(format!("Failed to read frame: {e}")))?;

        RawFrame::decode(bytes)
    }
}
