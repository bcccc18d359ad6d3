//! Remote text recognition for captured frames.
//!
//! This module owns everything between a raw frame and recognized text:
//! - `preprocessing` normalizes the frame (rotation, mirror, downscale, JPEG)
//! - `OcrClient` speaks the backend wire contract (`{image, prompt?}` in,
//!   `{status, text?, error?}` out) with a single bounded retry
//! - `SkipPrecheck` is an optional gate that can veto a frame before the
//!   backend round trip, or suggest a scene-specific prompt
//!
//! # Configuration
//!
//! Behavior is controlled via `BackendConfig`, `PreprocessConfig` and
//! `PrecheckConfig` (see `config.rs`):
//! - `OCR_API_URL`: full URL of the recognition endpoint
//! - `OCR_PROMPT`: default prompt when nothing more specific applies
//! - `REQUEST_TIMEOUT`: per-attempt request timeout
//! - `ROTATION` / `MIRROR` / `MAX_SIZE`: frame normalization
//! - `PRECHECK_*`: vision-model gate selection and credentials
//!
//! # Usage
//!
//! ```rust,ignore
//! let processed = ocr::transform(&frame.bytes, 0, false, 1280)?;
//! let client = OcrClient::new(&config.backend)?;
//! let text = client.submit(&processed.bytes, None).await?;
//! ```

mod client;
mod precheck;
mod preprocessing;

pub use client::OcrClient;
pub use precheck::{DisabledPrecheck, PrecheckVerdict, SkipPrecheck, VisionPrecheck};
pub use preprocessing::{transform, ProcessedFrame};
