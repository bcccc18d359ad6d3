//! Session orchestration.
//!
//! `Orchestrator::submit_trigger` is the single entry point for every
//! trigger producer. It enforces single flight with a one-permit gate:
//! the first trigger wins, anything arriving while a session is in flight
//! is counted and dropped, never queued. An accepted trigger walks
//! `TRIGGERED → ACQUIRING → PREPROCESSING → REQUESTING → FEEDBACK` and every
//! failure lands in `FEEDBACK` too, so each session ends with exactly one
//! recorded outcome and exactly one audible cue.
//!
//! Stage budgets live in the components themselves: the acquirer bounds the
//! camera grab, the OCR client bounds each backend attempt, the precheck
//! bounds its vision call, and the player bounds the cue wait. The transform
//! is pure CPU work and gets a fixed ceiling here. No stage can strand the
//! machine outside `IDLE`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use nanoid::nanoid;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::audio::{Cue, FeedbackPlayer};
use crate::capture::{FrameAcquirer, RawFrame};
use crate::config::{Config, ConfigSnapshot};
use crate::error::{LecternError, Result};
use crate::models::{OcrRecord, RecordDraft, RecordStatus, TriggerEvent};
use crate::ocr::{OcrClient, PrecheckVerdict, ProcessedFrame, SkipPrecheck};
use crate::store::ResultStore;

/// Ceiling on the decode-rotate-resize stage. Frames are capped by the HTTP
/// body limit, so a transform that runs this long is wedged, not slow.
const PREPROCESS_BUDGET_SECS: u64 = 30;

/// Pipeline states. `Idle` is both initial and terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Triggered,
    Acquiring,
    Preprocessing,
    Requesting,
    Feedback,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Triggered => write!(f, "triggered"),
            Self::Acquiring => write!(f, "acquiring"),
            Self::Preprocessing => write!(f, "preprocessing"),
            Self::Requesting => write!(f, "requesting"),
            Self::Feedback => write!(f, "feedback"),
        }
    }
}

/// Transient bookkeeping for one accepted trigger. Never persisted; the
/// durable trace of a session is its `OcrRecord`.
struct CaptureSession {
    id: String,
    triggered_at: DateTime<Utc>,
    snapshot: ConfigSnapshot,
    image_path: Option<String>,
    started: Instant,
}

impl CaptureSession {
    fn new(triggered_at: DateTime<Utc>, snapshot: ConfigSnapshot) -> Self {
        Self {
            id: nanoid!(),
            triggered_at,
            snapshot,
            image_path: None,
            started: Instant::now(),
        }
    }
}

/// What a trigger producer gets back. `persisted` is false when the history
/// write failed or the session was cancelled; the record then carries id 0
/// and exists only in this response.
#[derive(Clone, Debug)]
pub struct CaptureOutcome {
    pub record: OcrRecord,
    pub persisted: bool,
}

pub struct Orchestrator {
    config: Config,
    store: Arc<ResultStore>,
    client: OcrClient,
    precheck: Arc<dyn SkipPrecheck>,
    player: Arc<FeedbackPlayer>,
    acquirer: Arc<FrameAcquirer>,
    shutdown: CancellationToken,
    gate: Arc<Semaphore>,
    dropped: AtomicU64,
    state: Mutex<SessionState>,
    captures_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        store: Arc<ResultStore>,
        client: OcrClient,
        precheck: Arc<dyn SkipPrecheck>,
        player: Arc<FeedbackPlayer>,
        acquirer: Arc<FrameAcquirer>,
        shutdown: CancellationToken,
    ) -> Self {
        let captures_dir = PathBuf::from(&config.storage.data_dir).join("captures");

        Self {
            config,
            store,
            client,
            precheck,
            player,
            acquirer,
            shutdown,
            gate: Arc::new(Semaphore::new(1)),
            dropped: AtomicU64::new(0),
            state: Mutex::new(SessionState::Idle),
            captures_dir,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn is_busy(&self) -> bool {
        self.gate.available_permits() == 0
    }

    /// Triggers rejected because a session was already in flight.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Run one capture session for this trigger, or reject it with `Busy`
    /// if a session is already in flight. An accepted trigger always comes
    /// back as `Ok`: stage failures are folded into the outcome record, not
    /// surfaced as errors.
    pub async fn submit_trigger(&self, event: TriggerEvent) -> Result<CaptureOutcome> {
        let permit = match self.gate.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let total = self.dropped.fetch_add(1, Ordering::SeqCst) + 1;
                info!(
                    origin = %event.origin,
                    dropped_total = total,
                    "Trigger dropped, session already in flight"
                );
                return Err(LecternError::Busy);
            }
        };

        self.set_state(SessionState::Triggered);
        let mut session = CaptureSession::new(event.at, self.config.snapshot());
        info!(session_id = %session.id, origin = %event.origin, "Capture session started");

        let result = tokio::select! {
            res = self.run_pipeline(&mut session, event) => res,
            _ = self.shutdown.cancelled() => Err(LecternError::Cancelled),
        };

        let outcome = self.finish(session, result).await;

        self.set_state(SessionState::Idle);
        drop(permit);
        Ok(outcome)
    }

    async fn run_pipeline(
        &self,
        session: &mut CaptureSession,
        event: TriggerEvent,
    ) -> Result<RecordDraft> {
        let TriggerEvent { frame, prompt, .. } = event;

        self.set_state(SessionState::Acquiring);
        debug!(session_id = %session.id, "Acquiring frame");
        let raw = match frame {
            Some(bytes) => RawFrame::decode(bytes)?,
            None => self.acquirer.acquire().await?,
        };

        self.set_state(SessionState::Preprocessing);
        debug!(
            session_id = %session.id,
            width = raw.width,
            height = raw.height,
            "Preprocessing frame"
        );
        let snapshot = session.snapshot.clone();
        let processed = tokio::time::timeout(
            Duration::from_secs(PREPROCESS_BUDGET_SECS),
            tokio::task::spawn_blocking(move || {
                crate::ocr::transform(&raw.bytes, snapshot.rotation, snapshot.mirror, snapshot.max_size)
            }),
        )
        .await
        .map_err(|_| {
            LecternError::Preprocess(format!(
                "Transform did not finish within {PREPROCESS_BUDGET_SECS} seconds"
            ))
        })?
        .map_err(|e| LecternError::Internal(format!("Preprocess task panicked: {e}")))??;

        session.image_path = self.save_capture(session, &processed).await;

        let suggested = if self.precheck.is_enabled() {
            match self.precheck.evaluate(&processed.bytes).await {
                PrecheckVerdict::Skip { reason } => {
                    info!(session_id = %session.id, reason = %reason, "Frame skipped before submission");
                    return Ok(RecordDraft::skipped(reason));
                }
                PrecheckVerdict::Proceed { suggested_prompt } => suggested_prompt,
            }
        } else {
            None
        };

        self.set_state(SessionState::Requesting);
        let effective_prompt = resolve_prompt(prompt, suggested, &session.snapshot.prompt);
        debug!(session_id = %session.id, "Submitting frame to OCR backend");
        let text = self
            .client
            .submit(&processed.bytes, Some(&effective_prompt))
            .await?;

        Ok(RecordDraft::completed(text))
    }

    /// Terminal stage: record exactly one outcome, play exactly one cue,
    /// report back. A failed history write is logged and the outcome is
    /// still reported; a cancelled session records nothing.
    async fn finish(&self, session: CaptureSession, result: Result<RecordDraft>) -> CaptureOutcome {
        self.set_state(SessionState::Feedback);

        let (draft, persist) = match result {
            Ok(draft) => (draft, true),
            Err(LecternError::Cancelled) => {
                warn!(session_id = %session.id, "Session cancelled by shutdown");
                (RecordDraft::error("cancelled"), false)
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Session failed");
                (RecordDraft::error(e.to_string()), true)
            }
        };

        let draft = match &session.image_path {
            Some(path) if draft.image_path.is_none() => draft.with_image_path(path.clone()),
            _ => draft,
        };

        let cue = cue_for(&draft.status);

        let (record, persisted) = if persist {
            match self.store.append(draft.clone()).await {
                Ok(record) => (record, true),
                Err(e) => {
                    error!(session_id = %session.id, error = %e, "History write failed");
                    (unpersisted_record(draft), false)
                }
            }
        } else {
            (unpersisted_record(draft), false)
        };

        if let Err(e) = self.player.play(cue).await {
            warn!(session_id = %session.id, cue = %cue, error = %e, "Feedback cue failed");
        }

        info!(
            session_id = %session.id,
            status = %record.status,
            elapsed_ms = session.started.elapsed().as_millis() as u64,
            "Capture session finished"
        );

        CaptureOutcome { record, persisted }
    }

    /// Write the processed frame next to the history so records can
    /// reference it by URL. Artifact loss is never worth failing a session.
    async fn save_capture(
        &self,
        session: &CaptureSession,
        processed: &ProcessedFrame,
    ) -> Option<String> {
        if !session.snapshot.save_captures {
            return None;
        }

        if let Err(e) = fs::create_dir_all(&self.captures_dir).await {
            warn!(error = %e, "Failed to create captures directory");
            return None;
        }

        let filename = format!(
            "capture_{}_{}.jpg",
            session.triggered_at.format("%Y%m%d_%H%M%S"),
            session.id
        );
        let path = self.captures_dir.join(&filename);

        match fs::write(&path, &processed.bytes).await {
            Ok(()) => Some(format!("/captures/{filename}")),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to save capture artifact");
                None
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        let mut current = self.state.lock().unwrap();
        debug!(from = %current, to = %state, "Session state");
        *current = state;
    }
}

fn cue_for(status: &RecordStatus) -> Cue {
    match status {
        RecordStatus::Completed => Cue::Success,
        RecordStatus::Error => Cue::Error,
        RecordStatus::Skipped => Cue::Skip,
    }
}

/// Prompt precedence: the caller's request wins, then the precheck
/// suggestion, then the configured default. Blank strings count as absent.
fn resolve_prompt(requested: Option<String>, suggested: Option<String>, default: &str) -> String {
    requested
        .filter(|p| !p.trim().is_empty())
        .or(suggested.filter(|p| !p.trim().is_empty()))
        .unwrap_or_else(|| default.to_string())
}

fn unpersisted_record(draft: RecordDraft) -> OcrRecord {
    OcrRecord {
        id: 0,
        status: draft.status,
        text: draft.text,
        error: draft.error,
        skip_reason: draft.skip_reason,
        image_path: draft.image_path,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_for_each_status() {
        assert_eq!(cue_for(&RecordStatus::Completed), Cue::Success);
        assert_eq!(cue_for(&RecordStatus::Error), Cue::Error);
        assert_eq!(cue_for(&RecordStatus::Skipped), Cue::Skip);
    }

    #[test]
    fn test_prompt_precedence_request_first() {
        let prompt = resolve_prompt(
            Some("read the title".to_string()),
            Some("receipt prompt".to_string()),
            "default",
        );
        assert_eq!(prompt, "read the title");
    }

    #[test]
    fn test_prompt_precedence_suggestion_second() {
        let prompt = resolve_prompt(None, Some("receipt prompt".to_string()), "default");
        assert_eq!(prompt, "receipt prompt");
    }

    #[test]
    fn test_prompt_precedence_default_last() {
        let prompt = resolve_prompt(None, None, "default");
        assert_eq!(prompt, "default");
    }

    #[test]
    fn test_blank_prompt_counts_as_absent() {
        let prompt = resolve_prompt(Some("   ".to_string()), None, "default");
        assert_eq!(prompt, "default");
    }

    #[test]
    fn test_session_ids_are_unique() {
        let config = crate::config::Config::default();
        let a = CaptureSession::new(Utc::now(), config.snapshot());
        let b = CaptureSession::new(Utc::now(), config.snapshot());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_unpersisted_record_keeps_draft_fields() {
        let record = unpersisted_record(RecordDraft::error("cancelled"));
        assert_eq!(record.id, 0);
        assert_eq!(record.status, RecordStatus::Error);
        assert_eq!(record.error.as_deref(), Some("cancelled"));
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::Requesting.to_string(), "requesting");
    }
}
