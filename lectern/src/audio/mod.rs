//! Audible feedback cues.
//!
//! Every session outcome ends in exactly one cue. Playback runs on a
//! dedicated thread because rodio's output types are not `Send`; the
//! orchestrator talks to it over a channel and waits at most
//! `PLAYBACK_WAIT_MS` for the cue to finish. A cue that runs longer keeps
//! playing while the orchestrator returns to idle, and the output device is
//! still released when the thread drops the stream.

use rodio::{Decoder, OutputStream, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::config::AudioConfig;
use crate::error::{LecternError, Result};

/// The three audible outcomes. `Skip` falls back to the error cue unless a
/// distinct `SKIP_SOUND` is configured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cue {
    Success,
    Error,
    Skip,
}

impl std::fmt::Display for Cue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

enum AudioCommand {
    Play {
        path: PathBuf,
        volume: f32,
        done: Sender<std::result::Result<(), String>>,
    },
}

enum PlayerBackend {
    Device {
        tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    },
    Muted,
}

pub struct FeedbackPlayer {
    backend: PlayerBackend,
    config: AudioConfig,
}

impl FeedbackPlayer {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            backend: PlayerBackend::Device {
                tx: Arc::new(Mutex::new(None)),
            },
            config: config.clone(),
        }
    }

    /// Player that acknowledges every cue without touching an output device.
    /// Selected when `AUDIO_VOLUME` is zero, and used by tests.
    pub fn muted(config: &AudioConfig) -> Self {
        Self {
            backend: PlayerBackend::Muted,
            config: config.clone(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.backend, PlayerBackend::Device { .. })
            && Path::new(&self.config.success_sound).exists()
            && Path::new(&self.config.error_sound).exists()
    }

    fn cue_path(&self, cue: Cue) -> &str {
        match cue {
            Cue::Success => &self.config.success_sound,
            Cue::Error => &self.config.error_sound,
            Cue::Skip => self
                .config
                .skip_sound
                .as_deref()
                .unwrap_or(&self.config.error_sound),
        }
    }

    /// Play one cue, waiting at most `PLAYBACK_WAIT_MS` for it to complete.
    /// Exceeding the wait is not an error; the cue finishes on its own thread.
    pub async fn play(&self, cue: Cue) -> Result<()> {
        let path = PathBuf::from(self.cue_path(cue));

        let tx = match &self.backend {
            PlayerBackend::Muted => {
                tracing::debug!(cue = %cue, "Feedback muted, cue acknowledged");
                return Ok(());
            }
            PlayerBackend::Device { tx } => self
                .ensure_thread(tx)
                .map_err(LecternError::Playback)?,
        };

        let (done_tx, done_rx) = mpsc::channel();
        tx.send(AudioCommand::Play {
            path,
            volume: self.config.volume,
            done: done_tx,
        })
        .map_err(|_| LecternError::Playback("Audio thread terminated".to_string()))?;

        let wait = Duration::from_millis(self.config.playback_wait_ms);
        let outcome = tokio::task::spawn_blocking(move || done_rx.recv_timeout(wait))
            .await
            .map_err(|e| LecternError::Playback(format!("Playback wait task panicked: {e}")))?;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(msg)) => Err(LecternError::Playback(msg)),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    cue = %cue,
                    wait_ms = self.config.playback_wait_ms,
                    "Cue still playing past the wait budget, proceeding"
                );
                Ok(())
            }
            Err(RecvTimeoutError::Disconnected) => Err(LecternError::Playback(
                "Audio thread terminated".to_string(),
            )),
        }
    }

    fn ensure_thread(
        &self,
        tx_slot: &Arc<Mutex<Option<Sender<AudioCommand>>>>,
    ) -> std::result::Result<Sender<AudioCommand>, String> {
        if let Some(tx) = tx_slot.lock().map_err(|e| e.to_string())?.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        // Dedicated thread holding the non-Send audio objects.
        thread::Builder::new()
            .name("audio-feedback".to_string())
            .spawn(move || {
                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play { path, volume, done } => {
                            let result = play_file(&path, volume);
                            if let Err(ref e) = result {
                                tracing::warn!(error = %e, "Cue playback failed");
                            }
                            let _ = done.send(result);
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        let tx_clone = tx.clone();
        *tx_slot.lock().map_err(|e| e.to_string())? = Some(tx);
        Ok(tx_clone)
    }
}

/// Open, decode and drain one cue file. The output stream and sink live only
/// for this call, so the device is released on every exit path.
fn play_file(path: &Path, volume: f32) -> std::result::Result<(), String> {
    let file = File::open(path)
        .map_err(|e| format!("Failed to open cue {}: {e}", path.display()))?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| format!("Failed to decode cue {}: {e}", path.display()))?;

    let (_stream, handle) = OutputStream::try_default()
        .map_err(|e| format!("Failed to open audio output: {e}"))?;
    let sink =
        Sink::try_new(&handle).map_err(|e| format!("Failed to create audio sink: {e}"))?;

    sink.set_volume(volume.clamp(0.0, 1.0));
    sink.append(source);
    sink.sleep_until_end();

    Ok(())
}
