use serde::Deserialize;
use std::env;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse `ROTATION`, constraining it to a quarter-turn. Anything else falls
/// back to 0 with a warning.
fn parse_rotation() -> u32 {
    let degrees: u32 = parse_env_or("ROTATION", 0);
    match degrees {
        0 | 90 | 180 | 270 => degrees,
        other => {
            tracing::warn!(
                "Invalid value '{}' for ROTATION: must be 0, 90, 180 or 270. Using 0.",
                other
            );
            0
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub trigger: TriggerConfig,
    pub camera: CameraConfig,
    pub preprocess: PreprocessConfig,
    pub backend: BackendConfig,
    pub precheck: PrecheckConfig,
    pub audio: AudioConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// How trigger events reach the orchestrator. The HTTP endpoint is always
/// mounted; `Edge` and `Interval` additionally run a background producer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    Http,
    Edge,
    Interval,
}

impl std::str::FromStr for TriggerMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "edge" => Ok(Self::Edge),
            "interval" => Ok(Self::Interval),
            _ => Err(format!("Unknown trigger mode: {s}")),
        }
    }
}

impl std::fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Edge => write!(f, "edge"),
            Self::Interval => write!(f, "interval"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    pub mode: TriggerMode,
    /// File whose contents give the line level in edge mode (sysfs GPIO
    /// `value` files, or anything a helper script mirrors a pin into).
    pub probe_path: String,
    /// Window inside which repeated edges collapse into one event.
    pub debounce_ms: u64,
    /// A press shorter than this is treated as bounce and ignored.
    pub press_min_ms: u64,
    /// A press longer than this is treated as a stuck contact and ignored.
    pub press_max_ms: u64,
    /// Level-probe sampling period for the edge loop.
    pub poll_interval_ms: u64,
    /// Firing period for the interval (simulation) loop.
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Device identifier handed to the frame source (an index like `0`, or a
    /// path for the file-backed source).
    pub device: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub show_preview: bool,
    /// Bounded pre-capture preview, in seconds. Only applies with
    /// `show_preview`.
    pub preview_duration_secs: f64,
    /// Settle delay between opening the device and grabbing the frame.
    pub capture_delay_ms: u64,
    /// Hard bound on the whole acquire step, preview included.
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessConfig {
    /// Quarter-turn applied before resizing: 0, 90, 180 or 270.
    pub rotation: u32,
    /// Undo a source that mirrors horizontally (front-facing webcams).
    pub mirror: bool,
    /// Larger output dimension never exceeds this.
    pub max_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Full URL of the recognition endpoint.
    pub api_url: String,
    /// Default prompt when neither the caller nor the precheck supplies one.
    pub prompt: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrecheckConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub success_sound: String,
    pub error_sound: String,
    /// Distinct cue for skipped frames; falls back to the error cue when
    /// unset.
    pub skip_sound: Option<String>,
    pub volume: f32,
    /// Longest the orchestrator waits for a cue before returning to idle.
    pub playback_wait_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root for the result history file and saved captures.
    pub data_dir: String,
    pub save_captures: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("LECTERN_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("LECTERN_PORT", 3000),
            },
            trigger: TriggerConfig {
                mode: parse_env_or("TRIGGER_MODE", TriggerMode::Http),
                probe_path: env::var("TRIGGER_PROBE_PATH")
                    .unwrap_or_else(|_| "/sys/class/gpio/gpio17/value".to_string()),
                debounce_ms: parse_env_or("TRIGGER_DEBOUNCE_MS", 200),
                press_min_ms: parse_env_or("TRIGGER_PRESS_MIN_MS", 100),
                press_max_ms: parse_env_or("TRIGGER_PRESS_MAX_MS", 5000),
                poll_interval_ms: parse_env_or("TRIGGER_POLL_INTERVAL_MS", 10),
                interval_secs: parse_env_or("TRIGGER_INTERVAL_SECS", 10),
            },
            camera: CameraConfig {
                device: env::var("CAMERA_DEVICE").unwrap_or_else(|_| "0".to_string()),
                frame_width: parse_env_or("FRAME_WIDTH", 1280),
                frame_height: parse_env_or("FRAME_HEIGHT", 720),
                show_preview: parse_env_or("SHOW_PREVIEW", false),
                preview_duration_secs: parse_env_or("PREVIEW_DURATION", 2.0),
                capture_delay_ms: parse_env_or("CAPTURE_DELAY_MS", 500),
                acquire_timeout_secs: parse_env_or("ACQUIRE_TIMEOUT", 10),
            },
            preprocess: PreprocessConfig {
                rotation: parse_rotation(),
                mirror: parse_env_or("MIRROR", false),
                max_size: parse_env_or("MAX_SIZE", 1280),
            },
            backend: BackendConfig {
                api_url: env::var("OCR_API_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:5000/ocr".to_string()),
                prompt: env::var("OCR_PROMPT")
                    .unwrap_or_else(|_| "<image>\nFree OCR.".to_string()),
                request_timeout_secs: parse_env_or("REQUEST_TIMEOUT", 30),
            },
            precheck: PrecheckConfig {
                enabled: parse_env_or("PRECHECK_ENABLED", false),
                api_key: env::var("PRECHECK_API_KEY").ok(),
                base_url: env::var("PRECHECK_BASE_URL").ok(),
                model: env::var("PRECHECK_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                timeout_secs: parse_env_or("PRECHECK_TIMEOUT", 15),
            },
            audio: AudioConfig {
                success_sound: env::var("SUCCESS_SOUND")
                    .unwrap_or_else(|_| "voices/success.mp3".to_string()),
                error_sound: env::var("ERROR_SOUND")
                    .unwrap_or_else(|_| "voices/error.mp3".to_string()),
                skip_sound: env::var("SKIP_SOUND").ok(),
                volume: parse_env_or("AUDIO_VOLUME", 1.0),
                playback_wait_ms: parse_env_or("PLAYBACK_WAIT_MS", 5000),
            },
            storage: StorageConfig {
                data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
                save_captures: parse_env_or("SAVE_CAPTURES", true),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Freeze the values a session depends on. Taken once at trigger
    /// acceptance so a concurrent configuration change cannot alter a session
    /// already in flight.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            rotation: self.preprocess.rotation,
            mirror: self.preprocess.mirror,
            max_size: self.preprocess.max_size,
            prompt: self.backend.prompt.clone(),
            debounce_ms: self.trigger.debounce_ms,
            request_timeout_secs: self.backend.request_timeout_secs,
            acquire_timeout_secs: self.camera.acquire_timeout_secs,
            show_preview: self.camera.show_preview,
            preview_duration_secs: self.camera.preview_duration_secs,
            capture_delay_ms: self.camera.capture_delay_ms,
            playback_wait_ms: self.audio.playback_wait_ms,
            save_captures: self.storage.save_captures,
        }
    }
}

/// Immutable per-session copy of the configuration values the pipeline
/// reads. See [`Config::snapshot`].
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub rotation: u32,
    pub mirror: bool,
    pub max_size: u32,
    pub prompt: String,
    pub debounce_ms: u64,
    pub request_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
    pub show_preview: bool,
    pub preview_duration_secs: f64,
    pub capture_delay_ms: u64,
    pub playback_wait_ms: u64,
    pub save_captures: bool,
}
