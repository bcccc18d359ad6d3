//! Hardware and scheduled trigger producers.
//!
//! Both loops funnel into `Orchestrator::submit_trigger`, the same entry
//! point the HTTP handlers use. The edge watcher samples a line level,
//! debounces the rising edge and accepts only presses inside the configured
//! window; the interval loop fires on a fixed period for deployments without
//! a button. Neither queues work: a trigger that lands while a session is in
//! flight is dropped and counted by the orchestrator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TriggerConfig;
use crate::models::{TriggerEvent, TriggerOrigin};
use crate::session::Orchestrator;

/// Samples the trigger line. The GPIO driver itself lives outside this
/// service; implementations read whatever the deployment exposes as a level.
pub trait LevelProbe: Send + Sync {
    /// Current line level, true when the trigger is active.
    fn level(&self) -> bool;
}

/// Probe reading the level from a file, the shape exposed by sysfs GPIO
/// `value` files and by helper scripts that mirror a pin into a file.
pub struct FileLevelProbe {
    path: PathBuf,
}

impl FileLevelProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LevelProbe for FileLevelProbe {
    fn level(&self) -> bool {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => matches!(contents.trim(), "1" | "high" | "true"),
            Err(_) => false,
        }
    }
}

/// Debounce a detected rising edge and measure the hold. Returns the press
/// duration only for a press inside the configured window; bounces, holds
/// past `press_max_ms` and cancellation all return `None`. A stuck contact
/// is drained to release before re-arming, so one long hold cannot fire
/// twice.
async fn detect_press(
    probe: &dyn LevelProbe,
    config: &TriggerConfig,
    token: &CancellationToken,
) -> Option<Duration> {
    let pressed_at = Instant::now();
    let poll = Duration::from_millis(config.poll_interval_ms.max(1));
    let max = Duration::from_millis(config.press_max_ms);

    tokio::time::sleep(Duration::from_millis(config.debounce_ms)).await;
    if !probe.level() {
        debug!("Edge did not survive debounce, ignoring");
        return None;
    }

    while probe.level() {
        if token.is_cancelled() {
            return None;
        }
        if pressed_at.elapsed() > max {
            debug!("Press exceeded the window, treating as stuck contact");
            while probe.level() && !token.is_cancelled() {
                tokio::time::sleep(poll).await;
            }
            return None;
        }
        tokio::time::sleep(poll).await;
    }

    let held = pressed_at.elapsed();
    if held < Duration::from_millis(config.press_min_ms) {
        debug!(
            held_ms = held.as_millis() as u64,
            "Press shorter than the window, ignoring"
        );
        return None;
    }

    Some(held)
}

/// Watches the level probe for debounced presses.
pub struct EdgeTrigger {
    probe: Arc<dyn LevelProbe>,
    config: TriggerConfig,
    orchestrator: Arc<Orchestrator>,
}

impl EdgeTrigger {
    pub fn new(
        probe: Arc<dyn LevelProbe>,
        config: &TriggerConfig,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            probe,
            config: config.clone(),
            orchestrator,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let mut last_level = self.probe.level();
        info!(poll_ms = poll.as_millis() as u64, "Edge trigger watching");

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Edge trigger shutting down...");
                    break;
                }
                _ = tokio::time::sleep(poll) => {
                    let level = self.probe.level();
                    let rising = level && !last_level;
                    last_level = level;

                    if rising {
                        if let Some(held) = detect_press(self.probe.as_ref(), &self.config, &token).await {
                            debug!(held_ms = held.as_millis() as u64, "Press accepted");
                            // Detached so the watcher keeps sampling while the
                            // session runs; overlapping presses then reach the
                            // orchestrator and are counted as dropped.
                            let orchestrator = self.orchestrator.clone();
                            tokio::spawn(async move {
                                let event = TriggerEvent::from_hardware(TriggerOrigin::Edge);
                                match orchestrator.submit_trigger(event).await {
                                    Ok(outcome) => {
                                        info!(status = %outcome.record.status, "Edge capture finished");
                                    }
                                    Err(e) => {
                                        warn!(error = %e, "Edge capture did not run");
                                    }
                                }
                            });
                        }
                        last_level = self.probe.level();
                    }
                }
            }
        }
    }
}

/// Fires a capture on a fixed period. Used by deployments without a button
/// and for soak testing the pipeline.
pub struct IntervalTrigger {
    config: TriggerConfig,
    orchestrator: Arc<Orchestrator>,
}

impl IntervalTrigger {
    pub fn new(config: &TriggerConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            config: config.clone(),
            orchestrator,
        }
    }

    pub async fn run(self, token: CancellationToken) {
        info!(interval_secs = self.config.interval_secs, "Interval trigger running");

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Interval trigger shutting down...");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs(self.config.interval_secs)) => {
                    let event = TriggerEvent::from_hardware(TriggerOrigin::Schedule);
                    match self.orchestrator.submit_trigger(event).await {
                        Ok(outcome) => {
                            info!(status = %outcome.record.status, "Scheduled capture finished");
                        }
                        Err(e) => {
                            warn!(error = %e, "Scheduled capture did not run");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed sequence of levels, then holds the last one.
    struct ScriptedProbe {
        levels: Mutex<VecDeque<bool>>,
        last: AtomicBool,
    }

    impl ScriptedProbe {
        fn new(levels: &[bool]) -> Self {
            Self {
                levels: Mutex::new(levels.iter().copied().collect()),
                last: AtomicBool::new(*levels.last().unwrap_or(&false)),
            }
        }
    }

    impl LevelProbe for ScriptedProbe {
        fn level(&self) -> bool {
            match self.levels.lock().unwrap().pop_front() {
                Some(level) => {
                    self.last.store(level, Ordering::SeqCst);
                    level
                }
                None => self.last.load(Ordering::SeqCst),
            }
        }
    }

    fn make_config() -> TriggerConfig {
        TriggerConfig {
            mode: crate::config::TriggerMode::Edge,
            probe_path: "/dev/null".to_string(),
            debounce_ms: 200,
            press_min_ms: 100,
            press_max_ms: 5000,
            poll_interval_ms: 10,
            interval_secs: 10,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounce_is_rejected_by_debounce() {
        let probe = ScriptedProbe::new(&[false]);
        let token = CancellationToken::new();
        let result = detect_press(&probe, &make_config(), &token).await;
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_press_is_measured() {
        // Survives debounce, held for two polls, then released.
        let probe = ScriptedProbe::new(&[true, true, true, false]);
        let token = CancellationToken::new();
        let held = detect_press(&probe, &make_config(), &token)
            .await
            .expect("press should be accepted");
        assert!(held >= Duration::from_millis(200));
        assert!(held <= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_press_is_rejected() {
        let probe = ScriptedProbe::new(&[true, true, true, false]);
        let token = CancellationToken::new();
        let mut config = make_config();
        config.press_min_ms = 500;
        let result = detect_press(&probe, &config, &token).await;
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_contact_is_rejected() {
        let probe = ScriptedProbe::new(&[true, true, true, true, false]);
        let token = CancellationToken::new();
        let mut config = make_config();
        config.press_max_ms = 300;
        config.poll_interval_ms = 100;
        let result = detect_press(&probe, &config, &token).await;
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_press_measurement() {
        let probe = ScriptedProbe::new(&[true, true]);
        let token = CancellationToken::new();
        token.cancel();
        let result = detect_press(&probe, &make_config(), &token).await;
        assert!(result.is_none());
    }

    #[test]
    fn test_file_probe_levels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value");

        std::fs::write(&path, "1\n").unwrap();
        assert!(FileLevelProbe::new(&path).level());

        std::fs::write(&path, "high").unwrap();
        assert!(FileLevelProbe::new(&path).level());

        std::fs::write(&path, "0\n").unwrap();
        assert!(!FileLevelProbe::new(&path).level());
    }

    #[test]
    fn test_file_probe_missing_file_is_inactive() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FileLevelProbe::new(dir.path().join("gone"));
        assert!(!probe.level());
    }
}
