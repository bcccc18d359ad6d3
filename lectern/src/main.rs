use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lectern::api::{create_router, AppState};
use lectern::audio::FeedbackPlayer;
use lectern::capture::FrameAcquirer;
use lectern::config::{Config, TriggerMode};
use lectern::models::TriggerEvent;
use lectern::ocr::{DisabledPrecheck, OcrClient, SkipPrecheck, VisionPrecheck};
use lectern::session::Orchestrator;
use lectern::store::ResultStore;
use lectern::trigger::{EdgeTrigger, FileLevelProbe, IntervalTrigger};

#[derive(Parser)]
#[command(name = "lectern")]
#[command(about = "Self-hostable reading machine: capture trigger to OCR text to audible answer")]
struct Args {
    /// Run a single capture session against the local frame source, print
    /// the result record as JSON, and exit
    #[arg(long)]
    capture_once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    // RUST_LOG wins; LOG_LEVEL is the coarse knob for deployments that only
    // set one variable.
    let default_filter = std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "lectern=info,tower_http=debug".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    tracing::info!("Opening result history in {}...", config.storage.data_dir);
    let store = Arc::new(ResultStore::open(Path::new(&config.storage.data_dir)).await?);

    tracing::info!("Initializing OCR backend client: {}...", config.backend.api_url);
    let client = OcrClient::new(&config.backend)?;

    let precheck: Arc<dyn SkipPrecheck> = if config.precheck.enabled {
        match VisionPrecheck::new(&config.precheck) {
            Ok(p) => {
                tracing::info!("Precheck enabled with model {}", config.precheck.model);
                Arc::new(p)
            }
            Err(e) => {
                tracing::warn!("Precheck unavailable ({e}) - every frame will be submitted");
                Arc::new(DisabledPrecheck)
            }
        }
    } else {
        Arc::new(DisabledPrecheck)
    };

    let player = if config.audio.volume > 0.0 {
        FeedbackPlayer::new(&config.audio)
    } else {
        FeedbackPlayer::muted(&config.audio)
    };
    let player = Arc::new(player);
    if config.audio.volume > 0.0 && !player.is_available() {
        tracing::warn!("Configured audio cues missing - sessions will finish without sound");
    }

    let acquirer = Arc::new(FrameAcquirer::new(&config.camera));
    if !acquirer.is_available() {
        tracing::warn!(
            "Frame source unavailable - hardware and scheduled triggers will fail \
             until CAMERA_DEVICE points at an image file"
        );
    }

    let cancel_token = CancellationToken::new();

    let orchestrator = Arc::new(Orchestrator::new(
        config.clone(),
        store.clone(),
        client,
        precheck,
        player.clone(),
        acquirer.clone(),
        cancel_token.clone(),
    ));

    if args.capture_once {
        let outcome = orchestrator
            .submit_trigger(TriggerEvent::from_remote_trigger())
            .await?;
        println!("{}", serde_json::to_string_pretty(&outcome.record)?);
        return Ok(());
    }

    match config.trigger.mode {
        TriggerMode::Edge => {
            tracing::info!(
                "Starting edge trigger on {}...",
                config.trigger.probe_path
            );
            let probe = Arc::new(FileLevelProbe::new(config.trigger.probe_path.clone()));
            let trigger = EdgeTrigger::new(probe, &config.trigger, orchestrator.clone());
            let token = cancel_token.child_token();
            tokio::spawn(trigger.run(token));
        }
        TriggerMode::Interval => {
            tracing::info!(
                "Starting interval trigger every {}s...",
                config.trigger.interval_secs
            );
            let trigger = IntervalTrigger::new(&config.trigger, orchestrator.clone());
            let token = cancel_token.child_token();
            tokio::spawn(trigger.run(token));
        }
        TriggerMode::Http => {
            tracing::info!("No background trigger - captures fire over HTTP only");
        }
    }

    let state = AppState::new(
        Arc::new(config.clone()),
        store,
        orchestrator,
        acquirer,
        player,
    );
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Lectern starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);
    tracing::info!("  API docs:     http://{}/api/v1/docs", addr);
    tracing::info!("  OpenAPI spec: http://{}/api/v1/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling background triggers...");
    cancel_token.cancel();
}
