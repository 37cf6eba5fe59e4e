//! ExoVision web service - entry point
//!
//! Resolves configuration (CLI > environment > TOML > defaults), loads the
//! classifier artifacts and serves the UI and API until interrupted.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use exo_common::config::{ConfigOverrides, ServiceConfig};
use exo_vision::services::ChatRelay;
use exo_vision::{build_router, AppState, ClassifierStatus};
use tokio::signal;
use tracing::{info, warn};

/// How often idle sessions are swept
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Command-line arguments for exo-vision
#[derive(Parser, Debug)]
#[command(name = "exo-vision")]
#[command(about = "Exoplanet transit simulator, guessing game and Kepler classifier")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "EXO_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5730
    #[arg(short, long)]
    bind: Option<String>,

    /// Directory holding model.json, features.json and metrics.json
    #[arg(short, long)]
    artifacts_dir: Option<PathBuf>,

    /// Decision threshold on P(CONFIRMED)
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        bind: args.bind,
        artifacts_dir: args.artifacts_dir,
        threshold: args.threshold,
        log_level: args.log_level,
    };
    let config = ServiceConfig::resolve(args.config.as_deref(), &overrides)
        .context("Failed to resolve configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "exo_vision={level},exo_common={level},tower_http=info",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .init();

    info!(
        "Starting ExoVision (exo-vision) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Artifacts directory: {}", config.artifacts_dir.display());

    let classifier = ClassifierStatus::load(&config);
    if !classifier.is_ready() {
        warn!("Classifier routes will answer 503 until artifacts are provided");
    }

    let chat = ChatRelay::new(config.chat.clone()).context("Failed to build chat client")?;
    info!(
        "Chat assistant: model {} at {}",
        chat.config().model,
        chat.config().host
    );

    let bind = config.bind.clone();
    let idle = Duration::from_secs(config.session_idle_secs);
    let state = AppState::new(config, classifier, chat);
    let sweeper = state.sessions.spawn_sweeper(idle, SWEEP_INTERVAL);

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("exo-vision listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
