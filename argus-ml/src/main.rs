//! argus-ml: anomaly detection over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use argus_detect::config::DetectionMode;
use argus_detect::logging::setup::{init_logging, LoggingConfig};
use argus_ml::{create_router, settings::build_engine, AppState};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "argus-ml", version, about = "Ensemble anomaly detection service")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "ARGUS_LISTEN_ADDR", default_value = "0.0.0.0:5001")]
    listen: SocketAddr,

    /// Detection mode: single or ensemble
    #[arg(long, env = "ARGUS_DETECTION_MODE", default_value = "ensemble")]
    mode: DetectionMode,

    /// JSON engine configuration; overrides --mode
    #[arg(long, env = "ARGUS_CONFIG")]
    config: Option<PathBuf>,

    /// Per-detector timeout in milliseconds
    #[arg(long, env = "ARGUS_DETECTOR_TIMEOUT_MS")]
    detector_timeout_ms: Option<u64>,

    /// Log filter, e.g. "info,argus_detect=debug"
    #[arg(long, env = "ARGUS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit JSON log lines
    #[arg(long, env = "ARGUS_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(
        LoggingConfig::default()
            .with_env_filter(cli.log_level.as_str())
            .with_json_format(cli.log_json),
    )
    .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    let engine = build_engine(cli.config.as_deref(), cli.mode, cli.detector_timeout_ms)?;
    info!(
        mode = %engine.mode(),
        min_points = engine.min_points(),
        detectors = ?engine.methods(),
        "Detection engine ready"
    );

    let app = create_router(AppState::new(engine));
    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    info!("argus-ml listening on {}", cli.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("argus-ml stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
