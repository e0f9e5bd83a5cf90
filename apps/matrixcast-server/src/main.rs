//! MatrixCast Server - Standalone headless server for MatrixCast.
//!
//! Accepts picture uploads over HTTP, encodes them into key/delta fragments
//! and plays them on an addressable LED matrix controller on request.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use matrixcast_core::{bootstrap_services, start_server, AppState};
use tokio::signal;

use crate::config::ServerConfig;

/// MatrixCast Server - Picture delivery to pixel-matrix controllers.
#[derive(Parser, Debug)]
#[command(name = "matrixcast-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "MATRIXCAST_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "MATRIXCAST_BIND_PORT")]
    port: Option<u16>,

    /// Matrix controller base URL (overrides config file).
    #[arg(short = 'm', long, env = "MATRIXCAST_MATRIX_URL")]
    matrix_url: Option<String>,

    /// Data directory for picture records.
    #[arg(short = 'd', long, env = "MATRIXCAST_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("MatrixCast Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(url) = args.matrix_url {
        config.matrix_url = url;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    log::info!(
        "Configuration: bind_port={}, matrix_url={}, matrix={}x{}",
        config.bind_port,
        config.matrix_url,
        config.width,
        config.height
    );

    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config).context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    let app_state = AppState::from_services(&services);
    if app_state.mark_services_started() {
        services.start_background_tasks();
        log::info!("Background tasks started");
    }

    // The server drains in-flight requests once the shared token is cancelled.
    let stop = services.cancel_token.clone().cancelled_owned();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state, stop).await {
            log::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    // Graceful shutdown
    services.shutdown().await;

    if let Err(e) = server_handle.await {
        log::warn!("Server task ended abnormally: {}", e);
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
