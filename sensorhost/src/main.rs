//! Sensor polling daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use sensorhost::{SensorHost, SysinfoReader};
use sensorhost_common::{HostConfig, init_tracing};

/// Sensor polling daemon serving current readings over HTTP.
#[derive(Parser, Debug)]
#[command(name = "sensorhost")]
#[command(about = "Poll sensors and serve their readings as JSON artifacts", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the configuration file (JSON5 format).
    #[arg(short, long, default_value = "sensorhost.json5")]
    config: PathBuf,

    /// HTTP port (overrides config).
    #[arg(long)]
    port: Option<u16>,

    /// Log level (overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = HostConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // CLI overrides
    if let Some(port) = args.port {
        config.port = port.into();
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    // Initialize tracing
    init_tracing(&config.logging).context("Failed to initialize tracing")?;

    info!(
        config = ?args.config,
        sensors = config.sensors.len(),
        "Starting sensorhost"
    );

    let reader = Arc::new(SysinfoReader::new());
    let mut host = SensorHost::start(config, reader).await?;

    wait_for_shutdown(&host).await;

    host.stop().await;

    info!(snapshots = host.store().len(), "Final statistics");
    info!("Goodbye!");
    Ok(())
}

/// Block until SIGINT or SIGTERM; SIGHUP forces an immediate refresh.
#[cfg(unix)]
async fn wait_for_shutdown(host: &SensorHost) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).unwrap();
    let mut sighup = signal(SignalKind::hangup()).unwrap();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break;
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, forcing refresh");
                host.trigger_refresh();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_host: &SensorHost) {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl+C, shutting down...");
}
