//! Host lifecycle: wires the snapshot store, poll loop, artifact writer,
//! and HTTP server together.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use sensorhost_common::HostConfig;
use sensorhost_common::config::ConfigError;

use crate::artifact::ArtifactWriter;
use crate::control::{
    HostCommand, RefreshResponse, StatusResponse, error_response, unknown_command_response,
};
use crate::http::HttpServer;
use crate::poller::PollLoop;
use crate::sensor::SensorReader;
use crate::store::{SharedStore, SnapshotStore};

/// Bound on waiting for background tasks during stop.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Host lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifecycle::Stopped => write!(f, "stopped"),
            Lifecycle::Starting => write!(f, "starting"),
            Lifecycle::Running => write!(f, "running"),
            Lifecycle::Stopping => write!(f, "stopping"),
        }
    }
}

/// Errors that prevent the host from reaching `Running`.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("Failed to create artifact directory: {0}")]
    Io(#[from] std::io::Error),
}

/// A running sensor host instance.
///
/// Owns the background poll and HTTP tasks, the snapshot store, and the
/// artifact directory for one run. Multiple hosts can coexist in one
/// process (each with its own port and artifact root). The artifact
/// directory is removed when the host is dropped.
pub struct SensorHost {
    config: HostConfig,
    state: RwLock<Lifecycle>,
    started_at: Instant,
    temp_dir: tempfile::TempDir,
    store: SharedStore,
    local_addr: SocketAddr,
    refresh_tx: mpsc::Sender<()>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SensorHost {
    /// Validate the configuration, bind the HTTP listener, and start the
    /// poll and server tasks.
    ///
    /// The first poll cycle begins immediately, but artifacts are not
    /// guaranteed to exist until it completes.
    pub async fn start(
        config: HostConfig,
        reader: Arc<dyn SensorReader>,
    ) -> Result<Self, HostError> {
        config.validate()?;

        info!(sensors = config.sensors.len(), "Starting sensor host");

        let temp_dir = create_artifact_root(&config)?;
        let artifacts = Arc::new(ArtifactWriter::new(temp_dir.path()));
        let store: SharedStore = Arc::new(SnapshotStore::new());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        // Capacity 1: any burst of refresh requests collapses into at most
        // one queued cycle.
        let (refresh_tx, refresh_rx) = mpsc::channel(1);

        // Safe narrowing: validate() bounds the port to 1..=65535.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port as u16));
        let server = HttpServer::bind(addr, config.sensors.clone(), Arc::clone(&artifacts))
            .await
            .map_err(|source| HostError::Bind { addr, source })?;
        let local_addr = server.local_addr();

        let poll_loop = PollLoop::new(
            config.sensors.clone(),
            reader,
            Arc::clone(&store),
            artifacts,
            config.refresh_duration(),
            config.read_timeout_duration(),
        );

        let poll_task = tokio::spawn(poll_loop.run(refresh_rx, shutdown_rx.clone()));
        let http_task = tokio::spawn(async move {
            if let Err(e) = server.run(shutdown_rx).await {
                error!("HTTP server error: {}", e);
            }
        });

        info!(
            port = local_addr.port(),
            refresh_secs = config.refresh,
            temp_dir = %temp_dir.path().display(),
            "Sensor host running"
        );

        Ok(Self {
            config,
            state: RwLock::new(Lifecycle::Running),
            started_at: Instant::now(),
            temp_dir,
            store,
            local_addr,
            refresh_tx,
            shutdown_tx,
            tasks: vec![poll_task, http_task],
        })
    }

    /// Stop the host: signal shutdown, then wait up to a bounded grace
    /// period for the poll loop and HTTP server before aborting them.
    ///
    /// Idempotent; calling stop on a host that is not running is a no-op.
    pub async fn stop(&mut self) {
        {
            let mut state = self.state.write();
            if *state != Lifecycle::Running {
                return;
            }
            *state = Lifecycle::Stopping;
        }

        info!("Stopping sensor host");
        let _ = self.shutdown_tx.send(true);

        let deadline = Instant::now() + STOP_GRACE;
        for mut task in std::mem::take(&mut self.tasks) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, &mut task).await.is_err() {
                warn!("Task did not stop within the grace period, aborting");
                task.abort();
                // Await the cancelled task so no late store writes can land
                // after stop() returns.
                let _ = task.await;
            }
        }

        *self.state.write() = Lifecycle::Stopped;
        info!(
            uptime_secs = self.started_at.elapsed().as_secs(),
            "Sensor host stopped"
        );
    }

    /// Report runtime status. Answers in every lifecycle state.
    pub fn status(&self) -> StatusResponse {
        StatusResponse {
            running: *self.state.read() == Lifecycle::Running,
            port: self.local_addr.port(),
            sensors: self.config.sensors.clone(),
            refresh_interval: self.config.refresh,
            temp_dir: self.temp_dir.path().display().to_string(),
        }
    }

    /// Request an immediate poll cycle, fire-and-forget.
    ///
    /// Returns `true` when the request was accepted or a refresh is already
    /// pending, `false` when the host is not running.
    pub fn trigger_refresh(&self) -> bool {
        if *self.state.read() != Lifecycle::Running {
            return false;
        }
        match self.refresh_tx.try_send(()) {
            Ok(()) => true,
            // A pending request already guarantees a fresh cycle.
            Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    /// Handle a JSON command envelope (see [`crate::control`]).
    pub fn handle_command(&self, request: &Value) -> Value {
        match HostCommand::parse(request) {
            Some(HostCommand::Status) => {
                serde_json::to_value(self.status()).unwrap_or(Value::Null)
            }
            Some(HostCommand::RefreshNow) => {
                if self.trigger_refresh() {
                    serde_json::to_value(RefreshResponse::default()).unwrap_or(Value::Null)
                } else {
                    error_response("sensor host is not running")
                }
            }
            None => unknown_command_response(request),
        }
    }

    /// Whether the host is currently in the `Running` state.
    pub fn is_running(&self) -> bool {
        *self.state.read() == Lifecycle::Running
    }

    /// The address the HTTP server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The in-memory snapshot store.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// The artifact directory for this run.
    pub fn artifact_root(&self) -> &Path {
        self.temp_dir.path()
    }
}

impl Drop for SensorHost {
    fn drop(&mut self) {
        // Dropping without stop() still tears the background tasks down.
        let _ = self.shutdown_tx.send(true);
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Create the process-scoped artifact directory.
///
/// Uses the configured parent when set, otherwise `/dev/shm` when present
/// so artifacts stay in RAM, otherwise the system temp dir.
fn create_artifact_root(config: &HostConfig) -> std::io::Result<tempfile::TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("sensorhost-");

    if let Some(parent) = &config.artifact_dir {
        return builder.tempdir_in(parent);
    }

    let shm = Path::new("/dev/shm");
    if shm.is_dir() {
        builder.tempdir_in(shm)
    } else {
        builder.tempdir()
    }
}
