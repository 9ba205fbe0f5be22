//! HTTP server for sensor artifacts.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::artifact::ArtifactWriter;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    sensors: Arc<HashSet<String>>,
    artifacts: Arc<ArtifactWriter>,
}

/// Create the HTTP router.
///
/// One route serves every configured sensor; nothing else is exposed, and
/// sensors outside the configured set are indistinguishable from unknown
/// paths.
fn create_router(sensors: Arc<HashSet<String>>, artifacts: Arc<ArtifactWriter>) -> Router {
    let state = AppState { sensors, artifacts };

    Router::new()
        .route("/:sensor/current.json", get(artifact_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for `GET /{sensor}/current.json`.
///
/// 200 with the artifact bytes, 404 for unconfigured sensors or before the
/// first completed poll, 500 only when reading the artifact file itself
/// fails. A failing sensor is a 200 with an error payload, written by the
/// poll loop.
async fn artifact_handler(
    State(state): State<AppState>,
    Path(sensor): Path<String>,
) -> Response {
    if !state.sensors.contains(&sensor) {
        return (StatusCode::NOT_FOUND, "unknown sensor\n").into_response();
    }

    let path = state.artifacts.current_path(&sensor);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [("content-type", "application/json")],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "no reading available yet\n").into_response()
        }
        Err(e) => {
            tracing::error!(sensor = %sensor, error = %e, "Failed to read artifact");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read artifact\n",
            )
                .into_response()
        }
    }
}

/// HTTP artifact server.
pub struct HttpServer {
    listener: tokio::net::TcpListener,
    local_addr: SocketAddr,
    sensors: Arc<HashSet<String>>,
    artifacts: Arc<ArtifactWriter>,
}

impl HttpServer {
    /// Bind the listening socket.
    ///
    /// Binding happens here rather than in [`run`](Self::run) so that a port
    /// conflict fails host startup, and so callers binding port 0 can learn
    /// the real port.
    pub async fn bind(
        addr: SocketAddr,
        sensors: Vec<String>,
        artifacts: Arc<ArtifactWriter>,
    ) -> std::io::Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            sensors: Arc::new(sensors.into_iter().collect()),
            artifacts,
        })
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.sensors, self.artifacts);

        info!(addr = %self.local_addr, "HTTP server listening");

        // Run server with graceful shutdown
        axum::serve(self.listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
