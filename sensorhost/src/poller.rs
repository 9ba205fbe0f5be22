//! Timer-driven poll loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::time::{MissedTickBehavior, interval, timeout};

use sensorhost_common::Snapshot;

use crate::artifact::ArtifactWriter;
use crate::sensor::{SensorError, SensorReader};
use crate::store::SharedStore;

/// Polls every configured sensor on a fixed cadence and publishes the
/// results.
///
/// Cycles run inline in one task, so two cycles can never overlap. The
/// cadence is start-to-start; a cycle that overruns the interval is
/// followed immediately by the next one, without catch-up bursts.
pub struct PollLoop {
    sensors: Vec<String>,
    reader: Arc<dyn SensorReader>,
    store: SharedStore,
    artifacts: Arc<ArtifactWriter>,
    refresh_interval: Duration,
    read_timeout: Duration,
}

impl PollLoop {
    /// Create a poll loop over the given sensors.
    pub fn new(
        sensors: Vec<String>,
        reader: Arc<dyn SensorReader>,
        store: SharedStore,
        artifacts: Arc<ArtifactWriter>,
        refresh_interval: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            sensors,
            reader,
            store,
            artifacts,
            refresh_interval,
            read_timeout,
        }
    }

    /// Run until the shutdown signal flips.
    ///
    /// The interval's first tick completes immediately, so the first poll
    /// happens right away rather than one full interval after start. A
    /// forced refresh runs a cycle as soon as the loop is idle and restarts
    /// the cadence from it.
    pub async fn run(self, mut refresh_rx: mpsc::Receiver<()>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            sensors = self.sensors.len(),
            interval_secs = self.refresh_interval.as_secs_f64(),
            "Starting poll loop"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                Some(()) = refresh_rx.recv() => {
                    tracing::debug!("Forced refresh requested");
                    self.run_cycle().await;
                    ticker.reset();
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Poll loop stopped");
    }

    /// Poll every sensor once, publishing each artifact and updating the
    /// store. The store is updated even when the artifact write fails.
    async fn run_cycle(&self) {
        let started = Instant::now();

        for sensor in &self.sensors {
            let snapshot = self.poll_sensor(sensor).await;

            if let Err(e) = self.artifacts.publish(&snapshot).await {
                tracing::error!(sensor = %sensor, error = %e, "Failed to publish artifact");
            }
            self.store.put(snapshot);
        }

        tracing::debug!(
            sensors = self.sensors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Poll cycle complete"
        );
    }

    /// Read one sensor with the per-call timeout applied.
    async fn poll_sensor(&self, sensor: &str) -> Snapshot {
        match timeout(self.read_timeout, self.reader.read(sensor)).await {
            Ok(Ok(reading)) => Snapshot::ok(sensor, reading),
            Ok(Err(e)) => {
                tracing::warn!(sensor = %sensor, error = %e, "Sensor read failed");
                Snapshot::failed(sensor, e.to_string())
            }
            Err(_) => {
                let e = SensorError::Timeout(self.read_timeout.as_secs_f64());
                tracing::warn!(sensor = %sensor, error = %e, "Sensor read failed");
                Snapshot::failed(sensor, e.to_string())
            }
        }
    }
}
