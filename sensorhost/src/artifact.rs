//! Atomic JSON artifact publishing.
//!
//! Each sensor owns one directory under the artifact root, holding
//! `current.json` (the served artifact) and transiently `next.json` (the
//! staging file). A publish writes the full document to `next.json` and
//! renames it over `current.json`; both live in the same directory, so the
//! rename is atomic and a concurrent reader sees either the complete old
//! content or the complete new content.

use std::path::{Path, PathBuf};

use sensorhost_common::Snapshot;
use thiserror::Error;

/// Name of the served artifact file inside a sensor directory.
pub const CURRENT_FILE: &str = "current.json";

/// Name of the staging file inside a sensor directory.
const STAGING_FILE: &str = "next.json";

/// Errors during artifact publishing.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to serialize artifact: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes per-sensor snapshot artifacts under a fixed root directory.
///
/// The poll loop is the sole writer; the HTTP layer only reads
/// `current.json`, so the staging file is never contended.
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    /// Create a writer rooted at `root`. The root must already exist; sensor
    /// subdirectories are created on demand.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The artifact root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the served artifact for a sensor.
    pub fn current_path(&self, sensor: &str) -> PathBuf {
        self.root.join(sensor).join(CURRENT_FILE)
    }

    /// Serialize the snapshot's payload and atomically replace the sensor's
    /// artifact with it.
    pub async fn publish(&self, snapshot: &Snapshot) -> Result<(), ArtifactError> {
        let dir = self.root.join(&snapshot.sensor);
        let staging = dir.join(STAGING_FILE);
        let current = dir.join(CURRENT_FILE);

        let bytes = serde_json::to_vec_pretty(&snapshot.artifact_payload())?;

        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &current).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorhost_common::Reading;
    use serde_json::{Value, json};

    fn make_reading(value: i64) -> Reading {
        let mut reading = Reading::new();
        reading.insert("value".to_string(), json!(value));
        reading
    }

    async fn read_artifact(writer: &ArtifactWriter, sensor: &str) -> Value {
        let bytes = tokio::fs::read(writer.current_path(sensor)).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_publish_creates_current_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        writer
            .publish(&Snapshot::ok("cpu", make_reading(42)))
            .await
            .unwrap();

        let payload = read_artifact(&writer, "cpu").await;
        assert_eq!(payload["value"], json!(42));

        // The staging file must not survive a publish.
        assert!(!dir.path().join("cpu").join("next.json").exists());
    }

    #[tokio::test]
    async fn test_publish_replaces_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        writer
            .publish(&Snapshot::ok("cpu", make_reading(1)))
            .await
            .unwrap();
        writer
            .publish(&Snapshot::ok("cpu", make_reading(2)))
            .await
            .unwrap();

        let payload = read_artifact(&writer, "cpu").await;
        assert_eq!(payload["value"], json!(2));
    }

    #[tokio::test]
    async fn test_publish_error_payload() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        writer
            .publish(&Snapshot::failed("cpu", "read timed out after 0.5s"))
            .await
            .unwrap();

        let payload = read_artifact(&writer, "cpu").await;
        assert_eq!(payload["error"], json!("read timed out after 0.5s"));
        assert!(payload["timestamp"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn test_publish_fails_on_unwritable_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        tokio::fs::write(&file, b"x").await.unwrap();

        // Rooting the writer at a regular file makes create_dir_all fail.
        let writer = ArtifactWriter::new(&file);
        let result = writer.publish(&Snapshot::ok("cpu", make_reading(1))).await;

        assert!(matches!(result, Err(ArtifactError::Io(_))));
    }

    #[test]
    fn test_current_path_is_per_sensor() {
        let writer = ArtifactWriter::new("/run/sensorhost");

        assert_eq!(
            writer.current_path("cpu"),
            PathBuf::from("/run/sensorhost/cpu/current.json")
        );
        assert_eq!(
            writer.current_path("memory"),
            PathBuf::from("/run/sensorhost/memory/current.json")
        );
    }
}
