//! In-memory store holding the latest snapshot per sensor.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sensorhost_common::Snapshot;

/// Thread-safe snapshot store.
///
/// The poll loop is the only writer; the HTTP layer and the control
/// interface read concurrently. Each `put` replaces the prior snapshot for
/// that sensor wholesale, so readers always observe a complete snapshot.
pub struct SnapshotStore {
    /// Latest snapshot per sensor name.
    snapshots: RwLock<HashMap<String, Snapshot>>,
}

impl SnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the snapshot for a sensor unconditionally.
    pub fn put(&self, snapshot: Snapshot) {
        let mut snapshots = self.snapshots.write();
        snapshots.insert(snapshot.sensor.clone(), snapshot);
    }

    /// Get the latest snapshot for a sensor, if any poll has completed.
    pub fn get(&self, sensor: &str) -> Option<Snapshot> {
        self.snapshots.read().get(sensor).cloned()
    }

    /// Get all current snapshots keyed by sensor name.
    pub fn get_all(&self) -> HashMap<String, Snapshot> {
        self.snapshots.read().clone()
    }

    /// Number of sensors with at least one completed poll.
    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    /// Whether no poll has completed yet.
    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a shareable store handle.
pub type SharedStore = Arc<SnapshotStore>;
