//! Sensor read capability and builtin backends.
//!
//! The poll loop talks to sensors through the [`SensorReader`] trait only.
//! One implementation serves every configured sensor name, which keeps the
//! loop testable with scripted fakes and leaves room for real hardware
//! drivers behind the same seam.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use sensorhost_common::Reading;
use serde_json::json;
use sysinfo::System;
use thiserror::Error;

/// Errors from a single sensor read.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("read timed out after {0:.1}s")]
    Timeout(f64),
    #[error("driver fault: {0}")]
    Driver(String),
}

/// The "read current readings of sensor S" capability.
///
/// Implementations must be safe to call concurrently. The caller imposes
/// the per-call timeout, so `read` may be cancelled at any await point.
#[async_trait]
pub trait SensorReader: Send + Sync {
    /// Read the current values of the named sensor.
    async fn read(&self, sensor: &str) -> Result<Reading, SensorError>;
}

/// Local-machine backend built on sysinfo.
///
/// Serves three builtin sensor names: `cpu`, `memory`, and `system`. Any
/// other name is a driver fault.
pub struct SysinfoReader {
    system: Mutex<System>,
    hostname: String,
}

impl SysinfoReader {
    /// Create a reader with a fully refreshed system handle.
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_all()),
            hostname: detect_hostname(),
        }
    }

    fn read_cpu(&self) -> Reading {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();

        let per_core: Vec<f32> = system.cpus().iter().map(|cpu| cpu.cpu_usage()).collect();

        let mut reading = Reading::new();
        reading.insert(
            "usage_percent".to_string(),
            json!(system.global_cpu_usage()),
        );
        reading.insert("core_count".to_string(), json!(system.cpus().len()));
        reading.insert("per_core_percent".to_string(), json!(per_core));
        reading
    }

    fn read_memory(&self) -> Reading {
        let mut system = self.system.lock();
        system.refresh_memory();

        let total = system.total_memory();
        let used = system.used_memory();
        let usage_pct = if total > 0 {
            (used as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        let mut reading = Reading::new();
        reading.insert("total_bytes".to_string(), json!(total));
        reading.insert("used_bytes".to_string(), json!(used));
        reading.insert(
            "available_bytes".to_string(),
            json!(system.available_memory()),
        );
        reading.insert("usage_percent".to_string(), json!(usage_pct));
        reading.insert("swap_total_bytes".to_string(), json!(system.total_swap()));
        reading.insert("swap_used_bytes".to_string(), json!(system.used_swap()));
        reading
    }

    fn read_system(&self) -> Reading {
        let load_avg = System::load_average();

        let mut reading = Reading::new();
        reading.insert("hostname".to_string(), json!(self.hostname));
        reading.insert(
            "os".to_string(),
            json!(System::name().unwrap_or_else(|| "unknown".to_string())),
        );
        reading.insert("uptime_secs".to_string(), json!(System::uptime()));
        reading.insert("boot_time".to_string(), json!(System::boot_time()));
        reading.insert("load_1m".to_string(), json!(load_avg.one));
        reading.insert("load_5m".to_string(), json!(load_avg.five));
        reading.insert("load_15m".to_string(), json!(load_avg.fifteen));
        reading
    }
}

impl Default for SysinfoReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SensorReader for SysinfoReader {
    async fn read(&self, sensor: &str) -> Result<Reading, SensorError> {
        match sensor {
            "cpu" => Ok(self.read_cpu()),
            "memory" => Ok(self.read_memory()),
            "system" => Ok(self.read_system()),
            other => Err(SensorError::Driver(format!(
                "unknown builtin sensor '{}'",
                other
            ))),
        }
    }
}

/// Fixed-payload backend for demos and tests.
///
/// Returns the configured reading for known names and a driver fault for
/// everything else.
pub struct StaticReader {
    readings: HashMap<String, Reading>,
}

impl StaticReader {
    /// Create a reader with no readings defined.
    pub fn new() -> Self {
        Self {
            readings: HashMap::new(),
        }
    }

    /// Define the reading returned for a sensor name.
    pub fn with_reading(mut self, sensor: impl Into<String>, reading: Reading) -> Self {
        self.readings.insert(sensor.into(), reading);
        self
    }
}

impl Default for StaticReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SensorReader for StaticReader {
    async fn read(&self, sensor: &str) -> Result<Reading, SensorError> {
        self.readings.get(sensor).cloned().ok_or_else(|| {
            SensorError::Driver(format!("no reading defined for sensor '{}'", sensor))
        })
    }
}

fn detect_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_reader_returns_configured_reading() {
        let mut reading = Reading::new();
        reading.insert("temperature_c".to_string(), json!(20.0));

        let reader = StaticReader::new().with_reading("env", reading);

        let result = reader.read("env").await.unwrap();
        assert_eq!(result["temperature_c"], json!(20.0));
    }

    #[tokio::test]
    async fn test_static_reader_unknown_sensor_is_driver_fault() {
        let reader = StaticReader::new();

        let err = reader.read("nope").await.unwrap_err();
        assert!(matches!(err, SensorError::Driver(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[tokio::test]
    async fn test_sysinfo_reader_cpu() {
        let reader = SysinfoReader::new();

        let reading = reader.read("cpu").await.unwrap();
        assert!(reading["core_count"].as_u64().unwrap() >= 1);
        assert!(reading.contains_key("usage_percent"));
    }

    #[tokio::test]
    async fn test_sysinfo_reader_memory() {
        let reader = SysinfoReader::new();

        let reading = reader.read("memory").await.unwrap();
        let total = reading["total_bytes"].as_u64().unwrap();
        let used = reading["used_bytes"].as_u64().unwrap();
        assert!(total >= used);
    }

    #[tokio::test]
    async fn test_sysinfo_reader_system() {
        let reader = SysinfoReader::new();

        let reading = reader.read("system").await.unwrap();
        assert!(reading.contains_key("hostname"));
        assert!(reading.contains_key("uptime_secs"));
    }

    #[tokio::test]
    async fn test_sysinfo_reader_unknown_sensor() {
        let reader = SysinfoReader::new();

        assert!(reader.read("disk_temperature").await.is_err());
    }

    #[test]
    fn test_sensor_error_display() {
        assert_eq!(
            SensorError::Timeout(2.5).to_string(),
            "read timed out after 2.5s"
        );
        assert_eq!(
            SensorError::Driver("bus error".to_string()).to_string(),
            "driver fault: bus error"
        );
    }
}
