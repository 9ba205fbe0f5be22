//! Configuration for the sensor host daemon.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete host configuration.
///
/// `sensors` and `port` are required; everything else has a default.
/// The configuration is immutable for the lifetime of a running host;
/// changing it requires a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Names of the sensors to poll, in polling order.
    pub sensors: Vec<String>,

    /// TCP port for the HTTP artifact server. Wider than u16 so that
    /// out-of-range values fail validation instead of saturating during
    /// deserialization.
    pub port: u32,

    /// Refresh interval in seconds (default: 5.0). Measured from the
    /// start of one poll cycle to the start of the next.
    #[serde(default = "default_refresh")]
    pub refresh: f64,

    /// Per-sensor read timeout in seconds (default: 5.0).
    #[serde(default = "default_read_timeout")]
    pub read_timeout: f64,

    /// Directory under which the per-run artifact directory is created.
    /// Defaults to /dev/shm when present, otherwise the system temp dir.
    #[serde(default)]
    pub artifact_dir: Option<PathBuf>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_refresh() -> f64 {
    5.0
}

fn default_read_timeout() -> f64 {
    5.0
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl HostConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Sensor names double as URL path segments and artifact directory
    /// names, so they must be plain path-safe components.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensors.is_empty() {
            return Err(ConfigError::Validation(
                "at least one sensor must be configured".to_string(),
            ));
        }

        for name in &self.sensors {
            validate_sensor_name(name)?;
        }

        for (i, name) in self.sensors.iter().enumerate() {
            if self.sensors[..i].contains(name) {
                return Err(ConfigError::Validation(format!(
                    "duplicate sensor name '{}'",
                    name
                )));
            }
        }

        if self.port == 0 || self.port > u16::MAX as u32 {
            return Err(ConfigError::Validation(format!(
                "port must be in 1..=65535, got {}",
                self.port
            )));
        }

        validate_interval("refresh", self.refresh)?;
        validate_interval("read_timeout", self.read_timeout)?;

        Ok(())
    }

    /// Refresh interval as a `Duration`.
    ///
    /// Only meaningful on a validated configuration.
    pub fn refresh_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.refresh).unwrap_or(Duration::from_secs(5))
    }

    /// Per-sensor read timeout as a `Duration`.
    ///
    /// Only meaningful on a validated configuration.
    pub fn read_timeout_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.read_timeout).unwrap_or(Duration::from_secs(5))
    }
}

/// Intervals must convert to a non-zero `Duration`: sub-nanosecond values
/// round to zero and would stall the poll timer, and huge values are not
/// representable at all.
fn validate_interval(field: &str, seconds: f64) -> Result<(), ConfigError> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be > 0, got {}",
            field, seconds
        )));
    }

    match Duration::try_from_secs_f64(seconds) {
        Ok(d) if !d.is_zero() => Ok(()),
        _ => Err(ConfigError::Validation(format!(
            "{} of {} seconds is not a usable interval",
            field, seconds
        ))),
    }
}

fn validate_sensor_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "sensor name must not be empty".to_string(),
        ));
    }

    if name == "." || name == ".." || name.starts_with('.') {
        return Err(ConfigError::Validation(format!(
            "invalid sensor name '{}': must not start with '.'",
            name
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(ConfigError::Validation(format!(
            "invalid sensor name '{}': path separators are not allowed",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let json = r#"{
            sensors: ["cpu"],
            port: 8080
        }"#;

        let config: HostConfig = json5::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.sensors, vec!["cpu"]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.refresh, 5.0);
        assert_eq!(config.read_timeout, 5.0);
        assert!(config.artifact_dir.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            sensors: ["cpu", "memory", "system"],
            port: 9000,
            refresh: 2.5,
            read_timeout: 1.0,
            artifact_dir: "/tmp",
            logging: {
                level: "debug",
                format: "json",
            }
        }"#;

        let config: HostConfig = json5::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.sensors.len(), 3);
        assert_eq!(config.refresh, 2.5);
        assert_eq!(config.read_timeout, 1.0);
        assert_eq!(config.artifact_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validate_empty_sensors() {
        let json = r#"{ sensors: [], port: 8080 }"#;

        let config: HostConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_port() {
        let json = r#"{ sensors: ["cpu"], port: 0 }"#;

        let config: HostConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_port_out_of_range() {
        let json = r#"{ sensors: ["cpu"], port: 70000 }"#;

        // Parsing succeeds (the field is wider than u16), validation rejects.
        let config: HostConfig = json5::from_str(json).unwrap();
        assert_eq!(config.port, 70000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_nonpositive_refresh() {
        let json = r#"{ sensors: ["cpu"], port: 8080, refresh: 0 }"#;
        let config: HostConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());

        let json = r#"{ sensors: ["cpu"], port: 8080, refresh: -1.5 }"#;
        let config: HostConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_degenerate_intervals() {
        // Positive but rounds to a zero Duration.
        let json = r#"{ sensors: ["cpu"], port: 8080, refresh: 1e-10 }"#;
        let config: HostConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());

        // Not representable as a Duration at all.
        let json = r#"{ sensors: ["cpu"], port: 8080, read_timeout: 1.9e19 }"#;
        let config: HostConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_sensors() {
        let json = r#"{ sensors: ["cpu", "cpu"], port: 8080 }"#;

        let config: HostConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_sensor_name_path_safety() {
        for bad in ["", "..", "a/b", "a\\b", ".hidden"] {
            let config = HostConfig {
                sensors: vec![bad.to_string()],
                port: 8080,
                refresh: 5.0,
                read_timeout: 5.0,
                artifact_dir: None,
                logging: LoggingConfig::default(),
            };
            assert!(config.validate().is_err(), "expected rejection of {:?}", bad);
        }
    }

    #[test]
    fn test_duration_accessors() {
        let json = r#"{ sensors: ["cpu"], port: 8080, refresh: 0.25, read_timeout: 1.5 }"#;
        let config: HostConfig = json5::from_str(json).unwrap();

        assert_eq!(config.refresh_duration(), Duration::from_millis(250));
        assert_eq!(config.read_timeout_duration(), Duration::from_millis(1500));
    }
}
