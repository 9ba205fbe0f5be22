//! Sensorhost Common Library
//!
//! This crate provides the shared types for the sensorhost daemon:
//!
//! - [`config`] - Host configuration loading (JSON5 format) and validation
//! - [`reading`] - Snapshot data model (`Snapshot`, `Reading`, `ErrorInfo`)
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod reading;

// Re-export commonly used types at the crate root
pub use config::{ConfigError, HostConfig, LogFormat, LoggingConfig};
pub use error::{Error, Result};
pub use reading::{
    ErrorInfo, Reading, Snapshot, current_timestamp_millis, format_timestamp_rfc3339,
};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level when set.
///
/// # Example
///
/// ```ignore
/// use sensorhost_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
