use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A single sensor reading: an opaque JSON object mapping field names to
/// values. No schema is imposed beyond "serializable as a JSON object".
pub type Reading = serde_json::Map<String, Value>;

/// Failure details recorded when a poll did not produce a reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Human-readable description of the failure.
    pub message: String,
}

/// The latest state held for one sensor.
///
/// A snapshot is either a successful reading (`error` absent) or a failure
/// record (`error` present, `reading` absent). It is replaced wholesale on
/// every poll; a failure drops the previous reading rather than carrying
/// it forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Sensor this snapshot belongs to.
    pub sensor: String,

    /// Unix epoch milliseconds when the poll completed.
    pub timestamp: i64,

    /// The reading, when the poll succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<Reading>,

    /// The failure, when the poll did not succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl Snapshot {
    /// Create a successful snapshot with the current timestamp.
    pub fn ok(sensor: impl Into<String>, reading: Reading) -> Self {
        Self {
            sensor: sensor.into(),
            timestamp: current_timestamp_millis(),
            reading: Some(reading),
            error: None,
        }
    }

    /// Create a failure snapshot with the current timestamp.
    pub fn failed(sensor: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sensor: sensor.into(),
            timestamp: current_timestamp_millis(),
            reading: None,
            error: Some(ErrorInfo {
                message: message.into(),
            }),
        }
    }

    /// Whether this snapshot carries a reading rather than a failure.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Build the JSON document served for this snapshot.
    ///
    /// Success: the reading object itself. Failure:
    /// `{"error": "<message>", "timestamp": "<ISO 8601>"}`.
    pub fn artifact_payload(&self) -> Value {
        match &self.error {
            None => Value::Object(self.reading.clone().unwrap_or_default()),
            Some(err) => json!({
                "error": err.message,
                "timestamp": format_timestamp_rfc3339(self.timestamp),
            }),
        }
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
pub fn current_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render an epoch-milliseconds timestamp as an ISO 8601 / RFC 3339 string.
pub fn format_timestamp_rfc3339(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| millis.to_string())
}
