//! Control command envelope for the host.
//!
//! Commands arrive as JSON objects keyed by field presence, e.g.
//! `{"status": true}`; the value is ignored. Responses are plain JSON
//! objects with a fixed shape per command.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Acknowledgement text returned by a force refresh.
pub const REFRESH_ACK: &str = "Sensor readings refreshed";

/// Commands accepted over the host's command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Report runtime status.
    Status,
    /// Trigger an immediate out-of-band refresh.
    RefreshNow,
}

impl HostCommand {
    /// Parse a command envelope. Returns `None` when no known command key
    /// is present. `status` takes precedence when both keys appear.
    pub fn parse(request: &Value) -> Option<Self> {
        let obj = request.as_object()?;
        if obj.contains_key("status") {
            Some(Self::Status)
        } else if obj.contains_key("refresh_now") {
            Some(Self::RefreshNow)
        } else {
            None
        }
    }
}

/// Response to a status command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Whether the host is currently in the Running state.
    pub running: bool,
    /// Configured HTTP port.
    pub port: u16,
    /// Configured sensor names, in polling order.
    pub sensors: Vec<String>,
    /// Refresh interval in seconds.
    pub refresh_interval: f64,
    /// Artifact directory for this run.
    pub temp_dir: String,
}

/// Response to a refresh command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub message: String,
}

impl Default for RefreshResponse {
    fn default() -> Self {
        Self {
            message: REFRESH_ACK.to_string(),
        }
    }
}

/// Error envelope for rejected commands.
pub fn error_response(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

/// Error envelope for an unrecognized command.
pub fn unknown_command_response(request: &Value) -> Value {
    let keys: Vec<&str> = request
        .as_object()
        .map(|obj| obj.keys().map(|k| k.as_str()).collect())
        .unwrap_or_default();
    error_response(format!("unknown command: {:?}", keys))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(
            HostCommand::parse(&json!({"status": true})),
            Some(HostCommand::Status)
        );
        // Value is ignored; presence is what matters.
        assert_eq!(
            HostCommand::parse(&json!({"status": null})),
            Some(HostCommand::Status)
        );
    }

    #[test]
    fn test_parse_refresh_now() {
        assert_eq!(
            HostCommand::parse(&json!({"refresh_now": true})),
            Some(HostCommand::RefreshNow)
        );
    }

    #[test]
    fn test_parse_status_takes_precedence() {
        assert_eq!(
            HostCommand::parse(&json!({"refresh_now": true, "status": true})),
            Some(HostCommand::Status)
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(HostCommand::parse(&json!({"restart": true})), None);
        assert_eq!(HostCommand::parse(&json!({})), None);
        assert_eq!(HostCommand::parse(&json!("status")), None);
    }

    #[test]
    fn test_status_response_field_names() {
        let response = StatusResponse {
            running: true,
            port: 8080,
            sensors: vec!["s1".to_string(), "s2".to_string()],
            refresh_interval: 2.0,
            temp_dir: "/dev/shm/sensorhost-abc".to_string(),
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["running"], json!(true));
        assert_eq!(value["port"], json!(8080));
        assert_eq!(value["sensors"], json!(["s1", "s2"]));
        assert_eq!(value["refresh_interval"], json!(2.0));
        assert_eq!(value["temp_dir"], json!("/dev/shm/sensorhost-abc"));
    }

    #[test]
    fn test_refresh_ack_text() {
        let value = serde_json::to_value(RefreshResponse::default()).unwrap();
        assert_eq!(value, json!({"message": "Sensor readings refreshed"}));
    }

    #[test]
    fn test_unknown_command_response_lists_keys() {
        let response = unknown_command_response(&json!({"restart": true}));
        let message = response["error"].as_str().unwrap();
        assert!(message.starts_with("unknown command:"));
        assert!(message.contains("restart"));
    }
}
