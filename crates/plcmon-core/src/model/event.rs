// ── Backend notifications ──
//
// The event source delivers named notifications with a JSON payload.
// Decoding happens in the reconciler so that malformed payloads can be
// dropped without tearing down the subscription.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Event name for word-range pushes.
pub const MONITOR_EVENT: &str = "monitor";

/// Event name for backend service state changes.
pub const STATUS_EVENT: &str = "server-status";

/// A raw notification from the event source.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendEvent {
    pub name: String,
    pub payload: serde_json::Value,
}

impl BackendEvent {
    pub fn new(name: &str, payload: serde_json::Value) -> Self {
        Self {
            name: name.to_owned(),
            payload,
        }
    }

    /// Build a `monitor` notification.
    pub fn monitor(payload: &MonitorPayload) -> Self {
        Self::new(
            MONITOR_EVENT,
            serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        )
    }

    /// Build a `server-status` notification.
    pub fn status(message: &str) -> Self {
        Self::new(STATUS_EVENT, serde_json::Value::String(message.to_owned()))
    }
}

/// Payload of a `monitor` notification: consecutive words starting at
/// `key`/`addr`.
///
/// Values are carried wider than 16 bits on the wire and masked on
/// ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorPayload {
    pub key: String,
    pub addr: usize,
    #[serde(default)]
    pub vals: Vec<u32>,
}

/// Backend service state as reported by `server-status`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServerStatus {
    Running,
    #[default]
    Stopped,
    /// Any other human-readable state string.
    Other(String),
}

impl ServerStatus {
    /// Classify a status message.
    pub fn from_message(message: &str) -> Self {
        let trimmed = message.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "running" | "started" | "起動中" => Self::Running,
            "stopped" | "停止" | "停止中" => Self::Stopped,
            _ => Self::Other(trimmed.to_owned()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Stopped => f.write_str("stopped"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_messages() {
        assert_eq!(ServerStatus::from_message("running"), ServerStatus::Running);
        assert_eq!(ServerStatus::from_message(" Running "), ServerStatus::Running);
        assert_eq!(ServerStatus::from_message("起動中"), ServerStatus::Running);
        assert_eq!(ServerStatus::from_message("stopped"), ServerStatus::Stopped);
        assert_eq!(
            ServerStatus::from_message("binding 0.0.0.0:5000"),
            ServerStatus::Other("binding 0.0.0.0:5000".into())
        );
        assert!(!ServerStatus::from_message("not running").is_running());
    }

    #[test]
    fn monitor_payload_defaults_missing_vals() {
        let p: MonitorPayload =
            serde_json::from_value(serde_json::json!({"key": "D", "addr": 4})).unwrap();
        assert!(p.vals.is_empty());
    }

    #[test]
    fn monitor_event_round_trips_through_json() {
        let payload = MonitorPayload {
            key: "D".into(),
            addr: 0,
            vals: vec![1, 2],
        };
        let event = BackendEvent::monitor(&payload);
        assert_eq!(event.name, MONITOR_EVENT);
        let back: MonitorPayload = serde_json::from_value(event.payload).unwrap();
        assert_eq!(back, payload);
    }
}
