//! Push-channel vocabulary: event names, decoded events, connection status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name on the signal channel that asks for an immediate refetch.
pub const RELOAD_EVENT: &str = "reload";

/// Named event types demultiplexed from a typed event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "workspace:update")]
    WorkspaceUpdate,
    #[serde(rename = "session:update")]
    SessionUpdate,
    #[serde(rename = "messages:new")]
    MessagesNew,
    #[serde(rename = "todos:update")]
    TodosUpdate,
    #[serde(rename = "log:append")]
    LogAppend,
    #[serde(rename = "changes:update")]
    ChangesUpdate,
    #[serde(rename = "events:new")]
    EventsNew,
    #[serde(rename = "compose:update")]
    ComposeUpdate,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::WorkspaceUpdate,
        EventType::SessionUpdate,
        EventType::MessagesNew,
        EventType::TodosUpdate,
        EventType::LogAppend,
        EventType::ChangesUpdate,
        EventType::EventsNew,
        EventType::ComposeUpdate,
    ];

    /// Wire name as sent in the `event:` field.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::WorkspaceUpdate => "workspace:update",
            EventType::SessionUpdate => "session:update",
            EventType::MessagesNew => "messages:new",
            EventType::TodosUpdate => "todos:update",
            EventType::LogAppend => "log:append",
            EventType::ChangesUpdate => "changes:update",
            EventType::EventsNew => "events:new",
            EventType::ComposeUpdate => "compose:update",
        }
    }

    /// Recognise a wire name. Unknown names yield `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.as_str() == name)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a store's push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    #[default]
    Disconnected,
    Reconnecting,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// One inbound push message after decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    /// Build an event from a raw text payload, stamped with the current time.
    pub fn from_raw(event_type: EventType, raw: &str) -> Self {
        Self {
            event_type,
            data: decode_payload(raw),
            timestamp: Utc::now(),
        }
    }
}

/// Best-effort JSON decode. Anything that is not valid JSON (log lines,
/// plain text) is kept verbatim as a JSON string.
pub fn decode_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_names_match_serde_names() {
        for ty in EventType::ALL {
            let encoded = serde_json::to_value(ty).unwrap();
            assert_eq!(encoded, json!(ty.as_str()));
            assert_eq!(EventType::from_wire(ty.as_str()), Some(ty));
        }
        assert_eq!(EventType::from_wire("reload"), None);
        assert_eq!(EventType::from_wire("message"), None);
    }

    #[test]
    fn payload_falls_back_to_raw_text() {
        assert_eq!(decode_payload(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(decode_payload("plain text"), json!("plain text"));
        assert_eq!(decode_payload("42"), json!(42));
        assert_eq!(decode_payload(""), json!(""));
    }

    #[test]
    fn stream_event_serializes_type_and_iso_timestamp() {
        let event = StreamEvent::from_raw(EventType::LogAppend, "building...");
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["type"], json!("log:append"));
        assert_eq!(encoded["data"], json!("building..."));
        let ts = encoded["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn connection_status_defaults_to_disconnected() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
        assert_eq!(
            serde_json::to_value(ConnectionStatus::Reconnecting).unwrap(),
            json!("reconnecting")
        );
    }
}
