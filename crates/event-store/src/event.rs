use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an event stream (one stream per aggregate instance).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Position of a stream, used for optimistic concurrency control.
///
/// A stream with no events is at version 0; the first event is version 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version of a stream that has no events yet.
    pub fn initial() -> Self {
        Self(0)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recorded event together with its stream position and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,

    /// Event type name, e.g. `OrderPlaced`.
    pub event_type: String,

    pub stream_id: StreamId,

    /// Kind of aggregate the stream belongs to, e.g. `Order`.
    pub stream_type: String,

    /// Stream version after this event.
    pub version: Version,

    pub recorded_at: DateTime<Utc>,

    pub payload: serde_json::Value,

    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Serializes `event` into a new envelope positioned at `version`.
    pub fn new<T: Serialize>(
        stream_id: StreamId,
        stream_type: impl Into<String>,
        event_type: impl Into<String>,
        version: Version,
        event: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_id: EventId::new(),
            event_type: event_type.into(),
            stream_id,
            stream_type: stream_type.into(),
            version,
            recorded_at: Utc::now(),
            payload: serde_json::to_value(event)?,
            metadata: HashMap::new(),
        })
    }

    /// Adds a metadata entry, e.g. a correlation id.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Deserializes the payload into a concrete event type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Noted {
        note: String,
    }

    #[test]
    fn version_sequence() {
        assert_eq!(Version::initial().as_i64(), 0);
        assert_eq!(Version::initial().next(), Version::new(1));
        assert!(Version::new(1) < Version::new(2));
    }

    #[test]
    fn envelope_payload_roundtrip() {
        let event = Noted {
            note: "Order created".into(),
        };
        let envelope = EventEnvelope::new(
            StreamId::new("ORD-1"),
            "Order",
            "Noted",
            Version::new(1),
            &event,
        )
        .unwrap()
        .with_metadata("source", serde_json::json!("test"));

        assert_eq!(envelope.stream_id.as_str(), "ORD-1");
        assert_eq!(envelope.metadata["source"], serde_json::json!("test"));
        assert_eq!(envelope.decode::<Noted>().unwrap(), event);
    }
}
