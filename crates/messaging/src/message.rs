use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::Result;

/// A message travelling through the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: Uuid,
    pub routing_key: String,
    pub published_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl Message {
    /// Serializes `payload` into a new message for `routing_key`.
    pub fn new<T: Serialize>(routing_key: impl Into<String>, payload: &T) -> Result<Self> {
        Ok(Self {
            message_id: Uuid::new_v4(),
            routing_key: routing_key.into(),
            published_at: Utc::now(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Deserializes the payload into a contract type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}
