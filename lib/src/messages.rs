use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::schema::SchemaError;

/// 2000-01-01T00:00:00Z in nanoseconds since the epoch.
pub const MIN_TIMESTAMP_NANOS: i64 = 946_684_800 * 1_000_000_000;
/// 2030-01-01T00:00:00Z in nanoseconds since the epoch.
pub const MAX_TIMESTAMP_NANOS: i64 = 1_893_456_000 * 1_000_000_000;

/// Encodes UTF-8 text the way the relay API expects payloads.
pub fn encode_payload(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// A message record as buffered by a node, before validation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl RawMessage {
    pub fn has_payload(&self, encoded: &str) -> bool {
        self.payload.as_deref() == Some(encoded)
    }
}

/// A relay message that passed validation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "RawMessage", rename_all = "camelCase")]
pub struct Message {
    pub payload: String,
    pub content_topic: String,
    pub version: u32,
    #[serde(rename = "timestamp")]
    pub timestamp_nanos: i64,
}

impl Message {
    /// Base64-decodes the payload into UTF-8 text.
    pub fn decoded_payload(&self) -> Result<String, SchemaError> {
        let bytes = STANDARD
            .decode(&self.payload)
            .map_err(|e| SchemaError::InvalidPayload(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| SchemaError::InvalidPayload(e.to_string()))
    }

    /// True when the message was published on `topic` and decodes to `text`.
    pub fn matches_content(&self, topic: &str, text: &str) -> bool {
        self.content_topic == topic
            && self
                .decoded_payload()
                .map(|decoded| decoded == text)
                .unwrap_or(false)
    }
}

impl TryFrom<RawMessage> for Message {
    type Error = SchemaError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        let payload = raw.payload.ok_or(SchemaError::MissingField("payload"))?;
        let content_topic = raw
            .content_topic
            .ok_or(SchemaError::MissingField("contentTopic"))?;
        let version = raw.version.ok_or(SchemaError::MissingField("version"))?;
        let timestamp_nanos = raw.timestamp.ok_or(SchemaError::MissingField("timestamp"))?;

        if !(MIN_TIMESTAMP_NANOS..=MAX_TIMESTAMP_NANOS).contains(&timestamp_nanos) {
            return Err(SchemaError::TimestampOutOfRange(timestamp_nanos));
        }

        Ok(Self {
            payload,
            content_topic,
            version,
            timestamp_nanos,
        })
    }
}
