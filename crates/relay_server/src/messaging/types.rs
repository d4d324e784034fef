//! Message type definitions for client-server communication.
//!
//! Two kinds of frames travel over a connection:
//!
//! * Lifecycle messages generated by the server, tagged with a `type` field
//! * Application payloads sent by clients, which are open JSON objects and
//!   only ever gain a `playerId` field on their way through the relay
//!
//! # Example
//!
//! ```json
//! { "type": "init", "playerId": 1 }
//! { "x": 5, "playerId": 1 }
//! { "type": "playerDisconnect", "playerId": 1 }
//! ```

use crate::connection::PlayerId;
use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the field carrying the sender identity.
pub const PLAYER_ID_FIELD: &str = "playerId";

/// A message generated by the server itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LifecycleMessage {
    /// Sent once to a newly accepted connection.
    Init {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    /// Sent to every remaining connection when a peer leaves.
    PlayerDisconnect {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
}

impl LifecycleMessage {
    pub fn to_json(&self) -> String {
        // Only a string tag and an integer; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// An application payload forwarded between clients.
///
/// No schema is enforced beyond "is a JSON object".
#[derive(Debug, Clone, PartialEq)]
pub struct RelayPayload(Map<String, Value>);

impl RelayPayload {
    /// Decodes a raw frame.
    ///
    /// Invalid UTF-8, invalid JSON and JSON that is not an object are all
    /// reported as [`RelayError::MalformedMessage`].
    pub fn decode(raw: &[u8]) -> Result<Self, RelayError> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| RelayError::MalformedMessage(format!("Invalid JSON: {e}")))?;

        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(RelayError::MalformedMessage(format!(
                "Expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Attaches the sender identity, replacing any `playerId` the sender put
    /// there itself.
    pub fn stamp(mut self, player_id: PlayerId) -> Self {
        self.0
            .insert(PLAYER_ID_FIELD.to_string(), Value::from(player_id));
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn encode(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
