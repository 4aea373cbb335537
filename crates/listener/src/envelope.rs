//! Message shapes at the agent's network boundary.
//!
//! Inbound messages arrive as `{"remote_addr": ..., "content": ...}`; only the
//! content is buffered. Outbound messages are normalised to JSON objects and
//! stamped with the agent's sender id.

use serde_json::{Map, Value};

use pipeline::AgentId;

/// A validated inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEnvelope {
    pub remote_addr: String,
    pub content: Value,
}

impl InboundEnvelope {
    /// Accepts objects carrying both `remote_addr` and `content`; rejects
    /// everything else.
    pub fn from_message(message: Value) -> Option<Self> {
        let Value::Object(mut fields) = message else {
            return None;
        };
        if !fields.contains_key("remote_addr") {
            return None;
        }
        let content = fields.remove("content")?;
        let remote_addr = match fields.remove("remote_addr") {
            Some(Value::String(addr)) => addr,
            Some(other) => other.to_string(),
            None => return None,
        };
        Some(Self {
            remote_addr,
            content,
        })
    }
}

/// Prepares an outbound payload for transmission.
///
/// Strings are wrapped as `{"message": ...}`; other non-object values are
/// dropped. The sender id is written to `from`, replacing any existing value.
pub fn finalize_outbound(payload: Value, agent_id: &AgentId) -> Option<Value> {
    let mut fields = match payload {
        Value::Object(fields) => fields,
        Value::String(text) => {
            let mut fields = Map::new();
            fields.insert("message".to_owned(), Value::String(text));
            fields
        }
        _ => return None,
    };
    fields.insert("from".to_owned(), Value::String(agent_id.as_str().to_owned()));
    Some(Value::Object(fields))
}
