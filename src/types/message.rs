//! Canonical message types
//!
//! Every recorded prompt message and every extracted or reconstructed output
//! message ends up as a [`Message`]. The serialized form is the wire shape
//! sinks store: `{ externalId, type, role, content, jsonContent, metadata }`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How a message's payload should be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text / markdown in `content`
    #[default]
    Markdown,
    /// Structured payload in `json_content`
    Json,
}

/// A metadata value. Sinks only accept integers and strings, so everything
/// else is folded into one of the two (see [`crate::sanitize::metadata_value`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Integer(i64),
    Text(String),
}

impl MetadataValue {
    /// Borrow the text payload, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Integer(_) => None,
        }
    }

    /// Integer payload, if this is an integer value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// `0` and `""` are falsy
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Integer(n) => *n == 0,
            Self::Text(s) => s.is_empty(),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Insertion-ordered metadata map
pub type Metadata = IndexMap<String, MetadataValue>;

/// Canonical message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub external_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    pub role: String,
    pub content: Option<String>,
    pub json_content: Option<Value>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Message {
    /// Create a markdown message
    pub fn new(role: impl Into<String>, content: Option<String>) -> Self {
        Self {
            external_id: None,
            kind: MessageKind::Markdown,
            role: role.into(),
            content,
            json_content: None,
            metadata: Metadata::new(),
        }
    }

    /// Create a message carrying structured content
    pub fn json(role: impl Into<String>, json_content: Value) -> Self {
        Self {
            external_id: None,
            kind: MessageKind::Json,
            role: role.into(),
            content: None,
            json_content: Some(json_content),
            metadata: Metadata::new(),
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_to_wire_shape() {
        let mut metadata = Metadata::new();
        metadata.insert("index".into(), MetadataValue::Integer(0));
        metadata.insert("model".into(), "o4-mini".into());
        let msg = Message::new("Assistant", Some("hi".into()))
            .with_external_id("chatcmpl-1")
            .with_metadata(metadata);

        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "externalId": "chatcmpl-1",
                "type": "markdown",
                "role": "Assistant",
                "content": "hi",
                "jsonContent": null,
                "metadata": {"index": 0, "model": "o4-mini"}
            })
        );
    }

    #[test]
    fn booleans_become_integers() {
        assert_eq!(MetadataValue::from(true), MetadataValue::Integer(1));
        assert_eq!(MetadataValue::from(false), MetadataValue::Integer(0));
        assert!(MetadataValue::from(false).is_falsy());
        assert!(!MetadataValue::from("x").is_falsy());
    }
}
