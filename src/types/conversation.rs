//! Conversation records handed to sinks

use serde::Serialize;

use super::{Message, Metadata, MetadataValue};

/// Metadata key holding the time the record was built
pub const CREATED_KEY: &str = "created";
/// Metadata key holding the upstream response id
pub const RESPONSE_ID_KEY: &str = "response_id";
/// Metadata key holding the upstream failure description
pub const UPSTREAM_ERROR_KEY: &str = "upstream_error";

/// One recorded interaction: the prompt, what came back, and how to find it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub input_messages: Vec<Message>,
    pub output_messages: Vec<Message>,
    pub correlation_id: Option<String>,
    pub metadata: Metadata,
}

impl Conversation {
    /// Record of a call that produced output
    pub fn completed(
        input_messages: Vec<Message>,
        output_messages: Vec<Message>,
        correlation_id: Option<String>,
    ) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(CREATED_KEY.into(), now().into());
        if let Some(id) = &correlation_id {
            metadata.insert(RESPONSE_ID_KEY.into(), id.clone().into());
        }
        Self {
            input_messages,
            output_messages,
            correlation_id,
            metadata,
        }
    }

    /// Error thread: the prompt plus a description of why the call failed
    pub fn failed(input_messages: Vec<Message>, model: Option<&str>, error: &str) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("completion_tokens".into(), MetadataValue::Integer(0));
        metadata.insert("prompt_tokens".into(), MetadataValue::Integer(0));
        metadata.insert("total_tokens".into(), MetadataValue::Integer(0));
        metadata.insert(UPSTREAM_ERROR_KEY.into(), error.into());
        metadata.insert(CREATED_KEY.into(), now().into());
        if let Some(model) = model {
            metadata.insert("model".into(), model.into());
        }
        Self {
            input_messages,
            output_messages: Vec::new(),
            correlation_id: None,
            metadata,
        }
    }

    /// Prompt messages followed by output messages
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.input_messages.iter().chain(self.output_messages.iter())
    }

    pub fn is_error(&self) -> bool {
        self.metadata.contains_key(UPSTREAM_ERROR_KEY)
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
