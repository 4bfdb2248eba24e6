//! Prompt Normalizer
//!
//! Turns the keyword arguments of an outbound call into canonical input
//! messages. Every message gets `externalId = "input_{index}"`, a
//! title-cased role, and one shared metadata map: `type = input_message`,
//! then the non-message prompt attributes (tools, instructions, ...), then
//! the generation parameters with defaults filled in.

mod chat;
mod generation;
mod responses;

pub use generation::{
    DefaultValue, GENERATION_PARAMETERS, ParameterTable, RESPONSES_PARAMETERS,
    generation_metadata,
};

use serde_json::Value;

use crate::sanitize::{field, is_truthy, metadata_value, title_case};
use crate::types::{Message, Metadata, ProtocolFamily};

/// Payload of one prompt message before it becomes a [`Message`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PromptContent {
    Text(Option<String>),
    Structured(Value),
}

/// A prompt message with its role still in source casing
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PromptMessage {
    pub role: String,
    pub content: PromptContent,
}

const CHAT_TABLES: &[ParameterTable] = &[GENERATION_PARAMETERS];
const RESPONSE_TABLES: &[ParameterTable] = &[RESPONSES_PARAMETERS, GENERATION_PARAMETERS];

/// Normalize the outbound call's parameters into input messages.
///
/// Returns an empty sequence when the call carries no messages, or when the
/// family is not one this crate understands.
pub fn normalize_prompt(family: ProtocolFamily, params: &Value) -> Vec<Message> {
    let ((messages, extras), tables) = match family {
        ProtocolFamily::Completion => (chat::completion_prompt(params), CHAT_TABLES),
        ProtocolFamily::Chat => (chat::chat_prompt(params), CHAT_TABLES),
        ProtocolFamily::Response => (responses::responses_prompt(params), RESPONSE_TABLES),
        ProtocolFamily::Other => return Vec::new(),
    };

    if messages.is_empty() {
        return Vec::new();
    }

    let mut metadata = Metadata::new();
    metadata.insert("type".into(), "input_message".into());
    metadata.extend(extras);
    metadata.extend(generation_metadata(params, tables));

    messages
        .into_iter()
        .enumerate()
        .map(|(index, message)| {
            let role = title_case(&message.role);
            let built = match message.content {
                PromptContent::Text(text) => Message::new(role, text),
                PromptContent::Structured(value) => Message::json(role, value),
            };
            built
                .with_external_id(format!("input_{index}"))
                .with_metadata(metadata.clone())
        })
        .collect()
}

/// Copy the truthy prompt attributes named in `keys` into a metadata map.
pub(crate) fn prompt_extras(params: &Value, keys: &[&str]) -> Metadata {
    let mut extras = Metadata::new();
    for key in keys {
        if let Some(value) = field(params, key).filter(|v| is_truthy(v))
            && let Some(value) = metadata_value(value)
        {
            extras.insert((*key).to_string(), value);
        }
    }
    extras
}
