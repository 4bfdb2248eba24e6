//! Chat and legacy completion prompts

use serde_json::Value;

use super::{PromptContent, PromptMessage, prompt_extras};
use crate::sanitize::{metadata_value, str_field};
use crate::types::Metadata;

/// Non-message chat attributes recorded with every input message
const CHAT_PROMPT_KEYS: &[&str] = &["function_call", "functions", "tools"];

pub(super) fn chat_prompt(params: &Value) -> (Vec<PromptMessage>, Metadata) {
    let extras = prompt_extras(params, CHAT_PROMPT_KEYS);
    let messages = params
        .get("messages")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(prompt_message).collect())
        .unwrap_or_default();
    (messages, extras)
}

/// Completion calls only carry messages when `prompt` is an object with a
/// `messages` list; its other members are recorded as prompt attributes.
pub(super) fn completion_prompt(params: &Value) -> (Vec<PromptMessage>, Metadata) {
    let Some(prompt) = params.get("prompt").and_then(Value::as_object) else {
        return (Vec::new(), Metadata::new());
    };

    let messages = prompt
        .get("messages")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(prompt_message).collect())
        .unwrap_or_default();

    let extras = prompt
        .iter()
        .filter(|(key, _)| key.as_str() != "messages")
        .filter_map(|(key, value)| metadata_value(value).map(|v| (key.clone(), v)))
        .collect();

    (messages, extras)
}

fn prompt_message(message: &Value) -> Option<PromptMessage> {
    match message {
        Value::String(text) => Some(PromptMessage {
            role: "user".into(),
            content: PromptContent::Text(Some(text.clone())),
        }),
        Value::Object(_) => Some(PromptMessage {
            role: str_field(message, "role").unwrap_or("user").to_string(),
            content: message_content(message.get("content")),
        }),
        _ => None,
    }
}

fn message_content(content: Option<&Value>) -> PromptContent {
    match content {
        None | Some(Value::Null) => PromptContent::Text(None),
        Some(Value::String(text)) => PromptContent::Text(Some(text.clone())),
        // audio parts are not recorded
        Some(Value::Array(parts)) => PromptContent::Structured(Value::Array(
            parts
                .iter()
                .filter(|part| str_field(part, "type") != Some("input_audio"))
                .cloned()
                .collect(),
        )),
        Some(other) => PromptContent::Text(Some(other.to_string())),
    }
}
