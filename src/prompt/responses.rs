//! Responses API prompts
//!
//! `input` is either a plain string (one user message) or a list of
//! messages whose multi-part content is flattened into a single string.

use serde_json::Value;

use super::{PromptContent, PromptMessage, prompt_extras};
use crate::sanitize::str_field;
use crate::types::Metadata;

const RESPONSES_PROMPT_KEYS: &[&str] = &["tools", "instructions", "reasoning", "metadata"];

pub(super) fn responses_prompt(params: &Value) -> (Vec<PromptMessage>, Metadata) {
    let extras = prompt_extras(params, RESPONSES_PROMPT_KEYS);
    let messages = match params.get("input") {
        Some(Value::String(text)) => vec![PromptMessage {
            role: "user".into(),
            content: PromptContent::Text(Some(text.clone())),
        }],
        Some(Value::Array(items)) => items.iter().map(input_message).collect(),
        _ => Vec::new(),
    };
    (messages, extras)
}

fn input_message(item: &Value) -> PromptMessage {
    let role = str_field(item, "role").unwrap_or("user").to_string();
    let content = match item {
        Value::Object(_) => flatten_content(item.get("content")),
        other => plain_text(other),
    };
    PromptMessage {
        role,
        content: PromptContent::Text(Some(content)),
    }
}

fn flatten_content(content: Option<&Value>) -> String {
    match content {
        Some(Value::Array(parts)) => parts
            .iter()
            .map(content_part)
            .collect::<Vec<_>>()
            .join(" "),
        Some(Value::Null) | None => String::new(),
        Some(other) => plain_text(other),
    }
}

fn content_part(part: &Value) -> String {
    if !part.is_object() {
        return plain_text(part);
    }
    match str_field(part, "type").unwrap_or_default() {
        "input_text" | "text" => str_field(part, "text").unwrap_or_default().to_string(),
        "input_image" | "image_url" => format!("[Image: {}]", image_reference(part)),
        "input_audio" | "audio" => "[Audio content]".to_string(),
        _ => plain_text(part),
    }
}

fn image_reference(part: &Value) -> &str {
    match part.get("image_url") {
        Some(Value::String(url)) => url.as_str(),
        Some(obj @ Value::Object(_)) => str_field(obj, "url").unwrap_or("unknown"),
        _ => "unknown",
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
