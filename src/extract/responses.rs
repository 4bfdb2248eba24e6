//! Responses API output
//!
//! Each entry of `output[]` becomes one message, dispatched on its `type`:
//! messages keep their text, tool calls and reasoning items get a short
//! synthetic description. When there is more than one message their
//! external ids are suffixed with `-output-{n}`.

use serde_json::Value;

use super::{Extraction, OutputDraft, correlation_id, finish_message};
use crate::sanitize::{copy_fields, field, metadata_value, str_field, truncate_chars};
use crate::types::Metadata;

/// Response-level fields
const RESPONSE_KEYS: &[&str] = &[
    "id",
    "object",
    "created_at",
    "model",
    "status",
    "service_tier",
];

const USAGE_KEYS: &[&str] = &["input_tokens", "output_tokens", "total_tokens"];

/// Longest reasoning excerpt kept in a preview
const REASONING_PREVIEW_CHARS: usize = 100;

pub(super) fn extract_responses(response: &Value) -> Extraction {
    let mut drafts: Vec<OutputDraft> = response
        .get("output")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(output_item).collect())
        .unwrap_or_default();

    if drafts.is_empty()
        && let Some(text) = str_field(response, "output_text").filter(|t| !t.is_empty())
    {
        let mut fields = Metadata::new();
        fields.insert("role".into(), "assistant".into());
        drafts.push(OutputDraft {
            content: Some(text.to_string()),
            fields,
        });
    }

    let metadata = responses_metadata(response);
    let base_id = metadata
        .get("id")
        .map(|v| v.to_string())
        .unwrap_or_else(|| "response".to_string());
    let several = drafts.len() > 1;

    let messages = drafts
        .into_iter()
        .enumerate()
        .map(|(n, draft)| {
            let external_id = if several {
                format!("{base_id}-output-{n}")
            } else {
                base_id.clone()
            };
            finish_message(draft, &metadata, Some(external_id))
        })
        .collect();

    Extraction {
        messages,
        correlation_id: correlation_id(response),
    }
}

/// Draft for one `output[]` item, or `None` for item types that are not
/// recorded.
pub(crate) fn output_item(item: &Value) -> Option<OutputDraft> {
    let kind = str_field(item, "type").unwrap_or_default();
    match kind {
        "message" => Some(message_item(item)),
        "reasoning_item" | "reasoning" => Some(reasoning_item(item, kind)),
        _ if kind.ends_with("_call") => Some(tool_call_item(item, kind)),
        _ => None,
    }
}

fn message_item(item: &Value) -> OutputDraft {
    let mut fields = Metadata::new();
    copy_fields(&mut fields, item, &["role", "status"]);
    if let Some(id) = field(item, "id").and_then(metadata_value) {
        fields.insert("item_id".into(), id);
    }

    let parts: Vec<String> = item
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| parts.iter().filter_map(content_part).collect())
        .unwrap_or_default();

    OutputDraft {
        content: Some(parts.join(" ")),
        fields,
    }
}

fn content_part(part: &Value) -> Option<String> {
    match str_field(part, "type")? {
        "output_text" => str_field(part, "text")
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        "output_audio" => Some("[Audio response]".to_string()),
        "output_image" => Some("[Image response]".to_string()),
        _ => None,
    }
}

fn tool_call_item(item: &Value, kind: &str) -> OutputDraft {
    let mut fields = Metadata::new();
    fields.insert("role".into(), "assistant".into());
    fields.insert("tool_type".into(), kind.into());
    if let Some(status) = field(item, "status").and_then(metadata_value) {
        fields.insert("tool_status".into(), status);
    }

    let content = match kind {
        "web_search_call" => "[Web search performed]".to_string(),
        "file_search_call" => "[File search performed]".to_string(),
        "function_call" => {
            let name = str_field(item, "name").unwrap_or("unknown");
            fields.insert("function_name".into(), name.into());
            if let Some(call_id) = field(item, "call_id").and_then(metadata_value) {
                fields.insert("call_id".into(), call_id);
            }
            // streamed items open with empty arguments
            if let Some(arguments) = field(item, "arguments")
                .filter(|a| a.as_str() != Some(""))
                .and_then(metadata_value)
            {
                fields.insert("arguments".into(), arguments);
            }
            format!("[Function call: {name}]")
        }
        other => format!("[Tool call: {other}]"),
    };

    OutputDraft {
        content: Some(content),
        fields,
    }
}

fn reasoning_item(item: &Value, kind: &str) -> OutputDraft {
    let mut fields = Metadata::new();
    fields.insert("role".into(), "assistant".into());
    fields.insert("reasoning_type".into(), kind.into());

    let content = match reasoning_text(item) {
        Some(text) => format!(
            "[Reasoning: {}...]",
            truncate_chars(&text, REASONING_PREVIEW_CHARS)
        ),
        None => "[Reasoning trace]".to_string(),
    };

    OutputDraft {
        content: Some(content),
        fields,
    }
}

/// Reasoning text from `content` (a string or a list of text parts), else
/// from the `summary` parts.
fn reasoning_text(item: &Value) -> Option<String> {
    let joined = |parts: &Vec<Value>| {
        let texts: Vec<&str> = parts.iter().filter_map(|p| str_field(p, "text")).collect();
        texts.join(" ")
    };
    let text = match item.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => joined(parts),
        _ => match item.get("summary") {
            Some(Value::Array(parts)) => joined(parts),
            _ => String::new(),
        },
    };
    (!text.is_empty()).then_some(text)
}

/// Response-level metadata of a Responses API response. Token-detail
/// breakdowns are flattened as `input_tokens_{key}` / `output_tokens_{key}`.
pub fn responses_metadata(response: &Value) -> Metadata {
    let mut metadata = Metadata::new();
    copy_fields(&mut metadata, response, RESPONSE_KEYS);

    let Some(usage) = field(response, "usage") else {
        return metadata;
    };
    copy_fields(&mut metadata, usage, USAGE_KEYS);
    for prefix in ["input_tokens", "output_tokens"] {
        let details = field(usage, &format!("{prefix}_details")).and_then(Value::as_object);
        for (key, value) in details.into_iter().flatten() {
            if let Some(value) = metadata_value(value) {
                metadata.insert(format!("{prefix}_{key}"), value);
            }
        }
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetadataValue;
    use serde_json::json;

    fn response() -> Value {
        json!({
            "id": "resp_123",
            "object": "response",
            "created_at": 1741476542,
            "model": "gpt-4.1-2025-04-14",
            "status": "completed",
            "output": [
                {
                    "type": "web_search_call",
                    "id": "ws_1",
                    "status": "completed"
                },
                {
                    "type": "message",
                    "id": "msg_1",
                    "status": "completed",
                    "role": "assistant",
                    "content": [
                        {"type": "output_text", "text": "Here is the news.", "annotations": []},
                        {"type": "output_image"}
                    ]
                }
            ],
            "usage": {
                "input_tokens": 36,
                "input_tokens_details": {"cached_tokens": 0},
                "output_tokens": 87,
                "output_tokens_details": {"reasoning_tokens": 12},
                "total_tokens": 123
            }
        })
    }

    #[test]
    fn output_items_become_messages() {
        let extraction = extract_responses(&response());
        assert_eq!(extraction.correlation_id.as_deref(), Some("resp_123"));
        assert_eq!(extraction.messages.len(), 2);

        let search = &extraction.messages[0];
        assert_eq!(search.external_id.as_deref(), Some("resp_123-output-0"));
        assert_eq!(search.content.as_deref(), Some("[Web search performed]"));
        assert_eq!(search.metadata["tool_type"], MetadataValue::from("web_search_call"));
        assert_eq!(search.metadata["tool_status"], MetadataValue::from("completed"));

        let message = &extraction.messages[1];
        assert_eq!(message.external_id.as_deref(), Some("resp_123-output-1"));
        assert_eq!(message.role, "Assistant");
        assert_eq!(
            message.content.as_deref(),
            Some("Here is the news. [Image response]")
        );
        assert_eq!(message.metadata["item_id"], MetadataValue::from("msg_1"));
        assert_eq!(message.metadata["type"], MetadataValue::from("response"));
        assert_eq!(message.metadata["output_tokens_reasoning_tokens"], MetadataValue::Integer(12));
        assert_eq!(message.metadata["input_tokens_cached_tokens"], MetadataValue::Integer(0));
        assert_eq!(message.metadata["total_tokens"], MetadataValue::Integer(123));
    }

    #[test]
    fn output_text_fallback() {
        let extraction = extract_responses(&json!({
            "output": [],
            "output_text": "Just text"
        }));
        assert_eq!(extraction.correlation_id, None);
        assert_eq!(extraction.messages.len(), 1);
        let message = &extraction.messages[0];
        assert_eq!(message.external_id.as_deref(), Some("response"));
        assert_eq!(message.role, "Assistant");
        assert_eq!(message.content.as_deref(), Some("Just text"));
    }

    #[test]
    fn function_and_unknown_calls() {
        let call = output_item(&json!({
            "type": "function_call",
            "call_id": "call_9",
            "name": "get_weather",
            "arguments": "{\"city\":\"Oslo\"}"
        }))
        .unwrap();
        assert_eq!(call.content.as_deref(), Some("[Function call: get_weather]"));
        assert_eq!(call.fields["function_name"], MetadataValue::from("get_weather"));
        assert_eq!(call.fields["call_id"], MetadataValue::from("call_9"));
        assert_eq!(call.fields["arguments"], MetadataValue::from("{\"city\":\"Oslo\"}"));

        let pending = output_item(&json!({"type": "function_call", "name": "f", "arguments": ""})).unwrap();
        assert!(!pending.fields.contains_key("arguments"));

        let other = output_item(&json!({"type": "code_interpreter_call"})).unwrap();
        assert_eq!(other.content.as_deref(), Some("[Tool call: code_interpreter_call]"));

        assert!(output_item(&json!({"type": "something_new"})).is_none());
    }

    #[test]
    fn reasoning_preview_is_truncated() {
        let long = "x".repeat(150);
        let item = output_item(&json!({"type": "reasoning_item", "content": long})).unwrap();
        let expected = format!("[Reasoning: {}...]", "x".repeat(100));
        assert_eq!(item.content.as_deref(), Some(expected.as_str()));

        let summary = output_item(&json!({
            "type": "reasoning",
            "summary": [{"type": "summary_text", "text": "Checked the forecast"}]
        }))
        .unwrap();
        assert_eq!(
            summary.content.as_deref(),
            Some("[Reasoning: Checked the forecast...]")
        );

        let empty = output_item(&json!({"type": "reasoning", "summary": []})).unwrap();
        assert_eq!(empty.content.as_deref(), Some("[Reasoning trace]"));
    }
}
