//! Chat completions and legacy text completions

use serde_json::Value;

use super::{Extraction, OutputDraft, content_text, correlation_id, finish_message};
use crate::sanitize::{copy_fields, field, is_truthy, metadata_value};
use crate::types::Metadata;

/// Recognized fields of `choices[].message` (`content` becomes the message body)
const MESSAGE_KEYS: &[&str] = &[
    "content",
    "refusal",
    "role",
    "annotations",
    "function_call",
    "tool_calls",
];

/// Recognized fields of `choices[]`
const CHOICE_KEYS: &[&str] = &["finish_reason", "index", "logprobs"];

/// Response-level fields
const RESPONSE_KEYS: &[&str] = &[
    "created",
    "id",
    "model",
    "object",
    "service_tier",
    "system_fingerprint",
];

const USAGE_KEYS: &[&str] = &["completion_tokens", "prompt_tokens", "total_tokens"];

const COMPLETION_DETAIL_KEYS: &[&str] = &[
    "accepted_prediction_tokens",
    "reasoning_tokens",
    "rejected_prediction_tokens",
];

pub(super) fn extract_completion(response: &Value) -> Extraction {
    let drafts = choices(response)
        .last()
        .map(|choice| OutputDraft {
            content: field(choice, "text").and_then(content_text),
            fields: Metadata::new(),
        })
        .into_iter()
        .collect();
    finish(response, drafts)
}

pub(super) fn extract_chat(response: &Value) -> Extraction {
    let drafts = choices(response).iter().map(chat_choice).collect();
    finish(response, drafts)
}

fn choices(response: &Value) -> &[Value] {
    response
        .get("choices")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn chat_choice(choice: &Value) -> OutputDraft {
    let message = match field(choice, "message") {
        Some(message) if is_truthy(message) => message,
        _ => return OutputDraft::default(),
    };

    let mut fields = Metadata::new();
    copy_fields(&mut fields, message, MESSAGE_KEYS);
    copy_fields(&mut fields, choice, CHOICE_KEYS);

    let content = fields.shift_remove("content").map(|v| v.to_string());
    OutputDraft { content, fields }
}

fn finish(response: &Value, drafts: Vec<OutputDraft>) -> Extraction {
    let metadata = response_metadata(response);
    let external_id = metadata.get("id").map(|v| v.to_string());
    let messages = drafts
        .into_iter()
        .map(|draft| finish_message(draft, &metadata, external_id.clone()))
        .collect();
    Extraction {
        messages,
        correlation_id: correlation_id(response),
    }
}

/// Response-level metadata of a chat or completion response: identifiers,
/// token usage, and the completion-token breakdown. `cached_tokens` is only
/// recorded when non-zero.
pub fn response_metadata(response: &Value) -> Metadata {
    let mut metadata = Metadata::new();
    copy_fields(&mut metadata, response, RESPONSE_KEYS);

    let Some(usage) = field(response, "usage") else {
        return metadata;
    };
    copy_fields(&mut metadata, usage, USAGE_KEYS);
    if let Some(details) = field(usage, "completion_tokens_details") {
        copy_fields(&mut metadata, details, COMPLETION_DETAIL_KEYS);
    }
    if let Some(cached) = field(usage, "prompt_tokens_details")
        .and_then(|details| field(details, "cached_tokens"))
        .filter(|v| is_truthy(v))
        .and_then(metadata_value)
    {
        metadata.insert("cached_tokens".into(), cached);
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetadataValue;
    use serde_json::json;

    fn md(pairs: &[(&str, MetadataValue)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn single_choice_chat_response() {
        let response = json!({
            "choices": [{
                "message": {"content": "Hi", "refusal": null, "role": "new role"},
                "finish_reason": "stop",
                "index": 0,
                "logprobs": []
            }],
            "id": "message_1"
        });
        let extraction = extract_chat(&response);
        assert_eq!(extraction.correlation_id.as_deref(), Some("message_1"));
        assert_eq!(extraction.messages.len(), 1);

        let message = &extraction.messages[0];
        assert_eq!(message.external_id.as_deref(), Some("message_1"));
        assert_eq!(message.role, "New Role");
        assert_eq!(message.content.as_deref(), Some("Hi"));
        assert_eq!(message.json_content, None);
        assert_eq!(
            message.metadata,
            md(&[
                ("id", "message_1".into()),
                ("type", "response".into()),
                ("role", "new role".into()),
                ("finish_reason", "stop".into()),
                ("index", MetadataValue::Integer(0)),
                ("logprobs", "[]".into()),
            ])
        );
    }

    #[test]
    fn every_choice_becomes_a_message() {
        let response = json!({
            "id": "chatcmpl-2",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "one"}},
                {"index": 1, "message": {"role": "assistant", "content": "two"}},
                {"index": 2, "message": {}}
            ]
        });
        let extraction = extract_chat(&response);
        let contents: Vec<_> = extraction
            .messages
            .iter()
            .map(|m| m.content.as_deref())
            .collect();
        assert_eq!(contents, [Some("one"), Some("two"), None]);
        assert_eq!(extraction.messages[2].role, "Assistant");
    }

    #[test]
    fn tool_calls_are_json_encoded() {
        let response = json!({
            "id": "chatcmpl-3",
            "choices": [{
                "index": 0,
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{"id": "call_1", "type": "function",
                        "function": {"name": "get_current_weather", "arguments": "{}"}}]
                }
            }]
        });
        let message = &extract_chat(&response).messages[0];
        assert_eq!(message.content, None);
        assert_eq!(
            message.metadata["tool_calls"],
            MetadataValue::from(
                r#"[{"id":"call_1","type":"function","function":{"name":"get_current_weather","arguments":"{}"}}]"#
            )
        );
    }

    #[test]
    fn completion_uses_last_choice_text() {
        let response = json!({
            "id": "cmpl-1",
            "model": "gpt-3.5-turbo-instruct",
            "choices": [{"text": "first", "index": 0}, {"text": "second", "index": 1}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 7, "total_tokens": 12}
        });
        let extraction = extract_completion(&response);
        assert_eq!(extraction.messages.len(), 1);
        let message = &extraction.messages[0];
        assert_eq!(message.content.as_deref(), Some("second"));
        assert_eq!(message.role, "Assistant");
        assert_eq!(message.metadata["total_tokens"], MetadataValue::Integer(12));
    }

    #[test]
    fn response_metadata_flattens_usage() {
        assert!(response_metadata(&json!({})).is_empty());

        let metadata = response_metadata(&json!({
            "usage": {
                "completion_tokens_details": {
                    "reasoning_tokens": 34,
                    "rejected_prediction_tokens": 0
                },
                "prompt_tokens_details": {"cached_tokens": 1},
                "total_tokens": 67
            },
            "created": 1234,
            "id": 1111,
            "model": "openai-mini-v12",
            "object": "text",
            "service_tier": "pro",
            "system_fingerprint": 123
        }));
        assert_eq!(
            metadata,
            md(&[
                ("reasoning_tokens", MetadataValue::Integer(34)),
                ("rejected_prediction_tokens", MetadataValue::Integer(0)),
                ("cached_tokens", MetadataValue::Integer(1)),
                ("total_tokens", MetadataValue::Integer(67)),
                ("created", MetadataValue::Integer(1234)),
                ("id", MetadataValue::Integer(1111)),
                ("model", "openai-mini-v12".into()),
                ("object", "text".into()),
                ("service_tier", "pro".into()),
                ("system_fingerprint", MetadataValue::Integer(123)),
            ])
        );
    }

    #[test]
    fn zero_cached_tokens_are_skipped() {
        let metadata = response_metadata(&json!({
            "usage": {"prompt_tokens_details": {"cached_tokens": 0}}
        }));
        assert!(!metadata.contains_key("cached_tokens"));
    }
}
