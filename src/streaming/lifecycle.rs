//! Lifecycle protocol (`response.*` events)
//!
//! Output items are opened by `output_item.added`, filled by text and
//! argument deltas, and closed by `output_item.done`. At the end the
//! reconstructed items are folded into a synthetic response object and run
//! through the Responses extractor.

use indexmap::IndexMap;
use serde_json::{Map, Value, json};

use crate::extract::{Extraction, extract_response};
use crate::sanitize::{field, str_field};
use crate::types::ProtocolFamily;

#[derive(Debug, Default)]
struct OpenItem {
    item: Map<String, Value>,
    /// Text of the content part currently being streamed
    buffer: String,
}

impl OpenItem {
    fn close_text_part(&mut self, text: Option<&str>) {
        let text = match text {
            Some(text) if self.buffer.is_empty() => text.to_string(),
            _ => std::mem::take(&mut self.buffer),
        };
        let content = self
            .item
            .entry("content")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(parts) = content {
            parts.push(json!({"type": "output_text", "text": text}));
        }
    }

    fn into_item(mut self) -> Value {
        if !self.buffer.is_empty() {
            self.close_text_part(None);
        }
        Value::Object(self.item)
    }
}

/// Working state for lifecycle-protocol streams
#[derive(Debug, Default)]
pub(crate) struct LifecycleState {
    /// Merged `response` snapshots, later ones overwrite
    response: Map<String, Value>,
    /// Id seen on the events themselves
    event_response_id: Option<String>,
    open: IndexMap<String, OpenItem>,
    current: Option<String>,
    finished: Vec<Value>,
    anonymous_items: usize,
}

impl LifecycleState {
    pub fn observe(&mut self, event: &Value) {
        if let Some(id) = str_field(event, "response_id")
            .or_else(|| str_field(event, "id"))
            .filter(|id| !id.is_empty())
        {
            self.event_response_id = Some(id.to_string());
        }

        let Some(kind) = str_field(event, "type") else {
            return;
        };
        match kind {
            "response.created"
            | "response.in_progress"
            | "response.done"
            | "response.completed"
            | "response.incomplete" => self.merge_snapshot(event),
            "response.output_item.added" => self.open_item(event),
            "response.text.delta" | "response.output_text.delta" => {
                if let Some(delta) = str_field(event, "delta")
                    && let Some(item) = self.target(event)
                {
                    item.buffer.push_str(delta);
                }
            }
            "response.text.done" | "response.output_text.done" => {
                let text = str_field(event, "text");
                if let Some(item) = self.target(event) {
                    item.close_text_part(text);
                }
            }
            "response.function_call_arguments.delta" => {
                if let Some(delta) = str_field(event, "delta")
                    && let Some(item) = self.target(event)
                {
                    let arguments = item
                        .item
                        .entry("arguments")
                        .or_insert_with(|| Value::String(String::new()));
                    if let Value::String(arguments) = arguments {
                        arguments.push_str(delta);
                    }
                }
            }
            "response.function_call_arguments.done" => {
                if let Some(arguments) = field(event, "arguments").cloned()
                    && let Some(item) = self.target(event)
                {
                    item.item.insert("arguments".into(), arguments);
                }
            }
            "response.output_item.done" => self.close_item(event),
            _ => {}
        }
    }

    fn merge_snapshot(&mut self, event: &Value) {
        if let Some(Value::Object(snapshot)) = field(event, "response") {
            for (key, value) in snapshot {
                self.response.insert(key.clone(), value.clone());
            }
        }
    }

    fn payload(event: &Value) -> Option<&Map<String, Value>> {
        field(event, "item")
            .or_else(|| field(event, "output_item"))
            .and_then(Value::as_object)
    }

    fn open_item(&mut self, event: &Value) {
        let item = Self::payload(event).cloned().unwrap_or_default();
        let key = match item.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                self.anonymous_items += 1;
                format!("#{}", self.anonymous_items)
            }
        };
        self.open.insert(
            key.clone(),
            OpenItem {
                item,
                buffer: String::new(),
            },
        );
        self.current = Some(key);
    }

    fn target_key(&self, event: &Value) -> Option<String> {
        let named = str_field(event, "item_id")
            .or_else(|| Self::payload(event).and_then(|p| p.get("id")).and_then(Value::as_str))
            .filter(|id| self.open.contains_key(*id));
        named.map(str::to_string).or_else(|| self.current.clone())
    }

    fn target(&mut self, event: &Value) -> Option<&mut OpenItem> {
        let key = self.target_key(event)?;
        self.open.get_mut(&key)
    }

    fn close_item(&mut self, event: &Value) {
        let Some(key) = self.target_key(event) else {
            return;
        };
        let Some(mut open) = self.open.shift_remove(&key) else {
            return;
        };
        // the done payload carries final status; keep our content unless we have none
        if let Some(done) = Self::payload(event) {
            for (k, v) in done {
                if k != "content" || !open.item.contains_key("content") {
                    open.item.insert(k.clone(), v.clone());
                }
            }
        }
        self.finished.push(open.into_item());
        if self.current.as_deref() == Some(key.as_str()) {
            self.current = None;
        }
    }

    pub fn finish(self) -> Extraction {
        let mut response = self.response;
        response
            .entry("object")
            .or_insert_with(|| Value::String("response".into()));
        if field_missing(&response, "id")
            && let Some(id) = &self.event_response_id
        {
            response.insert("id".into(), Value::String(id.clone()));
        }

        let snapshot_has_output = response
            .get("output")
            .and_then(Value::as_array)
            .is_some_and(|output| !output.is_empty());
        if !snapshot_has_output {
            let mut output = self.finished;
            output.extend(self.open.into_values().map(OpenItem::into_item));
            response.insert("output".into(), Value::Array(output));
        }

        let mut extraction = extract_response(ProtocolFamily::Response, &Value::Object(response))
            .unwrap_or_default();
        if extraction.correlation_id.is_none() {
            extraction.correlation_id = self.event_response_id;
        }
        extraction
    }
}

fn field_missing(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).is_none_or(Value::is_null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(events: &[Value]) -> Extraction {
        let mut state = LifecycleState::default();
        for event in events {
            state.observe(event);
        }
        state.finish()
    }

    #[test]
    fn reconstructs_message_from_text_deltas() {
        let extraction = feed(&[
            json!({"type": "response.created", "response": {"id": "resp_1", "model": "gpt-4.1", "output": []}}),
            json!({"type": "response.output_item.added", "output_index": 0,
                   "item": {"id": "msg_1", "type": "message", "role": "assistant", "content": []}}),
            json!({"type": "response.output_text.delta", "item_id": "msg_1", "delta": "Hello"}),
            json!({"type": "response.output_text.delta", "item_id": "msg_1", "delta": " world"}),
            json!({"type": "response.output_text.done", "item_id": "msg_1", "text": "Hello world"}),
            json!({"type": "response.output_item.done", "item": {"id": "msg_1", "type": "message", "status": "completed"}}),
            json!({"type": "response.some_future_event", "payload": 1}),
        ]);
        assert_eq!(extraction.correlation_id.as_deref(), Some("resp_1"));
        assert_eq!(extraction.messages.len(), 1);
        let message = &extraction.messages[0];
        assert_eq!(message.content.as_deref(), Some("Hello world"));
        assert_eq!(message.role, "Assistant");
        assert_eq!(message.external_id.as_deref(), Some("resp_1"));
    }

    #[test]
    fn legacy_event_names_and_output_item_payload() {
        let extraction = feed(&[
            json!({"type": "response.output_item.added", "output_item": {"type": "message", "role": "assistant"}}),
            json!({"type": "response.text.delta", "delta": "Hi"}),
            json!({"type": "response.text.done"}),
            json!({"type": "response.output_item.done"}),
            json!({"type": "response.done", "response": {"id": "resp_2"}}),
        ]);
        assert_eq!(extraction.correlation_id.as_deref(), Some("resp_2"));
        assert_eq!(extraction.messages[0].content.as_deref(), Some("Hi"));
    }

    #[test]
    fn completed_snapshot_output_is_authoritative() {
        let extraction = feed(&[
            json!({"type": "response.output_item.added", "item": {"id": "msg_1", "type": "message"}}),
            json!({"type": "response.output_text.delta", "item_id": "msg_1", "delta": "partial"}),
            json!({"type": "response.completed", "response": {
                "id": "resp_3",
                "output": [{"type": "message", "role": "assistant",
                            "content": [{"type": "output_text", "text": "final text"}]}]
            }}),
        ]);
        assert_eq!(extraction.messages.len(), 1);
        assert_eq!(extraction.messages[0].content.as_deref(), Some("final text"));
    }

    #[test]
    fn function_call_arguments_accumulate() {
        let extraction = feed(&[
            json!({"type": "response.output_item.added",
                   "item": {"id": "fc_1", "type": "function_call", "call_id": "call_1",
                            "name": "get_weather", "arguments": ""}}),
            json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "{\"city\":"}),
            json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "delta": "\"Paris\"}"}),
            json!({"type": "response.output_item.done", "item": {"id": "fc_1", "status": "completed"}}),
        ]);
        assert_eq!(extraction.messages.len(), 1);
        let message = &extraction.messages[0];
        assert_eq!(message.content.as_deref(), Some("[Function call: get_weather]"));
        assert_eq!(
            message.metadata.get("tool_status").and_then(|v| v.as_str()),
            Some("completed")
        );
        assert_eq!(
            message.metadata.get("arguments").and_then(|v| v.as_str()),
            Some(r#"{"city":"Paris"}"#)
        );
        assert_eq!(
            message.metadata.get("call_id").and_then(|v| v.as_str()),
            Some("call_1")
        );
    }

    #[test]
    fn unfinished_items_are_kept() {
        let extraction = feed(&[
            json!({"type": "response.created", "response": {"id": "resp_4"}}),
            json!({"type": "response.output_item.added", "item": {"id": "msg_1", "type": "message", "role": "assistant"}}),
            json!({"type": "response.output_text.delta", "item_id": "msg_1", "delta": "cut off"}),
        ]);
        assert_eq!(extraction.messages[0].content.as_deref(), Some("cut off"));
    }

    #[test]
    fn event_level_id_is_the_fallback() {
        let extraction = feed(&[json!({"type": "response.output_text.delta", "response_id": "resp_5", "delta": "x"})]);
        assert_eq!(extraction.correlation_id.as_deref(), Some("resp_5"));
        assert!(extraction.messages.is_empty());
    }
}
