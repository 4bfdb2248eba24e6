//! Delta protocol (`choices[].delta`, `choices[].text`)

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::extract::Extraction;
use crate::sanitize::{field, metadata_value, prune_falsy, str_field, title_case, without_falsy};
use crate::types::{Message, Metadata, MetadataValue};

/// A tool call assembled from fragments sharing one index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallBuilder {
    /// Set by the first fragment that names the call
    pub name: Option<String>,
    /// Concatenation of every argument fragment
    pub arguments: String,
}

impl ToolCallBuilder {
    fn merge(&mut self, name: Option<&str>, arguments: Option<&str>) {
        if self.name.is_none()
            && let Some(name) = name.filter(|n| !n.is_empty())
        {
            self.name = Some(name.to_string());
        }
        if let Some(arguments) = arguments {
            self.arguments.push_str(arguments);
        }
    }
}

/// Working state for delta-protocol streams
#[derive(Debug, Default)]
pub(crate) struct DeltaState {
    text_completion: bool,
    response_id: Option<String>,
    model: Option<String>,
    created_at: Option<i64>,
    usage: Option<Value>,
    finish_reason: Option<String>,
    role: Option<String>,
    content: String,
    refusal: String,
    tool_calls: BTreeMap<u64, ToolCallBuilder>,
}

impl DeltaState {
    /// `text_completion` selects `choices[].text` instead of `choices[].delta`.
    pub fn new(text_completion: bool) -> Self {
        Self {
            text_completion,
            ..Default::default()
        }
    }

    pub fn observe(&mut self, chunk: &Value) {
        // placeholder chunks carry an empty id/model and created == 0
        if self.response_id.is_none()
            && let Some(id) = str_field(chunk, "id").filter(|s| !s.is_empty())
        {
            self.response_id = Some(id.to_string());
        }
        if let Some(model) = str_field(chunk, "model").filter(|s| !s.is_empty()) {
            self.model = Some(model.to_string());
        }
        if let Some(created) = chunk.get("created").and_then(Value::as_i64).filter(|c| *c != 0) {
            self.created_at = Some(created);
        }
        if let Some(usage) = field(chunk, "usage") {
            self.usage = Some(usage.clone());
        }

        let Some(choices) = chunk.get("choices").and_then(Value::as_array) else {
            return;
        };
        for choice in choices {
            if let Some(reason) = str_field(choice, "finish_reason") {
                self.finish_reason = Some(reason.to_string());
            }
            if self.text_completion {
                if let Some(text) = str_field(choice, "text") {
                    self.content.push_str(text);
                }
            } else if let Some(delta) = field(choice, "delta") {
                self.observe_delta(delta);
            }
        }
    }

    fn observe_delta(&mut self, delta: &Value) {
        if let Some(reason) = str_field(delta, "finish_reason") {
            self.finish_reason = Some(reason.to_string());
        }
        if self.role.is_none()
            && let Some(role) = str_field(delta, "role")
        {
            self.role = Some(role.to_string());
        }

        if let Some(content) = str_field(delta, "content") {
            self.content.push_str(content);
        } else if let Some(call) = field(delta, "function_call") {
            self.merge_tool_call(Some(0), call);
        } else if let Some(calls) = field(delta, "tool_calls").and_then(Value::as_array) {
            for call in calls {
                let index = call.get("index").and_then(Value::as_u64);
                let function = field(call, "function").unwrap_or(&Value::Null);
                self.merge_tool_call(index, function);
            }
        }

        if let Some(refusal) = str_field(delta, "refusal") {
            self.refusal.push_str(refusal);
        }
    }

    fn merge_tool_call(&mut self, index: Option<u64>, function: &Value) {
        let name = str_field(function, "name");
        let last = self.tool_calls.keys().next_back().copied();
        let slot = match (index, last) {
            (Some(index), _) => index,
            // unindexed fragments: a name starts a new call, anything else
            // continues the latest one
            (None, Some(last)) if name.is_some() => last + 1,
            (None, Some(last)) => last,
            (None, None) => 0,
        };
        self.tool_calls
            .entry(slot)
            .or_default()
            .merge(name, str_field(function, "arguments"));
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallBuilder> {
        self.tool_calls.values()
    }

    pub fn finish(self) -> Extraction {
        let mut metadata = Metadata::new();
        if let Some(model) = self.model {
            metadata.insert("model".into(), model.into());
        }
        if let Some(usage) = self.usage.and_then(prune_falsy).as_ref().and_then(metadata_value) {
            metadata.insert("usage".into(), usage);
        }
        if let Some(reason) = self.finish_reason {
            metadata.insert("finish_reason".into(), reason.into());
        }
        if let Some(created) = self.created_at {
            metadata.insert("created_at".into(), MetadataValue::Integer(created));
        }
        metadata.insert("refusal".into(), self.refusal.into());
        if !self.tool_calls.is_empty() {
            let calls: Vec<Value> = self
                .tool_calls
                .into_values()
                .map(|call| json!({"name": call.name.unwrap_or_default(), "arguments": call.arguments}))
                .collect();
            if let Some(encoded) = metadata_value(&Value::Array(calls)) {
                metadata.insert("tool_calls".into(), encoded);
            }
        }

        let role = title_case(self.role.as_deref().unwrap_or("assistant"));
        let mut message = Message::new(role, Some(self.content)).with_metadata(without_falsy(metadata));
        if let Some(id) = &self.response_id {
            message = message.with_external_id(id.clone());
        }

        Extraction {
            messages: vec![message],
            correlation_id: self.response_id,
        }
    }
}
