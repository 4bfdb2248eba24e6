//! Non-Stream Response Extractor
//!
//! Turns one fully materialized response (already passed through
//! [`crate::sanitize::to_plain`]) into canonical output messages and the
//! response id used to correlate them.
//!
//! Every output message carries `type = response`, its own recognized fields,
//! then the response-level metadata (ids, timestamps, model, token usage).
//! Absent and null fields are left out.

mod chat;
mod responses;

use serde_json::Value;

use crate::error::{RecorderError, Result};
use crate::sanitize::{metadata_value, str_field, title_case};
use crate::types::{Message, Metadata, ProtocolFamily};

pub use chat::response_metadata;
pub use responses::responses_metadata;

/// Output messages plus the correlation id of the response they came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub messages: Vec<Message>,
    pub correlation_id: Option<String>,
}

impl Extraction {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// One output message before response-level metadata is merged in
#[derive(Debug, Clone, Default)]
pub(crate) struct OutputDraft {
    pub content: Option<String>,
    pub fields: Metadata,
}

impl OutputDraft {
    fn role(&self) -> Option<&str> {
        self.fields.get("role").and_then(|v| v.as_str())
    }
}

/// Extract output messages from a non-streamed response.
///
/// A `null` response yields an empty extraction. Anything other than an
/// object or `null` is an [`RecorderError::Extraction`].
pub fn extract_response(family: ProtocolFamily, response: &Value) -> Result<Extraction> {
    match response {
        Value::Null => return Ok(Extraction::empty()),
        Value::Object(_) => {}
        other => {
            return Err(RecorderError::Extraction(format!(
                "expected a response object, got {}",
                json_kind(other)
            )));
        }
    }

    let extraction = match family {
        ProtocolFamily::Completion => chat::extract_completion(response),
        ProtocolFamily::Chat => chat::extract_chat(response),
        ProtocolFamily::Response => responses::extract_responses(response),
        ProtocolFamily::Other => Extraction {
            messages: Vec::new(),
            correlation_id: correlation_id(response),
        },
    };
    Ok(extraction)
}

/// `id` of a response, when it is a string
pub(crate) fn correlation_id(response: &Value) -> Option<String> {
    str_field(response, "id").map(str::to_string)
}

/// Finish a draft: `type = response`, the draft's fields, then the shared
/// response metadata. The role is title-cased, defaulting to assistant.
pub(crate) fn finish_message(
    draft: OutputDraft,
    response_metadata: &Metadata,
    external_id: Option<String>,
) -> Message {
    let role = title_case(draft.role().unwrap_or("assistant"));

    let mut metadata = Metadata::new();
    metadata.insert("type".into(), "response".into());
    metadata.extend(draft.fields);
    metadata.extend(response_metadata.iter().map(|(k, v)| (k.clone(), v.clone())));

    let message = Message::new(role, draft.content).with_metadata(metadata);
    match external_id {
        Some(id) => message.with_external_id(id),
        None => message,
    }
}

/// Render a content value as text; non-string values are JSON-encoded.
pub(crate) fn content_text(value: &Value) -> Option<String> {
    metadata_value(value).map(|v| v.to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
