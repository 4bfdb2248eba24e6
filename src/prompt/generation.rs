//! Generation-parameter tables
//!
//! Recognized request parameters and the value recorded when the caller
//! left them unset. Parameters outside these tables are not recorded here.

use serde_json::Value;

use crate::sanitize::{field, metadata_value};
use crate::types::{Metadata, MetadataValue};

/// Value recorded for an unset parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    /// Nothing is recorded when the parameter is unset
    Unset,
    Integer(i64),
    Flag(bool),
    Text(&'static str),
}

impl DefaultValue {
    fn to_metadata(self) -> Option<MetadataValue> {
        match self {
            Self::Unset => None,
            Self::Integer(n) => Some(MetadataValue::Integer(n)),
            Self::Flag(b) => Some(MetadataValue::from(b)),
            Self::Text(s) => Some(MetadataValue::from(s)),
        }
    }
}

/// A parameter table: `(name, default)` in recording order
pub type ParameterTable = &'static [(&'static str, DefaultValue)];

/// Chat/completions request parameters
pub const GENERATION_PARAMETERS: ParameterTable = &[
    ("frequency_penalty", DefaultValue::Integer(0)),
    ("logit_bias", DefaultValue::Unset),
    ("logprobs", DefaultValue::Flag(false)),
    ("max_completion_tokens", DefaultValue::Unset),
    ("max_tokens", DefaultValue::Unset),
    ("modalities", DefaultValue::Unset),
    ("n", DefaultValue::Integer(1)),
    ("parallel_tool_calls", DefaultValue::Flag(true)),
    ("prediction", DefaultValue::Unset),
    ("presence_penalty", DefaultValue::Integer(0)),
    ("reasoning_effort", DefaultValue::Text("medium")),
    ("response_format", DefaultValue::Unset),
    ("seed", DefaultValue::Unset),
    ("service_tier", DefaultValue::Text("auto")),
    ("stop", DefaultValue::Unset),
    ("store", DefaultValue::Flag(false)),
    ("stream", DefaultValue::Flag(false)),
    ("stream_options", DefaultValue::Unset),
    ("temperature", DefaultValue::Integer(1)),
    ("tool_choice", DefaultValue::Unset),
    ("top_logprobs", DefaultValue::Unset),
    ("top_p", DefaultValue::Integer(1)),
    ("user", DefaultValue::Unset),
    ("web_search_options", DefaultValue::Unset),
    ("metadata", DefaultValue::Unset),
];

/// Responses API request parameters, consulted before [`GENERATION_PARAMETERS`]
pub const RESPONSES_PARAMETERS: ParameterTable = &[
    ("model", DefaultValue::Unset),
    ("temperature", DefaultValue::Integer(1)),
    ("top_p", DefaultValue::Integer(1)),
    ("max_output_tokens", DefaultValue::Unset),
    ("stream", DefaultValue::Flag(false)),
    ("store", DefaultValue::Flag(true)),
    ("parallel_tool_calls", DefaultValue::Flag(true)),
    ("tool_choice", DefaultValue::Text("auto")),
    ("background", DefaultValue::Flag(false)),
    ("service_tier", DefaultValue::Text("auto")),
    ("truncation", DefaultValue::Text("auto")),
    ("user", DefaultValue::Unset),
];

/// Build generation metadata from `params`.
///
/// Tables are consulted in order; a parameter already recorded by an
/// earlier table is not looked at again.
pub fn generation_metadata(params: &Value, tables: &[ParameterTable]) -> Metadata {
    let mut metadata = Metadata::new();
    for table in tables {
        for (name, default) in table.iter() {
            if metadata.contains_key(*name) {
                continue;
            }
            let value = field(params, name)
                .and_then(metadata_value)
                .or_else(|| default.to_metadata());
            if let Some(value) = value {
                metadata.insert((*name).to_string(), value);
            }
        }
    }
    metadata
}
