//! Resource descriptors
//!
//! A descriptor tells the recorder which wire protocol an instrumented
//! endpoint speaks and whether it is called synchronously.

use serde::{Deserialize, Serialize};

/// Protocol family of an instrumented endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolFamily {
    /// Legacy text completions (`choices[].text`)
    Completion,
    /// Chat completions (`choices[].message` / `choices[].delta`)
    Chat,
    /// Responses API (`output[]`, `response.*` lifecycle events)
    Response,
    /// Anything this crate does not understand; recorded as empty
    #[serde(other)]
    Other,
}

impl ProtocolFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::Chat => "chat",
            Self::Response => "response",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes one instrumented endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
    /// Endpoint name, e.g. `chat.completions.create`
    pub name: &'static str,
    pub family: ProtocolFamily,
    /// `true` for blocking clients, `false` for async ones
    pub synchronous: bool,
    /// Lowest client SDK version exposing this endpoint
    pub minimum_version: Option<&'static str>,
}

impl ResourceDescriptor {
    pub const fn new(name: &'static str, family: ProtocolFamily, synchronous: bool) -> Self {
        Self {
            name,
            family,
            synchronous,
            minimum_version: None,
        }
    }

    pub const fn with_minimum_version(mut self, version: &'static str) -> Self {
        self.minimum_version = Some(version);
        self
    }
}
