//! Instrumented endpoints
//!
//! The table of client endpoints the recorder knows how to intercept, each
//! tagged with its protocol family and call mode. Endpoints introduced in a
//! later client SDK carry a minimum version and are left out when an older
//! SDK is in use.

use semver::Version;

use crate::types::{ProtocolFamily, ResourceDescriptor};

pub const CHAT_COMPLETIONS: &str = "chat.completions.create";
pub const COMPLETIONS: &str = "completions.create";
pub const RESPONSES: &str = "responses.create";

/// First client SDK version exposing the Responses endpoint
pub const RESPONSES_MINIMUM_VERSION: &str = "1.66.0";

/// Every endpoint the recorder understands
pub const DESCRIPTORS: &[ResourceDescriptor] = &[
    ResourceDescriptor::new(CHAT_COMPLETIONS, ProtocolFamily::Chat, true),
    ResourceDescriptor::new(CHAT_COMPLETIONS, ProtocolFamily::Chat, false),
    ResourceDescriptor::new(COMPLETIONS, ProtocolFamily::Completion, true),
    ResourceDescriptor::new(COMPLETIONS, ProtocolFamily::Completion, false),
    ResourceDescriptor::new(RESPONSES, ProtocolFamily::Response, true)
        .with_minimum_version(RESPONSES_MINIMUM_VERSION),
    ResourceDescriptor::new(RESPONSES, ProtocolFamily::Response, false)
        .with_minimum_version(RESPONSES_MINIMUM_VERSION),
];

/// Descriptors available for the given client SDK version.
///
/// An unparsable version keeps only the descriptors without a minimum.
pub fn supported(sdk_version: &str) -> Vec<&'static ResourceDescriptor> {
    let version = Version::parse(sdk_version.trim().trim_start_matches('v')).ok();
    if version.is_none() {
        tracing::debug!(sdk_version, "unparsable client SDK version");
    }
    DESCRIPTORS
        .iter()
        .filter(|descriptor| match descriptor.minimum_version {
            None => true,
            Some(minimum) => match (&version, Version::parse(minimum)) {
                (Some(version), Ok(minimum)) => *version >= minimum,
                _ => false,
            },
        })
        .collect()
}

/// Find the descriptor for an endpoint name and call mode
pub fn lookup(name: &str, synchronous: bool) -> Option<&'static ResourceDescriptor> {
    DESCRIPTORS
        .iter()
        .find(|descriptor| descriptor.name == name && descriptor.synchronous == synchronous)
}
