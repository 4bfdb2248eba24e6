//! Error types for siumai-recorder
//!
//! None of these ever reach the caller of a recorded endpoint: the recorder
//! absorbs them (see [`crate::isolation`]). They exist so internal code can
//! use `?` and so sinks can report what went wrong.

use thiserror::Error;

/// Errors raised inside the recording pipeline
#[derive(Error, Debug)]
pub enum RecorderError {
    /// A value could not be converted to or from JSON
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A response or stream could not be turned into messages
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The conversation sink failed
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Anything else, e.g. a delivery runtime that could not start
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for RecorderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors returned by a [`crate::sink::ConversationSink`]
#[derive(Error, Debug)]
pub enum SinkError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// The backend answered with a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The sink is missing credentials or a project
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The sink refused the conversation
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Result type for siumai-recorder operations
pub type Result<T> = std::result::Result<T, RecorderError>;
