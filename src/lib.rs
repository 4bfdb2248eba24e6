//! # siumai-recorder
//!
//! Transparent recording of LLM completion calls. Wrap a chat, completion,
//! or responses call with a [`Recorder`] and it stores the conversation
//! (prompt messages, output messages, usage metadata) in a
//! [`ConversationSink`] without changing what the caller sees.
//!
#![deny(unsafe_code)]

//! ## Features
//!
//! - **Three wire protocols**: legacy completions, chat completions, and the
//!   Responses API, both plain and streamed.
//! - **Stream reconstruction**: delta chunks and `response.*` lifecycle events
//!   are folded back into complete messages, tool calls included.
//! - **Failure isolation**: nothing the recorder does can fail or alter the
//!   wrapped call. Errors and panics are logged and dropped.
//! - **Error threads**: failed calls are stored with the upstream error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use siumai_recorder::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let recorder = Recorder::from_config(&RecorderConfig::from_env()?)?;
//!     let descriptor = registry::lookup(registry::CHAT_COMPLETIONS, false).ok_or("unknown endpoint")?;
//!     let params = json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "Hi"}]});
//!
//!     let response = recorder
//!         .record_async(descriptor, &params, async {
//!             // call the client here
//!             Ok::<_, std::io::Error>(json!({"id": "chatcmpl-1", "choices": []}))
//!         })
//!         .await?;
//!     println!("{response}");
//!     recorder.flush().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod isolation;
pub mod prompt;
pub mod recorder;
pub mod registry;
pub mod sanitize;
pub mod sink;
pub mod streaming;
pub mod telemetry;
pub mod types;

pub use config::{RecorderConfig, RecorderConfigBuilder};
pub use error::{RecorderError, Result, SinkError};
pub use recorder::Recorder;
pub use sink::{ConversationSink, Dispatcher, HttpSink, MemorySink};
pub use streaming::{Accumulator, RecordingIter, RecordingStream, StreamChunk};
pub use types::{
    Conversation, Message, MessageKind, Metadata, MetadataValue, ProtocolFamily,
    ResourceDescriptor,
};

/// Commonly used types
pub mod prelude {
    pub use crate::config::RecorderConfig;
    pub use crate::error::{RecorderError, SinkError};
    pub use crate::recorder::Recorder;
    pub use crate::registry;
    pub use crate::sink::{ConversationSink, HttpSink, MemorySink};
    pub use crate::streaming::{RecordingIter, RecordingStream, StreamChunk};
    pub use crate::types::{Conversation, Message, ProtocolFamily, ResourceDescriptor};
}
