//! Streaming Reconstructor
//!
//! [`RecordingIter`] and [`RecordingStream`] wrap an upstream iterator or
//! stream, yield every item unchanged, and feed a borrowed plain view of each
//! item to an [`Accumulator`]. When the upstream is exhausted (or the async
//! wrapper is closed) the accumulated state is turned into output messages
//! and handed to the sink, exactly once.
//!
//! Two wire vocabularies are understood:
//! - the delta protocol: chunks with `choices[].delta` (chat) or
//!   `choices[].text` (legacy completions)
//! - the lifecycle protocol: typed `response.*` events
//!
//! The protocol is picked from the first chunk that looks like either one.

mod chunk;
mod delta;
mod iter;
mod lifecycle;
mod stream;

pub use chunk::StreamChunk;
pub use delta::ToolCallBuilder;
pub use iter::RecordingIter;
pub use stream::RecordingStream;

use serde_json::Value;

use crate::extract::Extraction;
use crate::isolation::isolate;
use crate::sanitize::str_field;
use crate::sink::Dispatcher;
use crate::types::{Conversation, Message, ProtocolFamily};

use delta::DeltaState;
use lifecycle::LifecycleState;

#[derive(Debug)]
enum Protocol {
    Undetected,
    Delta(DeltaState),
    Lifecycle(Box<LifecycleState>),
}

/// Reconstruction state for one stream
#[derive(Debug)]
pub struct Accumulator {
    family: ProtocolFamily,
    protocol: Protocol,
    observed: usize,
}

impl Accumulator {
    pub fn new(family: ProtocolFamily) -> Self {
        Self {
            family,
            protocol: Protocol::Undetected,
            observed: 0,
        }
    }

    /// Number of chunks observed so far
    pub fn observed(&self) -> usize {
        self.observed
    }

    /// Fold one chunk into the state. Chunks of the other protocol, and
    /// chunks that match neither, are ignored.
    pub fn observe(&mut self, chunk: &Value) {
        self.observed += 1;

        let lifecycle = str_field(chunk, "type").is_some_and(|t| t.starts_with("response."));
        let delta = chunk.get("choices").is_some();

        if let Protocol::Undetected = self.protocol {
            if lifecycle {
                self.protocol = Protocol::Lifecycle(Box::default());
            } else if delta {
                self.protocol =
                    Protocol::Delta(DeltaState::new(self.family == ProtocolFamily::Completion));
            }
        }

        match &mut self.protocol {
            Protocol::Delta(state) if delta => state.observe(chunk),
            Protocol::Lifecycle(state) if lifecycle => state.observe(chunk),
            _ => tracing::debug!("ignoring stream chunk of unexpected shape"),
        }
    }

    /// Turn the accumulated state into output messages.
    ///
    /// A stream that never produced a recognizable chunk yields no messages
    /// and no correlation id.
    pub fn finish(self) -> Extraction {
        match self.protocol {
            Protocol::Undetected => Extraction::empty(),
            Protocol::Delta(state) => state.finish(),
            Protocol::Lifecycle(state) => state.finish(),
        }
    }
}

#[derive(Debug)]
enum State {
    Streaming(Accumulator),
    Finalized,
}

/// Side channel shared by both wrappers: the accumulator behind a
/// finalize-once guard, plus what is needed to write the conversation.
#[derive(Debug)]
pub(crate) struct Reconstruction {
    state: State,
    prompt: Vec<Message>,
    dispatcher: Dispatcher,
}

impl Reconstruction {
    pub fn new(family: ProtocolFamily, prompt: Vec<Message>, dispatcher: Dispatcher) -> Self {
        Self {
            state: State::Streaming(Accumulator::new(family)),
            prompt,
            dispatcher,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, State::Finalized)
    }

    pub fn observe<C: StreamChunk + ?Sized>(&mut self, item: &C) {
        if !self.dispatcher.is_enabled() {
            return;
        }
        let State::Streaming(accumulator) = &mut self.state else {
            return;
        };
        isolate("could not observe stream chunk", || {
            if let Some(plain) = item.as_plain() {
                accumulator.observe(&plain);
            }
            Ok(())
        });
    }

    /// Finalize at most once; later calls are no-ops.
    pub fn finalize(&mut self) {
        let State::Streaming(accumulator) = std::mem::replace(&mut self.state, State::Finalized)
        else {
            return;
        };
        if !self.dispatcher.is_enabled() {
            return;
        }
        let prompt = std::mem::take(&mut self.prompt);
        if let Some(extraction) =
            isolate("could not record streamed response", || Ok(accumulator.finish()))
        {
            tracing::debug!(
                messages = extraction.messages.len(),
                correlation_id = ?extraction.correlation_id,
                "stream finalized"
            );
            self.dispatcher.dispatch(Conversation::completed(
                prompt,
                extraction.messages,
                extraction.correlation_id,
            ));
        }
    }
}
