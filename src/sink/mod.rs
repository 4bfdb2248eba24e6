//! Conversation sinks
//!
//! A sink stores finished [`Conversation`]s. The [`Dispatcher`] hands each
//! conversation off and logs whatever the sink reports; nothing a sink does
//! reaches the caller of a recorded endpoint.

mod http;
mod memory;

pub use http::{DEFAULT_BASE_URL, HttpSink};
pub use memory::MemorySink;

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::task::TaskTracker;

use crate::error::{RecorderError, Result as RecorderResult, SinkError};
use crate::isolation::panic_message;
use crate::types::Conversation;

/// Destination for recorded conversations
#[async_trait]
pub trait ConversationSink: Send + Sync {
    /// Store one conversation
    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), SinkError>;
}

/// Runtime that drives sinks for callers outside any tokio runtime
static FALLBACK_RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn fallback_runtime() -> RecorderResult<&'static Runtime> {
    if let Some(runtime) = FALLBACK_RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| RecorderError::Internal(format!("could not start delivery runtime: {e}")))?;
    Ok(FALLBACK_RUNTIME.get_or_init(|| runtime))
}

/// Hands conversations to a sink.
///
/// Inside a tokio runtime delivery is spawned and tracked until
/// [`Dispatcher::flush`] sees it finish. Outside one, the sink runs to
/// completion on a shared fallback runtime before `dispatch` returns, so
/// I/O-bound sinks such as [`HttpSink`] work from blocking programs too.
#[derive(Clone)]
pub struct Dispatcher {
    sink: Option<Arc<dyn ConversationSink>>,
    in_flight: Arc<Mutex<TaskTracker>>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn ConversationSink>) -> Self {
        Self {
            sink: Some(sink),
            in_flight: Arc::new(Mutex::new(TaskTracker::new())),
        }
    }

    /// A dispatcher that drops everything
    pub fn disabled() -> Self {
        Self {
            sink: None,
            in_flight: Arc::new(Mutex::new(TaskTracker::new())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Deliver `conversation`. Sink errors and panics are logged, never
    /// returned; panics still pass through the panic hook, as with
    /// [`crate::isolation::isolate`].
    pub fn dispatch(&self, conversation: Conversation) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let delivery = deliver(sink, conversation);
        match Handle::try_current() {
            Ok(handle) => {
                self.tracker().spawn_on(delivery, &handle);
            }
            Err(_) => match fallback_runtime() {
                Ok(runtime) => runtime.block_on(delivery),
                Err(e) => tracing::warn!(error = %e, "could not store conversation"),
            },
        }
    }

    /// Wait until every conversation dispatched so far has been delivered.
    ///
    /// Spawned deliveries die with their runtime; call this before the
    /// runtime shuts down.
    pub async fn flush(&self) {
        let tracker = std::mem::replace(
            &mut *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner),
            TaskTracker::new(),
        );
        tracker.close();
        tracker.wait().await;
    }

    fn tracker(&self) -> TaskTracker {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("enabled", &self.is_enabled())
            .field("in_flight", &self.tracker().len())
            .finish()
    }
}

async fn deliver(sink: Arc<dyn ConversationSink>, conversation: Conversation) {
    let outcome = AssertUnwindSafe(sink.create_conversation(&conversation))
        .catch_unwind()
        .await;
    match outcome {
        Ok(Ok(())) => tracing::debug!(
            correlation_id = ?conversation.correlation_id,
            messages = conversation.messages().count(),
            "conversation stored"
        ),
        Ok(Err(e)) => tracing::warn!(
            error = %e,
            correlation_id = ?conversation.correlation_id,
            "could not store conversation"
        ),
        Err(payload) => tracing::warn!(
            panic_message = %panic_message(&payload),
            "conversation sink panicked"
        ),
    }
}
