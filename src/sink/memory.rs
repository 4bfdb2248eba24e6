//! In-memory sink

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::ConversationSink;
use crate::error::SinkError;
use crate::types::Conversation;

/// How long [`MemorySink::wait_for`] waits before giving up
const WAIT_LIMIT: Duration = Duration::from_secs(1);
const WAIT_STEP: Duration = Duration::from_millis(10);

/// Keeps conversations in memory. Useful in tests and for local debugging.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    conversations: Arc<Mutex<Vec<Conversation>>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every conversation
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Conversation>> {
        // a poisoned lock only means a reader panicked; the data is still usable
        self.conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of everything stored so far
    pub fn conversations(&self) -> Vec<Conversation> {
        self.lock().clone()
    }

    /// Wait until at least `count` conversations arrived, or about a second
    /// passed, and return what is stored.
    pub async fn wait_for(&self, count: usize) -> Vec<Conversation> {
        let mut waited = Duration::ZERO;
        while self.len() < count && waited < WAIT_LIMIT {
            tokio::time::sleep(WAIT_STEP).await;
            waited += WAIT_STEP;
        }
        self.conversations()
    }
}

#[async_trait]
impl ConversationSink for MemorySink {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Rejected("memory sink set to fail".into()));
        }
        self.lock().push(conversation.clone());
        Ok(())
    }
}
