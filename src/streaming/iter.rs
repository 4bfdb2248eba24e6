//! Synchronous wrapper

use std::fmt;

use super::{Reconstruction, StreamChunk};
use crate::sink::Dispatcher;
use crate::types::{Message, ProtocolFamily};

/// Iterator that records the stream it wraps.
///
/// Finalization happens when the upstream returns `None`. A caller that
/// stops iterating early never triggers it, so partially consumed
/// synchronous streams are not recorded.
pub struct RecordingIter<I> {
    inner: I,
    recording: Reconstruction,
}

impl<I> RecordingIter<I> {
    pub(crate) fn new(
        inner: I,
        family: ProtocolFamily,
        prompt: Vec<Message>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            inner,
            recording: Reconstruction::new(family, prompt, dispatcher),
        }
    }

    /// Whether the recorded conversation has already been handed off
    pub fn is_finalized(&self) -> bool {
        self.recording.is_finalized()
    }

    pub fn get_ref(&self) -> &I {
        &self.inner
    }
}

impl<I> Iterator for RecordingIter<I>
where
    I: Iterator,
    I::Item: StreamChunk,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next() {
            Some(item) => {
                self.recording.observe(&item);
                Some(item)
            }
            None => {
                self.recording.finalize();
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<I: fmt::Debug> fmt::Debug for RecordingIter<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingIter")
            .field("inner", &self.inner)
            .field("finalized", &self.recording.is_finalized())
            .finish()
    }
}
