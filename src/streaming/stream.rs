//! Asynchronous wrapper

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use futures::stream::FusedStream;

use super::{Reconstruction, StreamChunk};
use crate::sink::Dispatcher;
use crate::types::{Message, ProtocolFamily};

/// Stream that records the stream it wraps.
///
/// Finalization happens when the upstream ends, or when [`close`] is called.
/// `close` is the only way to record a stream the caller stops reading early;
/// dropping the wrapper records nothing.
///
/// [`close`]: RecordingStream::close
pub struct RecordingStream<S> {
    inner: Option<S>,
    recording: Reconstruction,
}

impl<S> RecordingStream<S> {
    pub(crate) fn new(
        inner: S,
        family: ProtocolFamily,
        prompt: Vec<Message>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            inner: Some(inner),
            recording: Reconstruction::new(family, prompt, dispatcher),
        }
    }

    /// Drop the upstream and record whatever was accumulated so far.
    ///
    /// Later polls return `None`. Calling `close` again, or after the stream
    /// already ended, does nothing.
    pub fn close(&mut self) {
        self.inner = None;
        self.recording.finalize();
    }

    /// Close every stream in `streams`.
    pub fn close_all<'a>(streams: impl IntoIterator<Item = &'a mut Self>)
    where
        S: 'a,
    {
        for stream in streams {
            stream.close();
        }
    }

    /// Whether the recorded conversation has already been handed off
    pub fn is_finalized(&self) -> bool {
        self.recording.is_finalized()
    }
}

impl<S> Stream for RecordingStream<S>
where
    S: Stream + Unpin,
    S::Item: StreamChunk,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match Pin::new(inner).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                this.recording.observe(&item);
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                this.inner = None;
                this.recording.finalize();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            Some(inner) => inner.size_hint(),
            None => (0, Some(0)),
        }
    }
}

impl<S> FusedStream for RecordingStream<S>
where
    S: Stream + Unpin,
    S::Item: StreamChunk,
{
    fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }
}

impl<S: fmt::Debug> fmt::Debug for RecordingStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingStream")
            .field("inner", &self.inner)
            .field("finalized", &self.recording.is_finalized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use futures::StreamExt;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    fn chunk(content: &str) -> Value {
        json!({"id": "chatcmpl-S", "choices": [{"index": 0, "delta": {"content": content}}]})
    }

    #[tokio::test]
    async fn close_records_partial_stream_once() {
        let sink = Arc::new(MemorySink::new());
        let upstream = futures::stream::iter(vec![chunk("Hel"), chunk("lo"), chunk(" there")]);
        let mut stream = RecordingStream::new(
            upstream,
            ProtocolFamily::Chat,
            Vec::new(),
            Dispatcher::new(sink.clone()),
        );

        assert_eq!(stream.next().await, Some(chunk("Hel")));
        assert_eq!(stream.next().await, Some(chunk("lo")));
        stream.close();
        stream.close();
        assert!(stream.is_terminated());
        assert_eq!(stream.next().await, None);

        let recorded = sink.wait_for(1).await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].output_messages[0].content.as_deref(), Some("Hello"));
        assert_eq!(recorded[0].correlation_id.as_deref(), Some("chatcmpl-S"));
    }

    #[test]
    fn pending_upstream_is_passed_through() {
        let sink = Arc::new(MemorySink::new());
        let (tx, rx) = futures::channel::mpsc::unbounded::<Value>();
        let mut stream = task::spawn(RecordingStream::new(
            rx,
            ProtocolFamily::Chat,
            Vec::new(),
            Dispatcher::new(sink.clone()),
        ));

        assert_pending!(stream.poll_next());
        tx.unbounded_send(chunk("a")).unwrap();
        assert!(stream.is_woken());
        assert_ready_eq!(stream.poll_next(), Some(chunk("a")));
        drop(tx);
        assert_ready_eq!(stream.poll_next(), None);
        // no runtime here, so the sink ran inline
        assert_eq!(sink.len(), 1);
    }
}
