//! Recorder entry points
//!
//! A [`Recorder`] sits between the application and an LLM client call. It
//! normalizes the prompt, runs the call, and records the outcome: extracted
//! output for plain responses, a wrapped iterator or stream for streamed
//! ones, and an error thread when the call fails. The call's own result is
//! always returned unchanged.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::Stream;
use serde::Serialize;
use serde_json::Value;

use crate::config::RecorderConfig;
use crate::extract::extract_response;
use crate::isolation::isolate;
use crate::prompt::normalize_prompt;
use crate::sanitize::{str_field, to_plain};
use crate::sink::{ConversationSink, Dispatcher, HttpSink};
use crate::streaming::{RecordingIter, RecordingStream, StreamChunk};
use crate::types::{Conversation, Message, ResourceDescriptor};

/// Records calls to instrumented endpoints
#[derive(Debug, Clone)]
pub struct Recorder {
    dispatcher: Dispatcher,
}

impl Recorder {
    /// Record into `sink`.
    ///
    /// Used inside a tokio runtime, conversations are delivered in the
    /// background; call [`Recorder::flush`] before the runtime shuts down.
    pub fn new(sink: Arc<dyn ConversationSink>) -> Self {
        Self {
            dispatcher: Dispatcher::new(sink),
        }
    }

    /// Record into the HTTP sink described by `config`.
    ///
    /// A disabled configuration yields a pass-through recorder and is not
    /// validated.
    pub fn from_config(config: &RecorderConfig) -> crate::error::Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let sink = HttpSink::from_config(config)?;
        tracing::debug!(?sink, "recording to HTTP sink");
        Ok(Self::new(Arc::new(sink)))
    }

    /// A recorder that forwards everything and stores nothing
    pub fn disabled() -> Self {
        Self {
            dispatcher: Dispatcher::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dispatcher.is_enabled()
    }

    /// Wait until every conversation recorded so far has reached the sink.
    pub async fn flush(&self) {
        self.dispatcher.flush().await;
    }

    /// Record a blocking, non-streamed call.
    pub fn record<T, E, F>(
        &self,
        descriptor: &ResourceDescriptor,
        params: &Value,
        call: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        T: Serialize,
        E: Display,
    {
        check_call_shape(descriptor, true);
        let prompt = self.prompt(descriptor, params);
        match call() {
            Ok(response) => {
                self.record_response(descriptor, prompt, &response);
                Ok(response)
            }
            Err(e) => {
                self.record_failure(descriptor, params, prompt, &e);
                Err(e)
            }
        }
    }

    /// Record an asynchronous, non-streamed call.
    pub async fn record_async<T, E, Fut>(
        &self,
        descriptor: &ResourceDescriptor,
        params: &Value,
        call: Fut,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        T: Serialize,
        E: Display,
    {
        check_call_shape(descriptor, false);
        let prompt = self.prompt(descriptor, params);
        match call.await {
            Ok(response) => {
                self.record_response(descriptor, prompt, &response);
                Ok(response)
            }
            Err(e) => {
                self.record_failure(descriptor, params, prompt, &e);
                Err(e)
            }
        }
    }

    /// Record a blocking call that returns a stream of chunks.
    ///
    /// The returned iterator yields the upstream chunks unchanged and records
    /// the reconstructed response once it is exhausted.
    pub fn record_stream<I, E, F>(
        &self,
        descriptor: &ResourceDescriptor,
        params: &Value,
        call: F,
    ) -> Result<RecordingIter<I::IntoIter>, E>
    where
        F: FnOnce() -> Result<I, E>,
        I: IntoIterator,
        I::Item: StreamChunk,
        E: Display,
    {
        check_call_shape(descriptor, true);
        let prompt = self.prompt(descriptor, params);
        match call() {
            Ok(chunks) => Ok(RecordingIter::new(
                chunks.into_iter(),
                descriptor.family,
                prompt,
                self.dispatcher.clone(),
            )),
            Err(e) => {
                self.record_failure(descriptor, params, prompt, &e);
                Err(e)
            }
        }
    }

    /// Record an asynchronous call that returns a stream of chunks.
    ///
    /// The reconstructed response is recorded when the stream ends or when
    /// [`RecordingStream::close`] is called.
    pub async fn record_stream_async<S, E, Fut>(
        &self,
        descriptor: &ResourceDescriptor,
        params: &Value,
        call: Fut,
    ) -> Result<RecordingStream<S>, E>
    where
        Fut: Future<Output = Result<S, E>>,
        S: Stream + Unpin,
        S::Item: StreamChunk,
        E: Display,
    {
        check_call_shape(descriptor, false);
        let prompt = self.prompt(descriptor, params);
        match call.await {
            Ok(stream) => Ok(RecordingStream::new(
                stream,
                descriptor.family,
                prompt,
                self.dispatcher.clone(),
            )),
            Err(e) => {
                self.record_failure(descriptor, params, prompt, &e);
                Err(e)
            }
        }
    }

    fn prompt(&self, descriptor: &ResourceDescriptor, params: &Value) -> Vec<Message> {
        if !self.is_enabled() {
            return Vec::new();
        }
        isolate("could not normalize prompt", || {
            Ok(normalize_prompt(descriptor.family, params))
        })
        .unwrap_or_default()
    }

    fn record_response<T: Serialize>(
        &self,
        descriptor: &ResourceDescriptor,
        prompt: Vec<Message>,
        response: &T,
    ) {
        if !self.is_enabled() {
            return;
        }
        let extraction = isolate("could not extract response", || {
            extract_response(descriptor.family, &to_plain(response))
        });
        if let Some(extraction) = extraction {
            self.dispatcher.dispatch(Conversation::completed(
                prompt,
                extraction.messages,
                extraction.correlation_id,
            ));
        }
    }

    fn record_failure<E: Display>(
        &self,
        descriptor: &ResourceDescriptor,
        params: &Value,
        prompt: Vec<Message>,
        error: &E,
    ) {
        tracing::warn!(endpoint = descriptor.name, error = %error, "instrumented call failed");
        if !self.is_enabled() {
            return;
        }
        let model = str_field(params, "model");
        self.dispatcher
            .dispatch(Conversation::failed(prompt, model, &error.to_string()));
    }
}

/// Log a descriptor whose call shape differs from the entry point's.
fn check_call_shape(descriptor: &ResourceDescriptor, synchronous: bool) {
    if descriptor.synchronous != synchronous {
        tracing::debug!(
            endpoint = descriptor.name,
            descriptor_synchronous = descriptor.synchronous,
            "descriptor call shape does not match the entry point"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CHAT_COMPLETIONS, lookup};
    use crate::sink::MemorySink;
    use crate::types::{MetadataValue, UPSTREAM_ERROR_KEY};
    use mockito::Matcher;
    use serde_json::json;
    use tracing_test::traced_test;

    fn chat() -> &'static ResourceDescriptor {
        lookup(CHAT_COMPLETIONS, true).unwrap()
    }

    fn params() -> Value {
        json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "Say hi"}]})
    }

    fn response() -> Value {
        json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi"}}]
        })
    }

    fn thread_mock(server: &mut mockito::Server) -> mockito::Mock {
        server
            .mock("POST", "/api/external/threads")
            .match_query(Matcher::UrlEncoded("apiKey".into(), "k".into()))
            .match_body(Matcher::PartialJson(json!({
                "externalId": "chatcmpl-1",
                "projectId": 1,
                "messages": [
                    {"role": "User", "content": "Say hi"},
                    {"role": "Assistant", "content": "Hi"}
                ]
            })))
            .with_status(200)
            .create()
    }

    fn http_recorder(server: &mockito::Server) -> Recorder {
        Recorder::new(Arc::new(HttpSink::new(server.url(), "k").with_project_id(1)))
    }

    #[test]
    fn records_successful_call() {
        let sink = Arc::new(MemorySink::new());
        let recorder = Recorder::new(sink.clone());

        let out: Result<Value, String> = recorder.record(chat(), &params(), || Ok(response()));
        assert_eq!(out, Ok(response()));

        let recorded = sink.conversations();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].input_messages[0].content.as_deref(), Some("Say hi"));
        assert_eq!(recorded[0].output_messages[0].content.as_deref(), Some("Hi"));
        assert_eq!(recorded[0].correlation_id.as_deref(), Some("chatcmpl-1"));
    }

    #[test]
    fn failed_call_records_error_thread_and_returns_error() {
        let sink = Arc::new(MemorySink::new());
        let recorder = Recorder::new(sink.clone());

        let out: Result<Value, String> =
            recorder.record(chat(), &params(), || Err("rate limited".to_string()));
        assert_eq!(out, Err("rate limited".to_string()));

        let recorded = sink.conversations();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].is_error());
        assert_eq!(
            recorded[0].metadata.get(UPSTREAM_ERROR_KEY),
            Some(&MetadataValue::from("rate limited"))
        );
        assert_eq!(recorded[0].metadata.get("model"), Some(&MetadataValue::from("gpt-4o")));
        assert_eq!(recorded[0].input_messages.len(), 1);
    }

    #[test]
    fn unextractable_response_is_not_recorded() {
        let sink = Arc::new(MemorySink::new());
        let recorder = Recorder::new(sink.clone());

        let out: Result<Vec<u8>, String> = recorder.record(chat(), &params(), || Ok(vec![1, 2]));
        assert_eq!(out, Ok(vec![1, 2]));
        assert!(sink.is_empty());
    }

    #[test]
    fn disabled_recorder_passes_through() {
        let recorder = Recorder::disabled();
        assert!(!recorder.is_enabled());
        let out: Result<u8, String> = recorder.record(chat(), &params(), || Ok(3));
        assert_eq!(out, Ok(3));

        let config = RecorderConfig::builder().enabled(false).build();
        assert!(!Recorder::from_config(&config).unwrap().is_enabled());
    }

    #[test]
    fn enabled_config_must_be_valid() {
        let config = RecorderConfig::builder().api_key("k").build();
        assert!(Recorder::from_config(&config).is_err());
    }

    #[test]
    fn blocking_call_reaches_http_sink_without_a_runtime() {
        let mut server = mockito::Server::new();
        let mock = thread_mock(&mut server);

        let out: Result<Value, String> =
            http_recorder(&server).record(chat(), &params(), || Ok(response()));
        assert_eq!(out, Ok(response()));
        mock.assert();
    }

    #[test]
    fn flush_delivers_before_the_runtime_shuts_down() {
        let mut server = mockito::Server::new();
        let mock = thread_mock(&mut server);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let recorder = http_recorder(&server);
            let descriptor = lookup(CHAT_COMPLETIONS, false).unwrap();
            let out: Result<Value, String> = recorder
                .record_async(descriptor, &params(), async { Ok(response()) })
                .await;
            assert!(out.is_ok());
            recorder.flush().await;
        });
        drop(runtime);
        mock.assert();
    }

    #[traced_test]
    #[test]
    fn mismatched_call_shape_is_logged_and_still_recorded() {
        let sink = Arc::new(MemorySink::new());
        let recorder = Recorder::new(sink.clone());
        let async_chat = lookup(CHAT_COMPLETIONS, false).unwrap();

        let out: Result<Value, String> = recorder.record(async_chat, &params(), || Ok(response()));
        assert!(out.is_ok());
        assert_eq!(sink.len(), 1);
        assert!(logs_contain("descriptor call shape does not match the entry point"));
    }
}
