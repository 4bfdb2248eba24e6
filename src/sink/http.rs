//! HTTP thread sink
//!
//! Stores each conversation as a thread: `POST {base_url}/api/external/threads`
//! with the API key as the `apiKey` query parameter.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;

use super::ConversationSink;
use crate::config::RecorderConfig;
use crate::error::{RecorderError, Result, SinkError};
use crate::types::{Conversation, Message, Metadata};

/// Base URL used when none is configured
pub const DEFAULT_BASE_URL: &str = "https://app.melodi.fyi";

const THREADS_PATH: &str = "/api/external/threads";

/// Sink that posts threads to the conversation service
pub struct HttpSink {
    client: Client,
    base_url: String,
    api_key: SecretString,
    project_id: Option<i64>,
    project_name: Option<String>,
}

impl HttpSink {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: SecretString::from(api_key.into()),
            project_id: None,
            project_name: None,
        }
    }

    /// Build a sink from a validated configuration
    pub fn from_config(config: &RecorderConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| RecorderError::Configuration("API key is required".into()))?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RecorderError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: api_key.clone(),
            project_id: config.project_id,
            project_name: config.project_name.clone(),
        })
    }

    pub fn with_project_id(mut self, project_id: i64) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_project_name(mut self, project_name: impl Into<String>) -> Self {
        self.project_name = Some(project_name.into());
        self
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}{}?apiKey={}",
            self.base_url.trim_end_matches('/'),
            THREADS_PATH,
            urlencoding::encode(self.api_key.expose_secret())
        )
    }

    fn payload<'a>(&'a self, conversation: &'a Conversation) -> ThreadPayload<'a> {
        ThreadPayload {
            external_id: conversation.correlation_id.as_deref(),
            project_id: self.project_id,
            project_name: self.project_name.as_deref(),
            messages: conversation.messages().collect(),
            metadata: &conversation.metadata,
        }
    }
}

impl std::fmt::Debug for HttpSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSink")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("project_name", &self.project_name)
            .finish()
    }
}

#[async_trait]
impl ConversationSink for HttpSink {
    async fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> std::result::Result<(), SinkError> {
        if self.project_id.is_none() && self.project_name.is_none() {
            return Err(SinkError::Configuration(
                "projectId or projectName is required".into(),
            ));
        }
        let response = self
            .client
            .post(self.endpoint())
            .json(&self.payload(conversation))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST {
            log_bad_request(&body);
        }
        Err(SinkError::Api {
            status: status.as_u16(),
            message: body,
        })
    }
}

/// Log each entry of a 400 body's `errors` array, or the whole body.
fn log_bad_request(body: &str) {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return;
    };
    match parsed.get("errors").and_then(Value::as_array) {
        Some(errors) => {
            for error in errors {
                tracing::warn!(%error, "thread rejected by conversation service");
            }
        }
        None => tracing::warn!(error = %parsed, "thread rejected by conversation service"),
    }
}

/// Wire body of a thread
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreadPayload<'a> {
    external_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_name: Option<&'a str>,
    messages: Vec<&'a Message>,
    metadata: &'a Metadata,
}
