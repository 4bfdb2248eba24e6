//! Recorder configuration

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::{RecorderError, Result};
use crate::sink::DEFAULT_BASE_URL;

pub const ENV_API_KEY: &str = "SIUMAI_RECORDER_API_KEY";
pub const ENV_BASE_URL: &str = "SIUMAI_RECORDER_BASE_URL";
pub const ENV_PROJECT_ID: &str = "SIUMAI_RECORDER_PROJECT_ID";
pub const ENV_PROJECT_NAME: &str = "SIUMAI_RECORDER_PROJECT_NAME";
pub const ENV_ENABLED: &str = "SIUMAI_RECORDER_ENABLED";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and whether conversations are recorded
#[derive(Clone)]
pub struct RecorderConfig {
    /// When `false` calls and streams pass through untouched and nothing is stored
    pub enabled: bool,

    /// Conversation service base URL
    pub base_url: String,

    pub api_key: Option<SecretString>,

    /// Project the threads belong to; either this or `project_name` is required
    pub project_id: Option<i64>,

    pub project_name: Option<String>,

    /// Per-request timeout of the HTTP sink
    pub timeout: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            project_id: None,
            project_name: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RecorderConfig {
    /// Create a new builder
    pub fn builder() -> RecorderConfigBuilder {
        RecorderConfigBuilder::default()
    }

    /// Read the configuration from `SIUMAI_RECORDER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = Self::default();
        if let Some(enabled) = var(ENV_ENABLED) {
            config.enabled = parse_flag(&enabled).ok_or_else(|| {
                RecorderError::Configuration(format!("{ENV_ENABLED} is not a boolean: {enabled}"))
            })?;
        }
        if let Some(base_url) = var(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        config.api_key = var(ENV_API_KEY).map(SecretString::from);
        if let Some(project_id) = var(ENV_PROJECT_ID) {
            config.project_id = Some(project_id.parse().map_err(|_| {
                RecorderError::Configuration(format!("{ENV_PROJECT_ID} is not an integer: {project_id}"))
            })?);
        }
        config.project_name = var(ENV_PROJECT_NAME);
        Ok(config)
    }

    /// Check the configuration is usable by the HTTP sink.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_none() {
            return Err(RecorderError::Configuration("API key is required".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(RecorderError::Configuration("base URL is required".into()));
        }
        if self.project_id.is_none() && self.project_name.is_none() {
            return Err(RecorderError::Configuration(
                "either a project id or a project name is required".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for RecorderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("project_id", &self.project_id)
            .field("project_name", &self.project_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for [`RecorderConfig`]
#[derive(Debug, Clone, Default)]
pub struct RecorderConfigBuilder {
    config: RecorderConfig,
}

impl RecorderConfigBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn project_id(mut self, project_id: i64) -> Self {
        self.config.project_id = Some(project_id);
        self
    }

    pub fn project_name(mut self, project_name: impl Into<String>) -> Self {
        self.config.project_name = Some(project_name.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> RecorderConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = RecorderConfig::default();
        assert!(config.enabled);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_sets_fields() {
        let config = RecorderConfig::builder()
            .api_key("k")
            .project_name("demo")
            .base_url("http://localhost:3000")
            .timeout(Duration::from_secs(2))
            .build();
        assert!(config.validate().is_ok());
        assert_eq!(config.api_key.as_ref().map(|k| k.expose_secret()), Some("k"));
        assert_eq!(config.base_url, "http://localhost:3000");
    }

    #[test]
    fn validation_requires_a_project() {
        let err = RecorderConfig::builder().api_key("k").build().validate().unwrap_err();
        assert!(err.to_string().contains("project"));

        let err = RecorderConfig::builder()
            .project_id(1)
            .build()
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("API key"));

        let err = RecorderConfig::builder()
            .api_key("k")
            .project_id(1)
            .base_url(" ")
            .build()
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("base URL"));
    }

    #[test]
    fn reads_environment() {
        let config = RecorderConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "secret"),
            (ENV_PROJECT_ID, "42"),
            (ENV_ENABLED, "off"),
            (ENV_PROJECT_NAME, ""),
        ]))
        .unwrap();
        assert!(!config.enabled);
        assert_eq!(config.project_id, Some(42));
        assert_eq!(config.project_name, None);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_malformed_environment() {
        assert!(RecorderConfig::from_lookup(lookup(&[(ENV_PROJECT_ID, "abc")])).is_err());
        assert!(RecorderConfig::from_lookup(lookup(&[(ENV_ENABLED, "maybe")])).is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = RecorderConfig::builder().api_key("hunter2").build();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
