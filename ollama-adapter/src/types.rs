use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// First Ollama release accepting a JSON schema in `format`.
pub const STRUCTURED_OUTPUT_MIN_VERSION: semver::Version = semver::Version::new(0, 5, 0);

#[derive(Debug, Clone, PartialEq)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server.
    pub host: String,
    pub model: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Sampling temperature; `None` keeps the model default.
    pub temperature: Option<f32>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            temperature: None,
        }
    }
}

impl OllamaConfig {
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// `host` joined with `path`, tolerating a trailing slash on the host.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.host.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatOptions {
    pub temperature: f32,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ChatOptions>,
}

/// Body of `GET /api/version`.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}

/// Result of [`crate::OllamaClient::check_health`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub version: semver::Version,
    /// Whether the server honours a JSON schema in `format`.
    pub structured_outputs: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_cleanly() {
        let config = OllamaConfig::default().with_host("http://gpu-box:11434/");
        assert_eq!(config.endpoint("/api/chat"), "http://gpu-box:11434/api/chat");
        assert_eq!(
            OllamaConfig::default().endpoint("api/version"),
            "http://localhost:11434/api/version"
        );
    }

    #[test]
    fn test_chat_request_omits_unset_fields() {
        let request = ChatRequest {
            model: DEFAULT_MODEL.to_string(),
            messages: vec![ChatMessage::user("hi")],
            stream: false,
            format: None,
            options: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("format").is_none());
        assert!(json.get("options").is_none());
    }
}
