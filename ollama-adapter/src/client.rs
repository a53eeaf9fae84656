use serde_json::Value;

use crate::error::OllamaError;
use crate::types::{
    ChatMessage, ChatOptions, ChatRequest, OllamaConfig, ServerInfo, VersionResponse,
    STRUCTURED_OUTPUT_MIN_VERSION,
};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaClient {
    /// Builds a client for `config.host`.
    ///
    /// # Errors
    /// Returns an error if the host is not an http(s) URL or the HTTP client
    /// cannot be built.
    pub fn new(config: OllamaConfig) -> Result<Self, OllamaError> {
        if !(config.host.starts_with("http://") || config.host.starts_with("https://")) {
            return Err(OllamaError::InvalidHost {
                host: config.host,
                reason: "expected an http:// or https:// URL".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub const fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Sends one user message and returns `message.content`.
    ///
    /// With `schema` set it is passed as `format`, asking the server for
    /// JSON matching it.
    ///
    /// # Errors
    /// Transport failures, non-success statuses, `{"error": ...}` bodies and
    /// responses without `message.content` are all errors.
    pub async fn chat(&self, prompt: &str, schema: Option<&Value>) -> Result<String, OllamaError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            stream: false,
            format: schema.cloned(),
            options: self
                .config
                .temperature
                .map(|temperature| ChatOptions { temperature }),
        };

        let url = self.config.endpoint("/api/chat");
        tracing::debug!(url = %url, model = %self.config.model, structured = schema.is_some(), "Sending chat request");

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let body = self.read_json(response).await?;
        content_of(&body)
    }

    /// Returns the server version from `GET /api/version`.
    ///
    /// # Errors
    /// Returns an error if the server is unreachable or the version does not parse.
    pub async fn version(&self) -> Result<semver::Version, OllamaError> {
        let response = self
            .http
            .get(self.config.endpoint("/api/version"))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let body = self.read_json(response).await?;
        let version: VersionResponse = serde_json::from_value(body)?;
        parse_version(&version.version)
    }

    /// Checks that the server answers and reports whether it supports
    /// schema-constrained output.
    ///
    /// # Errors
    /// Returns an error if the server is unreachable.
    pub async fn check_health(&self) -> Result<ServerInfo, OllamaError> {
        let version = self.version().await?;
        let structured_outputs = version >= STRUCTURED_OUTPUT_MIN_VERSION;
        if !structured_outputs {
            tracing::warn!(
                event = "ollama_version_old",
                version = %version,
                minimum = %STRUCTURED_OUTPUT_MIN_VERSION,
                "Ollama is too old for schema-constrained output; responses will be decoded leniently"
            );
        }
        Ok(ServerInfo {
            version,
            structured_outputs,
        })
    }

    fn classify(&self, error: reqwest::Error) -> OllamaError {
        if error.is_timeout() {
            OllamaError::Timeout(self.config.timeout)
        } else {
            OllamaError::Http(error)
        }
    }

    async fn read_json(&self, response: reqwest::Response) -> Result<Value, OllamaError> {
        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            let body = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            return Err(OllamaError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = serde_json::from_str(&text)?;
        if let Some(message) = body.get("error").and_then(Value::as_str) {
            return Err(OllamaError::Api(message.to_string()));
        }
        Ok(body)
    }
}

/// Pulls `message.content` out of a chat response body.
fn content_of(body: &Value) -> Result<String, OllamaError> {
    let message = body
        .get("message")
        .ok_or(OllamaError::MissingContent { field: "message" })?;
    message
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(OllamaError::MissingContent {
            field: "message.content",
        })
}

fn parse_version(raw: &str) -> Result<semver::Version, OllamaError> {
    let trimmed = raw.trim().trim_start_matches('v');
    semver::Version::parse(trimmed).map_err(|source| OllamaError::InvalidVersion {
        version: raw.to_string(),
        source,
    })
}
