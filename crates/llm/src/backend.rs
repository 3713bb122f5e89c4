//! Ollama chat backend
//!
//! Every request asks for a JSON object (`format: "json"`) and is
//! non-streaming: the semantic helpers need one parsed object per call, not
//! tokens.

use std::time::Duration;

use farmhand_config::SemanticConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::prompt::Message;
use crate::LlmError;

/// Backend configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    /// API endpoint
    pub endpoint: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff, doubled each retry
    pub initial_backoff: Duration,
    /// Low by default; classification should be repeatable
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    /// How long Ollama keeps the model loaded between calls
    pub keep_alive: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "qwen2.5:3b-instruct".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(4),
            max_retries: 1,
            initial_backoff: Duration::from_millis(100),
            temperature: 0.1,
            max_tokens: 200,
            keep_alive: "5m".to_string(),
        }
    }
}

impl From<&SemanticConfig> for LlmConfig {
    fn from(config: &SemanticConfig) -> Self {
        Self {
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            max_retries: config.max_retries,
            ..Self::default()
        }
    }
}

/// Ollama `/api/chat` client
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: Client,
    config: LlmConfig,
}

impl OllamaBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.endpoint, path)
    }

    /// Send `messages` and parse the reply content as a JSON value
    pub async fn chat_json(&self, messages: &[Message]) -> Result<serde_json::Value, LlmError> {
        let request = OllamaChatRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(OllamaMessage::from).collect(),
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens as i32,
            },
            keep_alive: self.config.keep_alive.clone(),
        };

        let start = std::time::Instant::now();
        let mut last_error = None;
        let mut backoff = self.config.initial_backoff;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    "LLM request failed, retrying in {:?} (attempt {}/{})",
                    backoff,
                    attempt,
                    self.config.max_retries
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute_request(&request).await {
                Ok(response) => {
                    tracing::debug!(
                        model = %self.config.model,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        eval_count = response.eval_count.unwrap_or(0),
                        "LLM response received"
                    );
                    return parse_json_content(&response.message.content);
                }
                Err(e) if Self::is_retryable(&e) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Network("Max retries exceeded".to_string())))
    }

    async fn execute_request(&self, request: &OllamaChatRequest) -> Result<OllamaChatResponse, LlmError> {
        let response = self.client.post(self.api_url("/chat")).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::NOT_FOUND && error.contains("model") {
                return Err(LlmError::ModelNotFound(self.config.model.clone()));
            }
            // 5xx errors are retryable, 4xx are not
            if status.is_server_error() {
                return Err(LlmError::Network(format!("Server error {}: {}", status, error)));
            }
            return Err(LlmError::Api(error));
        }

        response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }

    fn is_retryable(error: &LlmError) -> bool {
        matches!(error, LlmError::Network(_) | LlmError::Timeout)
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Parse the assistant content as a JSON object.
///
/// Small models sometimes wrap the object in prose or code fences even in
/// JSON mode; the outermost `{...}` span is tried before giving up.
pub(crate) fn parse_json_content(content: &str) -> Result<serde_json::Value, LlmError> {
    let trimmed = content.trim();
    if let Ok(value @ serde_json::Value::Object(_)) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return Ok(value);
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&trimmed[start..=end])
            .map_err(|e| LlmError::InvalidResponse(format!("not a JSON object: {}", e))),
        _ => Err(LlmError::InvalidResponse(format!(
            "no JSON object in response: {:.80}",
            trimmed
        ))),
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
    keep_alive: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

impl From<&Message> for OllamaMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.to_string(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: i32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let settings = SemanticConfig {
            enabled: true,
            endpoint: "http://ollama:11434/".to_string(),
            model: "llama3.2:3b".to_string(),
            timeout_ms: 1500,
            max_retries: 2,
        };
        let config = LlmConfig::from(&settings);

        assert_eq!(config.endpoint, "http://ollama:11434");
        assert_eq!(config.model, "llama3.2:3b");
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_api_url() {
        let backend = OllamaBackend::new(LlmConfig::default()).unwrap();
        assert_eq!(backend.api_url("/chat"), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_request_asks_for_json() {
        let request = OllamaChatRequest {
            model: "test".to_string(),
            messages: vec![OllamaMessage::from(&Message::user("bonjour"))],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: 0.1,
                num_predict: 200,
            },
            keep_alive: "5m".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["format"], "json");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_parse_json_content() {
        let value = parse_json_content(r#"{"intent": "create_sale", "confidence": 0.9}"#).unwrap();
        assert_eq!(value["intent"], "create_sale");

        let fenced = "```json\n{\"intent\": \"get_statistics\"}\n```";
        assert_eq!(parse_json_content(fenced).unwrap()["intent"], "get_statistics");

        assert!(matches!(
            parse_json_content("I am not sure"),
            Err(LlmError::InvalidResponse(_))
        ));
        assert!(parse_json_content("[1, 2]").is_err());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(OllamaBackend::is_retryable(&LlmError::Timeout));
        assert!(OllamaBackend::is_retryable(&LlmError::Network("reset".into())));
        assert!(!OllamaBackend::is_retryable(&LlmError::Api("bad request".into())));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_retryably() {
        let backend = OllamaBackend::new(LlmConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_millis(200),
            max_retries: 0,
            ..LlmConfig::default()
        })
        .unwrap();

        let err = backend.chat_json(&[]).await.unwrap_err();
        assert!(OllamaBackend::is_retryable(&err), "{:?}", err);
    }
}
