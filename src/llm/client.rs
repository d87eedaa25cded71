//! Chat client for the generation backend (Ollama chat API).

use crate::otel::llm_span;
use crate::types::{NlqError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, Instrument};

/// Default timeout for one chat call.
pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// System instruction.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Assistant turn (few-shot answers).
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Backend-agnostic chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model identifier understood by the backend
    pub model: String,

    /// Ordered conversation (system prompt, few-shots, final user turn)
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature
    pub temperature: f32,
}

/// Generation backend seam.
///
/// Implementations return the assistant reply text, trimmed. An empty reply
/// is not an error at this level; callers decide what empty means.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send a chat request and return the assistant reply.
    ///
    /// # Errors
    ///
    /// Returns `NlqError::BackendUnavailable` if the backend cannot be reached
    /// or answers with a non-success status
    async fn chat(&self, request: &ChatRequest) -> Result<String>;
}

/// Ollama `/api/chat` request body.
#[derive(Debug, Serialize)]
struct OllamaChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama `/api/chat` response (non-streaming).
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

/// Ollama chat client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    /// Create new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Backend root, e.g. `http://host.docker.internal:11434`
    /// * `timeout` - Per-call timeout
    ///
    /// # Errors
    ///
    /// Returns `NlqError::HttpError` if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Backend root URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let span = llm_span(&request.model, request.temperature);
        let body = OllamaChatBody {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        async {
            debug!(model = %request.model, messages = request.messages.len(), "Sending chat request");

            let response = self
                .client
                .post(self.chat_url())
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    error!(error = %e, "Ollama chat failed");
                    NlqError::backend(format!("Ollama request failed: {}", e))
                })?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| NlqError::backend(format!("Failed to read Ollama response: {}", e)))?;

            if !status.is_success() {
                error!(%status, body = %text, "Ollama error");
                return Err(NlqError::backend(format!("Ollama API error {}", status)));
            }

            let parsed: OllamaChatResponse = serde_json::from_str(&text)?;
            let content = parsed
                .message
                .map(|m| m.content.trim().to_string())
                .unwrap_or_default();

            tracing::Span::current().record("gen_ai.response.length", content.len());
            Ok(content)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "llama3.2:latest".into(),
            messages: vec![
                ChatMessage::system("You are a translation engine."),
                ChatMessage::user("monitörler nerede"),
            ],
            temperature: 0.1,
        }
    }

    #[test]
    fn test_message_serialization() {
        let value = serde_json::to_value(ChatMessage::assistant("ok")).unwrap();
        assert_eq!(value, json!({"role": "assistant", "content": "ok"}));
    }

    #[tokio::test]
    async fn test_chat_posts_ollama_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama3.2:latest",
                "stream": false,
                "messages": [
                    {"role": "system", "content": "You are a translation engine."},
                    {"role": "user", "content": "monitörler nerede"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2:latest",
                "message": {"role": "assistant", "content": "  Where are the monitors?\n"},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri(), DEFAULT_CHAT_TIMEOUT).unwrap();
        let reply = client.chat(&request()).await.unwrap();
        assert_eq!(reply, "Where are the monitors?");
    }

    #[tokio::test]
    async fn test_missing_message_is_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
            .mount(&server)
            .await;

        let client = OllamaClient::new(format!("{}/", server.uri()), DEFAULT_CHAT_TIMEOUT).unwrap();
        assert_eq!(client.chat(&request()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_error_status_is_backend_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri(), DEFAULT_CHAT_TIMEOUT).unwrap();
        let err = client.chat(&request()).await.unwrap_err();
        assert!(matches!(err, NlqError::BackendUnavailable(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_slow_reply_times_out_as_backend_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"message": {"role": "assistant", "content": "late"}}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = OllamaClient::new(server.uri(), Duration::from_millis(200)).unwrap();
        let err = client.chat(&request()).await.unwrap_err();
        assert!(matches!(err, NlqError::BackendUnavailable(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let client = OllamaClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.chat(&request()).await.unwrap_err();
        assert!(matches!(err, NlqError::BackendUnavailable(_)));
    }
}
