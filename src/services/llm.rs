/// Hosted chat-completion client
///
/// The [`ChatClient`] trait is the seam between recommendation logic and the
/// provider, so prompts and validation can be exercised without network access.
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A single completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Ask the provider to constrain output to a JSON object
    pub json_response: bool,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
    }

    pub fn user_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {message}")]
    Transport { message: String, connect: bool },

    #[error("provider returned an empty completion")]
    EmptyCompletion,
}

impl LlmError {
    /// Maps provider failures onto the user-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Status { status: 429, .. } => ErrorKind::RateLimited,
            LlmError::Status {
                status: 401 | 403, ..
            } => ErrorKind::AuthFailed,
            LlmError::Status { .. } => ErrorKind::Unknown,
            LlmError::Transport { connect: true, .. } => ErrorKind::Offline,
            LlmError::Transport { .. } => ErrorKind::Unknown,
            LlmError::EmptyCompletion => ErrorKind::InvalidResponse,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Transport {
            connect: err.is_connect() || err.is_timeout(),
            message: err.to_string(),
        }
    }
}

/// Trait for chat-completion providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync {
    /// Returns the text of the first completion choice
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client
#[derive(Clone)]
pub struct OpenAiClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            model,
        }
    }

    fn request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if request.json_response {
            body["response_format"] = json!({ "type": "json_object" });
        }

        body
    }
}

#[async_trait::async_trait]
impl ChatClient for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(&request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = %status,
                provider = self.name(),
                "Chat completion request failed"
            );
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyCompletion)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(
            "sk-test".to_string(),
            "http://test.local/v1".to_string(),
            "gpt-4o-mini".to_string(),
        )
    }

    #[test]
    fn test_error_kind_mapping() {
        let status = |code| LlmError::Status {
            status: code,
            body: String::new(),
        };

        assert_eq!(status(429).kind(), ErrorKind::RateLimited);
        assert_eq!(status(401).kind(), ErrorKind::AuthFailed);
        assert_eq!(status(403).kind(), ErrorKind::AuthFailed);
        assert_eq!(status(500).kind(), ErrorKind::Unknown);
        assert_eq!(LlmError::EmptyCompletion.kind(), ErrorKind::InvalidResponse);
        assert_eq!(
            LlmError::Transport {
                message: "refused".to_string(),
                connect: true
            }
            .kind(),
            ErrorKind::Offline
        );
    }

    #[test]
    fn test_request_body_requests_json_object() {
        let request = ChatRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            json_response: true,
            temperature: Some(0.7),
        };

        let body = client().request_body(&request);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_request_body_without_json_mode() {
        let request = ChatRequest {
            messages: vec![ChatMessage::user("hi")],
            json_response: false,
            temperature: None,
        };

        let body = client().request_body(&request);
        assert!(body.get("response_format").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_completion_response_deserialization() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "{\"recommendations\": []}"}}]}"#;
        let response: CompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.choices[0].message.content.as_deref(),
            Some(r#"{"recommendations": []}"#)
        );
    }

    #[test]
    fn test_prompt_accessors() {
        let request = ChatRequest {
            messages: vec![ChatMessage::system("persona"), ChatMessage::user("ask")],
            json_response: true,
            temperature: None,
        };
        assert_eq!(request.system_prompt(), Some("persona"));
        assert_eq!(request.user_prompt(), Some("ask"));
    }
}
