use async_trait::async_trait;
use bytes::Bytes;
use chatrelay_common::Result;
use serde::{Deserialize, Serialize};

/// Client for one credential of an OpenAI-compatible API.
///
/// Every slot in a [`ClientPool`](crate::pool::ClientPool) is bound to one of
/// these; implementations are interchangeable at the credential level.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier used in logs (e.g. "openai").
    fn provider_id(&self) -> &str;

    /// Send a chat completion request and return the response.
    ///
    /// A quota or frequency refusal must be reported as
    /// [`Error::RateLimited`](chatrelay_common::Error::RateLimited) so the
    /// caller can rotate credentials.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Generate one image and return its URL.
    async fn generate_image(&self, request: &ImageRequest) -> Result<String>;

    /// Transcribe an audio file and return the text.
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String>;

    /// Check if the provider is reachable with this credential.
    async fn health_check(&self) -> Result<bool>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// One role-tagged message, serialized exactly as the chat completions API
/// expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
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

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: String,
    pub usage: Option<Usage>,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    /// Identity of the requester, forwarded for upstream abuse monitoring.
    pub user: String,
    pub size: String,
}

#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub file_name: String,
    pub audio: Bytes,
    pub model: String,
}
