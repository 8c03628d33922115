use crate::providers::{
    ChatMessage, ImageRequest, LlmProvider, LlmRequest, LlmResponse, TranscriptionRequest, Usage,
};
use async_trait::async_trait;
use chatrelay_common::{Error, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: normalize_base_url(base_url),
        }
    }

    /// Build a provider whose HTTP calls give up after `timeout`.
    pub fn with_timeout(api_key: String, base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}

fn normalize_base_url(base_url: Option<String>) -> String {
    base_url
        .filter(|u| !u.trim().is_empty())
        .map(|u| u.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let openai_request = OpenAiRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            "sending chat completion: model={}, messages={}",
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("OpenAI request failed: {e}")))?;

        let response = check_status(response).await?;

        let openai_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| Error::Agent(format!("Failed to parse OpenAI response: {e}")))?;

        convert_response(openai_response)
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<String> {
        let url = format!("{}/images/generations", self.base_url);
        let body = OpenAiImageRequest {
            prompt: &request.prompt,
            n: 1,
            size: &request.size,
            response_format: "url",
            user: &request.user,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("OpenAI image request failed: {e}")))?;

        let response = check_status(response).await?;

        let image_response: OpenAiImageResponse = response
            .json()
            .await
            .map_err(|e| Error::Agent(format!("Failed to parse image response: {e}")))?;

        image_response
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| Error::Agent("No image URL in response".to_string()))
    }

    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        let part = Part::stream(request.audio.clone()).file_name(request.file_name.clone());
        let form = Form::new()
            .text("model", request.model.clone())
            .part("file", part);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("OpenAI transcription request failed: {e}")))?;

        let response = check_status(response).await?;

        let transcription: OpenAiTranscription = response
            .json()
            .await
            .map_err(|e| Error::Agent(format!("Failed to parse transcription response: {e}")))?;

        Ok(transcription.text)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

/// Map a non-success status to the error taxonomy. 429 is the only status
/// that counts as rate limiting.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let status_text = status
            .canonical_reason()
            .unwrap_or("Too Many Requests")
            .to_string();
        return Err(Error::RateLimited { status_text });
    }

    let error_text = response.text().await.unwrap_or_default();
    Err(Error::Upstream {
        status: status.as_u16(),
        message: error_text,
    })
}

fn convert_response(response: OpenAiResponse) -> Result<LlmResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Agent("No choices in response".to_string()))?;

    Ok(LlmResponse {
        text: choice.message.content.unwrap_or_default(),
        model: response.model,
        usage: response.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
        stop_reason: choice.finish_reason,
    })
}

// Request Types
#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct OpenAiImageRequest<'a> {
    prompt: &'a str,
    n: u32,
    size: &'a str,
    response_format: &'a str,
    user: &'a str,
}

// Response Types
#[derive(Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiImageResponse {
    data: Vec<OpenAiImageData>,
}

#[derive(Deserialize)]
struct OpenAiImageData {
    url: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiTranscription {
    text: String,
}
