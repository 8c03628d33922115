use std::sync::Arc;

use bytes::Bytes;
use chatrelay_common::{Error, Result};
use tracing::{debug, info, instrument, warn};

use crate::context::{ConversationStore, Turn};
use crate::pool::ClientPool;
use crate::providers::{ChatMessage, ImageRequest, LlmRequest, TranscriptionRequest};
use crate::rate_limit::RateLimitTracker;

pub const EMPTY_REPLY_MESSAGE: &str = "Sorry, please try again later.";
pub const UPSTREAM_ERROR_MESSAGE: &str = "OpenAI API error";
pub const TRANSPORT_ERROR_MESSAGE: &str = "Request failed, please try again later.";
pub const IMAGE_FAILED_MESSAGE: &str = "Generate image failed";
pub const TRANSCRIPTION_FAILED_MESSAGE: &str = "Speech to text failed";

/// Request parameters shared by every completion call.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub image_size: String,
    pub transcription_model: String,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: Some(0.6),
            max_tokens: None,
            image_size: "512x512".to_string(),
            transcription_model: "whisper-1".to_string(),
        }
    }
}

/// Answers chat messages with conversation context, rotating credentials
/// while the pool is rate-limited.
pub struct CompletionService {
    store: Arc<ConversationStore>,
    pool: Arc<ClientPool>,
    tracker: Arc<RateLimitTracker>,
    settings: CompletionSettings,
}

impl CompletionService {
    pub fn new(
        store: Arc<ConversationStore>,
        pool: Arc<ClientPool>,
        tracker: Arc<RateLimitTracker>,
        settings: CompletionSettings,
    ) -> Self {
        debug_assert_eq!(
            tracker.pool_size(),
            pool.size(),
            "rate-limit tracker must be sized to the credential pool"
        );
        Self {
            store,
            pool,
            tracker,
            settings,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn pool(&self) -> &ClientPool {
        &self.pool
    }

    pub fn tracker(&self) -> &RateLimitTracker {
        &self.tracker
    }

    pub fn set_prompt(&self, conversation_id: &str, prompt: &str) {
        self.store.set_prompt(conversation_id, prompt);
    }

    pub fn clear(&self, conversation_id: &str) {
        self.store.clear(conversation_id);
    }

    pub fn history(&self, conversation_id: &str) -> Vec<Turn> {
        self.store.history(conversation_id)
    }

    /// Reply to `text` in the given conversation, rendering any failure as a
    /// message suitable for the chat user.
    pub async fn reply(&self, conversation_id: &str, text: &str) -> String {
        match self.complete(conversation_id, text).await {
            Ok(reply) if reply.is_empty() => EMPTY_REPLY_MESSAGE.to_string(),
            Ok(reply) => reply,
            Err(err) => user_facing_error(&err),
        }
    }

    /// Run one completion. The user turn and the reply, even an empty one,
    /// are committed to the conversation only when the call succeeds.
    #[instrument(skip(self, text), fields(pool_size = self.pool.size()))]
    pub async fn complete(&self, conversation_id: &str, text: &str) -> Result<String> {
        let mut messages = self.store.history(conversation_id);
        messages.push(ChatMessage::user(text));

        let request = LlmRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let pool_size = self.pool.size();
        let mut client = self.pool.active();
        let mut last_status = String::new();

        for attempt in 0..pool_size {
            debug!(
                "completion attempt {} with credential {}",
                attempt + 1,
                client.slot.masked()
            );
            match client.provider.complete(&request).await {
                Ok(response) => {
                    self.tracker.reset();
                    let reply = trim_newlines(&response.text).to_string();
                    if reply.is_empty() {
                        warn!("empty completion for conversation {}", conversation_id);
                    }
                    self.store.commit_exchange(conversation_id, text, &reply);
                    return Ok(reply);
                }
                Err(Error::RateLimited { status_text }) => {
                    if self.tracker.is_exhausted() {
                        warn!("credential pool exhausted, giving up: {}", status_text);
                        return Err(Error::RateLimited { status_text });
                    }
                    self.tracker.mark_saturated();
                    if self.tracker.is_exhausted() {
                        warn!(
                            "all {} credentials rate limited: {}",
                            pool_size, status_text
                        );
                        return Err(Error::Exhausted {
                            attempts: attempt + 1,
                            status_text,
                        });
                    }
                    warn!(
                        "credential {} rate limited ({}), rotating",
                        client.slot.masked(),
                        status_text
                    );
                    last_status = status_text;
                    client = self.pool.rotate();
                }
                Err(err) => {
                    warn!("completion failed: {}", err);
                    return Err(err);
                }
            }
        }

        // Reached when a concurrent success or an expired cooldown reset the
        // counter mid-loop; every slot has still been tried once.
        Err(Error::Exhausted {
            attempts: pool_size,
            status_text: last_status,
        })
    }

    /// Generate an image for `prompt`. Single attempt on the active credential.
    pub async fn generate_image(&self, identity: &str, prompt: &str) -> Result<String> {
        let client = self.pool.active();
        let request = ImageRequest {
            prompt: prompt.to_string(),
            user: identity.to_string(),
            size: self.settings.image_size.clone(),
        };
        let url = client.provider.generate_image(&request).await?;
        info!("generated image for {}", identity);
        Ok(url)
    }

    /// Like [`generate_image`](Self::generate_image) but renders failure as a
    /// user-facing string.
    pub async fn image_reply(&self, identity: &str, prompt: &str) -> std::result::Result<String, String> {
        self.generate_image(identity, prompt).await.map_err(|e| {
            warn!("image generation failed: {}", e);
            IMAGE_FAILED_MESSAGE.to_string()
        })
    }

    /// Transcribe an audio file. Single attempt on the active credential.
    pub async fn transcribe(&self, file_name: &str, audio: Bytes) -> Result<String> {
        let client = self.pool.active();
        let request = TranscriptionRequest {
            file_name: file_name.to_string(),
            audio,
            model: self.settings.transcription_model.clone(),
        };
        client.provider.transcribe(&request).await
    }

    pub async fn transcription_reply(&self, file_name: &str, audio: Bytes) -> String {
        match self.transcribe(file_name, audio).await {
            Ok(text) => text,
            Err(e) => {
                warn!("transcription failed: {}", e);
                TRANSCRIPTION_FAILED_MESSAGE.to_string()
            }
        }
    }
}

fn trim_newlines(text: &str) -> &str {
    text.trim_matches('\n')
}

fn user_facing_error(err: &Error) -> String {
    match err {
        Error::RateLimited { status_text } | Error::Exhausted { status_text, .. } => {
            status_text.clone()
        }
        Error::Transport(_) => TRANSPORT_ERROR_MESSAGE.to_string(),
        _ => UPSTREAM_ERROR_MESSAGE.to_string(),
    }
}
