use serde::{Deserialize, Serialize};

/// Top-level configuration, as read from `config.yml` / `config.toml` and
/// then overridden from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub bot: BotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Shared base URL for every key in `api_keys`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Keys that use `base_url`.
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Keys with their own endpoint, appended after `api_keys`.
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_image_size")]
    pub image_size: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_keys: Vec::new(),
            credentials: Vec::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            image_size: default_image_size(),
            transcription_model: default_transcription_model(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Per-conversation budget in estimated tokens.
    #[serde(default = "default_max_context_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_context_tokens(),
            chars_per_token: default_chars_per_token(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Name the bot is addressed by in group chats (`@name ...`).
    #[serde(default = "default_bot_name")]
    pub name: String,
    /// Longest single outbound message; longer replies are split.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            max_message_chars: default_max_message_chars(),
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f64 {
    0.6
}

fn default_image_size() -> String {
    "512x512".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_context_tokens() -> usize {
    4000
}

fn default_chars_per_token() -> usize {
    4
}

fn default_cooldown() -> u64 {
    30
}

fn default_bot_name() -> String {
    "chatrelay".to_string()
}

fn default_max_message_chars() -> usize {
    1000
}
