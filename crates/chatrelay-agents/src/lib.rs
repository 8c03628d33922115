pub mod context;
pub mod openai;
pub mod pool;
pub mod providers;
pub mod rate_limit;
pub mod runtime;

pub use context::{
    CharRatioEstimator, Conversation, ConversationStore, DEFAULT_SYSTEM_PROMPT, SizeEstimator,
    Turn,
};
pub use openai::OpenAiProvider;
pub use pool::{ClientPool, CredentialSlot, PooledClient};
pub use providers::{
    ChatMessage, ChatRole, ImageRequest, LlmProvider, LlmRequest, LlmResponse,
    TranscriptionRequest, Usage,
};
pub use rate_limit::{Clock, CooldownState, ManualClock, RateLimitTracker, SystemClock};
pub use runtime::{CompletionService, CompletionSettings};
