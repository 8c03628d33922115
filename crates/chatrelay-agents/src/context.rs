//! In-memory, per-conversation message history bounded by a token budget.
//!
//! Every conversation keeps a pinned system turn at index 0. After each
//! append the store evicts the oldest non-system turn, one at a time, until
//! the estimated size fits the budget again. The system turn is never
//! evicted, even when it alone exceeds the budget.

use dashmap::DashMap;
use tracing::{debug, info};

use crate::providers::{ChatMessage, ChatRole};

/// Prompt installed for new conversations and on [`ConversationStore::clear`].
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Default context budget, in estimated tokens.
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 4000;

pub type Turn = ChatMessage;

/// Heuristic size of a piece of text. Must be deterministic and must not
/// decrease when text grows.
pub trait SizeEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// Rough token estimate: one token per `chars_per_token` characters, rounded up.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: usize,
}

impl CharRatioEstimator {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

impl SizeEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }
}

/// Snapshot of one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Turn>,
}

impl Conversation {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            messages: vec![ChatMessage::system(DEFAULT_SYSTEM_PROMPT)],
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }
}

pub struct ConversationStore {
    conversations: DashMap<String, Conversation>,
    estimator: Box<dyn SizeEstimator>,
    max_tokens: usize,
}

impl ConversationStore {
    pub fn new(max_tokens: usize) -> Self {
        Self::with_estimator(max_tokens, Box::new(CharRatioEstimator::default()))
    }

    pub fn with_estimator(max_tokens: usize, estimator: Box<dyn SizeEstimator>) -> Self {
        info!("conversation store budget: {} tokens", max_tokens);
        Self {
            conversations: DashMap::new(),
            estimator,
            max_tokens,
        }
    }

    pub fn budget(&self) -> usize {
        self.max_tokens
    }

    /// Estimated size of a message sequence.
    pub fn estimate(&self, messages: &[Turn]) -> usize {
        messages
            .iter()
            .map(|m| self.estimator.estimate(&m.content))
            .sum()
    }

    /// Return the conversation, creating it with the default prompt on first use.
    pub fn get(&self, id: &str) -> Conversation {
        self.conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id))
            .clone()
    }

    /// Ordered message history of a conversation.
    pub fn history(&self, id: &str) -> Vec<Turn> {
        self.get(id).messages
    }

    pub fn set_prompt(&self, id: &str, prompt: &str) {
        let mut conversation = self
            .conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id));
        conversation.messages[0].content = prompt.to_string();
        // A longer prompt can push the history over budget.
        self.evict(&mut conversation.messages);
        debug!("prompt set for conversation {}", id);
    }

    pub fn append_user_turn(&self, id: &str, text: &str) -> Vec<Turn> {
        self.append(id, ChatMessage::user(text))
    }

    pub fn append_assistant_turn(&self, id: &str, text: &str) -> Vec<Turn> {
        self.append(id, ChatMessage::assistant(text))
    }

    /// Append a user turn followed by an assistant turn as one update, so no
    /// reader observes the user turn without its reply.
    pub fn commit_exchange(&self, id: &str, user: &str, assistant: &str) -> Vec<Turn> {
        let mut conversation = self
            .conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id));
        conversation.messages.push(ChatMessage::user(user));
        self.evict(&mut conversation.messages);
        conversation.messages.push(ChatMessage::assistant(assistant));
        self.evict(&mut conversation.messages);
        conversation.messages.clone()
    }

    /// Drop every turn and reinstall the default system prompt. A custom
    /// prompt set earlier is discarded too.
    pub fn clear(&self, id: &str) {
        self.conversations
            .insert(id.to_string(), Conversation::new(id));
        info!("conversation {} cleared", id);
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn conversation_ids(&self) -> Vec<String> {
        self.conversations.iter().map(|e| e.key().clone()).collect()
    }

    fn append(&self, id: &str, turn: Turn) -> Vec<Turn> {
        let mut conversation = self
            .conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id));
        conversation.messages.push(turn);
        self.evict(&mut conversation.messages);
        conversation.messages.clone()
    }

    fn evict(&self, messages: &mut Vec<Turn>) {
        let mut evicted = 0usize;
        while messages.len() > 1 && self.estimate(messages) > self.max_tokens {
            messages.remove(1);
            evicted += 1;
        }
        if evicted > 0 {
            debug!("evicted {} turns to fit budget {}", evicted, self.max_tokens);
        }
        debug_assert_eq!(messages[0].role, ChatRole::System);
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTEXT_TOKENS)
    }
}
