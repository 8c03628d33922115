use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Speaker;

/// A message delivered to the bot by a chat platform.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: String,
    /// Where the message was posted and where the reply goes.
    pub speaker: Speaker,
    /// Display name of the contact who wrote the message.
    pub talker: String,
    /// True when the bot account itself sent the message.
    pub is_self: bool,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum MessageKind {
    Text(String),
    Audio { file_name: String, data: Bytes },
    /// Anything the bot does not handle (stickers, transfers, files, ...).
    Unsupported(String),
}

/// Content the bot sends back through a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundContent {
    Text(String),
    ImageUrl(String),
}

impl InboundMessage {
    pub fn new(speaker: Speaker, talker: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            speaker,
            talker: talker.into(),
            is_self: false,
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn text(speaker: Speaker, talker: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(speaker, talker, MessageKind::Text(text.into()))
    }

    /// Text payload, or an empty string for non-text messages.
    pub fn text_content(&self) -> &str {
        match &self.kind {
            MessageKind::Text(text) => text,
            _ => "",
        }
    }
}
