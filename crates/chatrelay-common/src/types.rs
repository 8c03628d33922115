use serde::{Deserialize, Serialize};
use std::fmt;

/// The addressable party a message came from and a reply goes to.
///
/// Resolved once at the platform boundary; the core only ever sees the
/// conversation identifier derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Speaker {
    /// One-to-one chat with a contact, keyed by the contact's name.
    Direct { name: String },
    /// Group chat, keyed by the room topic.
    Group { topic: String },
}

impl Speaker {
    pub fn direct(name: impl Into<String>) -> Self {
        Speaker::Direct { name: name.into() }
    }

    pub fn group(topic: impl Into<String>) -> Self {
        Speaker::Group {
            topic: topic.into(),
        }
    }

    /// Key under which this party's conversation context is stored.
    pub fn conversation_id(&self) -> &str {
        match self {
            Speaker::Direct { name } => name,
            Speaker::Group { topic } => topic,
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Direct { name } => write!(f, "contact:{name}"),
            Speaker::Group { topic } => write!(f, "room:{topic}"),
        }
    }
}
