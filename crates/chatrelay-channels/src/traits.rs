use async_trait::async_trait;
use chatrelay_common::{OutboundContent, Result, Speaker};

/// Send-only interface for delivering replies through a chat platform.
///
/// Designed to be wrapped in `Arc` and shared across tasks.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Unique identifier for this channel type.
    fn channel_type(&self) -> &str;

    /// Deliver `content` to the contact or room identified by `speaker`.
    async fn say(&self, speaker: &Speaker, content: OutboundContent) -> Result<()>;
}
