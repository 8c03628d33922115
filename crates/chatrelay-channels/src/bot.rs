use std::sync::Arc;

use chatrelay_agents::CompletionService;
use chatrelay_common::{InboundMessage, MessageKind, OutboundContent, Result, Speaker};
use tracing::{debug, info, warn};

use crate::commands::{Command, HELP_TEXT, parse_command, strip_mention};
use crate::traits::ChannelSender;

/// Platform notices that arrive as text but are not written by a person.
const SYSTEM_NOTICES: &[&str] = &[
    "收到一条视频/语音聊天消息，请在手机上查看",
    "收到红包，请在手机上查看",
    "收到转账，请在手机上查看",
    "/cgi-bin/mmwebwx-bin/webwxgetpubliclinkimg",
];

/// Platform service account whose messages are never answered.
const PLATFORM_TEAM_ACCOUNT: &str = "微信团队";

/// Routes inbound chat events to the completion service and sends replies
/// back through a [`ChannelSender`].
pub struct ChatBot {
    service: Arc<CompletionService>,
    name: String,
    max_message_chars: usize,
}

impl ChatBot {
    pub fn new(service: Arc<CompletionService>, name: impl Into<String>, max_message_chars: usize) -> Self {
        Self {
            service,
            name: name.into(),
            max_message_chars: max_message_chars.max(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle one inbound message end to end.
    pub async fn on_message(&self, message: &InboundMessage, sender: &dyn ChannelSender) -> Result<()> {
        match &message.speaker {
            Speaker::Direct { name } => {
                info!("contact: {} text: {}", name, message.text_content())
            }
            Speaker::Group { topic } => info!(
                "room: {} contact: {} text: {}",
                topic,
                message.talker,
                message.text_content()
            ),
        }

        if self.is_noise(message) {
            debug!("ignoring message {}", message.id);
            return Ok(());
        }

        match &message.kind {
            MessageKind::Audio { file_name, data } => {
                let transcript = self
                    .service
                    .transcription_reply(file_name, data.clone())
                    .await;
                // Transcripts go privately to the talker, even from a room.
                sender
                    .say(&Speaker::direct(&message.talker), OutboundContent::Text(transcript))
                    .await
            }
            MessageKind::Text(text) => {
                if let Some(command) = parse_command(text, &self.name) {
                    info!("command: {:?}", command);
                    return self.run_command(command, &message.speaker, sender).await;
                }
                if !self.is_triggered(text, &message.speaker) {
                    return Ok(());
                }
                self.answer(message, text, sender).await
            }
            MessageKind::Unsupported(_) => Ok(()),
        }
    }

    /// Messages the bot never answers: its own, unsupported kinds, platform
    /// notices and the platform's service account.
    pub fn is_noise(&self, message: &InboundMessage) -> bool {
        if message.is_self || message.talker == PLATFORM_TEAM_ACCOUNT {
            return true;
        }
        match &message.kind {
            MessageKind::Text(text) => SYSTEM_NOTICES.iter().any(|n| text.contains(n)),
            MessageKind::Audio { .. } => false,
            MessageKind::Unsupported(_) => true,
        }
    }

    /// Private chats always trigger; group chats only when addressed to the
    /// bot as `@<name> `.
    pub fn is_triggered(&self, text: &str, speaker: &Speaker) -> bool {
        match speaker {
            Speaker::Direct { .. } => true,
            Speaker::Group { .. } => strip_mention(text, &self.name).is_some(),
        }
    }

    async fn answer(&self, message: &InboundMessage, text: &str, sender: &dyn ChannelSender) -> Result<()> {
        let conversation_id = message.speaker.conversation_id();
        let reply = self.service.reply(conversation_id, text).await;
        let reply = match &message.speaker {
            Speaker::Direct { .. } => reply,
            Speaker::Group { .. } => format!("@{} {}\n------\n {}", message.talker, text, reply),
        };
        self.say_text(&message.speaker, &reply, sender).await
    }

    async fn run_command(&self, command: Command, speaker: &Speaker, sender: &dyn ChannelSender) -> Result<()> {
        let conversation_id = speaker.conversation_id();
        match command {
            Command::Help => self.say_text(speaker, HELP_TEXT, sender).await,
            Command::Prompt(None) | Command::Image(None) => {
                self.say_text(speaker, "Please provide a prompt", sender).await
            }
            Command::Prompt(Some(prompt)) => {
                self.service.set_prompt(conversation_id, &prompt);
                self.say_text(speaker, "Prompt set", sender).await
            }
            Command::Clear => {
                self.service.clear(conversation_id);
                self.say_text(speaker, "Conversation cleared", sender).await
            }
            Command::Image(Some(prompt)) => match self.service.image_reply(&self.name, &prompt).await {
                Ok(url) => sender.say(speaker, OutboundContent::ImageUrl(url)).await,
                Err(failure) => self.say_text(speaker, &failure, sender).await,
            },
            Command::Unknown(name) => {
                debug!("ignoring unknown command {}", name);
                Ok(())
            }
        }
    }

    async fn say_text(&self, speaker: &Speaker, text: &str, sender: &dyn ChannelSender) -> Result<()> {
        for chunk in split_message(text, self.max_message_chars) {
            if let Err(e) = sender.say(speaker, OutboundContent::Text(chunk)).await {
                warn!("failed to deliver reply to {}: {}", speaker, e);
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Split `text` into chunks of at most `max_chars` characters. Always returns
/// at least one chunk.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_short_message_is_single_chunk() {
        assert_eq!(split_message("hello", 1000), vec!["hello"]);
        assert_eq!(split_message("", 1000), vec![""]);
    }

    #[test]
    fn split_long_message_in_order() {
        let text = "a".repeat(2500);
        let chunks = split_message(&text, 1000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[2].len(), 500);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn split_counts_characters_not_bytes() {
        let chunks = split_message("你好世界", 3);
        assert_eq!(chunks, vec!["你好世", "界"]);
    }
}
