use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chatrelay_common::{Error, InboundMessage, MessageKind, OutboundContent, Result, Speaker};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::bot::ChatBot;
use crate::traits::ChannelSender;

/// One parsed line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Quit,
    /// `/audio <path>`: send a local audio file as a voice message.
    Audio(String),
    /// `/group <topic> <text>`: message posted in a group room.
    Group { topic: String, text: String },
    Text(String),
    Empty,
}

/// Interactive stdin/stdout channel acting as a single local contact.
pub struct ConsoleChannel {
    user: String,
}

impl ConsoleChannel {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn parse_line(line: &str) -> ConsoleInput {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return ConsoleInput::Empty;
        }
        if matches!(line.trim(), "/quit" | "/exit") {
            return ConsoleInput::Quit;
        }
        if let Some(path) = line.strip_prefix("/audio ") {
            return ConsoleInput::Audio(path.trim().to_string());
        }
        if let Some(rest) = line.strip_prefix("/group ") {
            let rest = rest.trim_start();
            if let Some((topic, text)) = rest.split_once(' ') {
                return ConsoleInput::Group {
                    topic: topic.to_string(),
                    text: text.to_string(),
                };
            }
        }
        ConsoleInput::Text(line.to_string())
    }

    /// Build the inbound message for a console line. `None` for control input.
    pub async fn to_message(&self, input: ConsoleInput) -> Result<Option<InboundMessage>> {
        let speaker = Speaker::direct(&self.user);
        let message = match input {
            ConsoleInput::Quit | ConsoleInput::Empty => return Ok(None),
            ConsoleInput::Text(text) => InboundMessage::text(speaker, &self.user, text),
            ConsoleInput::Group { topic, text } => {
                InboundMessage::text(Speaker::group(topic), &self.user, text)
            }
            ConsoleInput::Audio(path) => {
                let data = tokio::fs::read(&path).await?;
                let file_name = Path::new(&path)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| Error::Channel(format!("not a file path: {path}")))?
                    .to_string();
                InboundMessage::new(
                    speaker,
                    &self.user,
                    MessageKind::Audio {
                        file_name,
                        data: Bytes::from(data),
                    },
                )
            }
        };
        Ok(Some(message))
    }

    /// Read stdin line by line until EOF or `/quit`, dispatching each line
    /// through `bot`.
    pub async fn run(&self, bot: &ChatBot) -> Result<()> {
        info!("console channel ready, chatting as {}", self.user);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        prompt().await?;
        while let Some(line) = lines.next_line().await? {
            let input = Self::parse_line(&line);
            if input == ConsoleInput::Quit {
                break;
            }
            match self.to_message(input).await {
                Ok(Some(message)) => {
                    if let Err(e) = bot.on_message(&message, self).await {
                        warn!("failed to handle console message: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("{}", e),
            }
            prompt().await?;
        }
        info!("console channel closed");
        Ok(())
    }
}

async fn prompt() -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    Ok(())
}

#[async_trait]
impl ChannelSender for ConsoleChannel {
    fn channel_type(&self) -> &str {
        "console"
    }

    async fn say(&self, speaker: &Speaker, content: OutboundContent) -> Result<()> {
        let line = match content {
            OutboundContent::Text(text) => format!("[{speaker}] {text}\n"),
            OutboundContent::ImageUrl(url) => format!("[{speaker}] image: {url}\n"),
        };
        let mut stdout = tokio::io::stdout();
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_control_lines() {
        assert_eq!(ConsoleChannel::parse_line("/quit"), ConsoleInput::Quit);
        assert_eq!(ConsoleChannel::parse_line("  \n"), ConsoleInput::Empty);
        assert_eq!(
            ConsoleChannel::parse_line("/audio ./voice.mp3"),
            ConsoleInput::Audio("./voice.mp3".into())
        );
    }

    #[test]
    fn parses_group_lines() {
        assert_eq!(
            ConsoleChannel::parse_line("/group ops @bot status?"),
            ConsoleInput::Group {
                topic: "ops".into(),
                text: "@bot status?".into()
            }
        );
        // A topic without text is sent as plain text.
        assert_eq!(
            ConsoleChannel::parse_line("/group ops"),
            ConsoleInput::Text("/group ops".into())
        );
    }

    #[test]
    fn commands_pass_through_as_text() {
        assert_eq!(
            ConsoleChannel::parse_line("/cmd prompt Be terse\r\n"),
            ConsoleInput::Text("/cmd prompt Be terse".into())
        );
    }

    #[tokio::test]
    async fn text_line_becomes_direct_message() {
        let console = ConsoleChannel::new("me");
        let message = console
            .to_message(ConsoleInput::Text("hi".into()))
            .await
            .unwrap()
            .expect("text produces a message");
        assert_eq!(message.speaker, Speaker::direct("me"));
        assert_eq!(message.text_content(), "hi");
        assert!(console.to_message(ConsoleInput::Empty).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_audio_file_is_an_error() {
        let console = ConsoleChannel::new("me");
        let result = console
            .to_message(ConsoleInput::Audio("/definitely/not/here.mp3".into()))
            .await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
