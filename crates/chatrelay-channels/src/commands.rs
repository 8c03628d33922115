use std::sync::LazyLock;

use regex::Regex;

pub const HELP_TEXT: &str = "========\n\
/cmd help\n\
# Show this help\n\
/cmd prompt <PROMPT>\n\
# Set the prompt for this conversation\n\
/cmd image <PROMPT>\n\
# Generate an image from the prompt\n\
/cmd clear\n\
# Clear this conversation's history since startup\n\
========";

/// A recognized bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// `None` when the user forgot the prompt text.
    Prompt(Option<String>),
    Clear,
    Image(Option<String>),
    /// Matched the command syntax but names no known command.
    Unknown(String),
}

impl Command {
    fn from_parts(name: &str, argument: &str) -> Self {
        let argument = Some(argument.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        match name {
            "help" => Command::Help,
            "prompt" => Command::Prompt(argument),
            "clear" => Command::Clear,
            "image" => Command::Image(argument),
            other => Command::Unknown(other.to_string()),
        }
    }
}

static COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/cmd\s([a-z]+)\s?(.*)").expect("command regex should compile")
});

/// Match `/cmd <name> [args]`, optionally preceded by `@<bot_name> ` as used
/// in group chats. Returns `None` when the text is not a command.
pub fn parse_command(text: &str, bot_name: &str) -> Option<Command> {
    let text = strip_mention(text, bot_name).unwrap_or(text);
    let captures = COMMAND.captures(text)?;
    let name = captures.get(1)?.as_str();
    let argument = captures.get(2).map_or("", |m| m.as_str());
    Some(Command::from_parts(name, argument))
}

/// Remainder after a leading `@<bot_name>` and one whitespace character.
pub(crate) fn strip_mention<'a>(text: &'a str, bot_name: &str) -> Option<&'a str> {
    let rest = text.strip_prefix('@')?.strip_prefix(bot_name)?;
    let mut chars = rest.chars();
    chars.next().filter(|c| c.is_whitespace())?;
    Some(chars.as_str())
}
