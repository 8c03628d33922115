pub mod bot;
pub mod commands;
pub mod console;
pub mod traits;

pub use bot::{ChatBot, split_message};
pub use commands::{Command, HELP_TEXT, parse_command};
pub use console::{ConsoleChannel, ConsoleInput};
pub use traits::ChannelSender;
