pub mod error;
pub mod message;
pub mod types;

pub use error::{Error, Result};
pub use message::{InboundMessage, MessageKind, OutboundContent};
pub use types::Speaker;
