pub mod flags;
pub mod folder;
pub mod imap;
#[cfg(test)]
pub mod memory;
pub mod message;
#[cfg(test)]
pub mod scripted;
pub mod transport;

pub use flags::{Flag, FlagTerm};
pub use folder::{MailFolder, MessageCount, OpenMode};
pub use message::MailMessage;
