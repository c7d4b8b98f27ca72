use anyhow::Result;
use async_trait::async_trait;

use super::flags::{Flag, FlagTerm};
use super::message::MailMessage;

/// Access mode requested when opening a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Result of asking a folder for its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCount {
    Available(u32),
    /// The folder reports itself closed
    Closed,
}

/// Stateful handle to one remote mail folder.
///
/// Implementations own their connection; a folder is never shared between
/// consumers, so every operation takes `&mut self`.
#[async_trait]
pub trait MailFolder: Send {
    /// Full hierarchical name of the folder, e.g. `INBOX` or `Archive/2024`.
    fn full_name(&self) -> &str;

    fn is_open(&self) -> bool;

    async fn open(&mut self, mode: OpenMode) -> Result<()>;

    /// Close the folder. When `expunge` is set, messages flagged
    /// `\Deleted` are permanently removed. Does nothing if already closed.
    async fn close(&mut self, expunge: bool) -> Result<()>;

    async fn message_count(&mut self) -> Result<MessageCount>;

    /// All messages in the folder, in folder order.
    async fn messages(&mut self) -> Result<Vec<MailMessage>>;

    /// Messages matching `term`, in folder order.
    async fn search(&mut self, term: &FlagTerm) -> Result<Vec<MailMessage>>;

    /// Set or clear a flag on the server and on the local projection.
    async fn set_flag(&mut self, message: &mut MailMessage, flag: Flag, value: bool)
        -> Result<()>;

    /// Message numbers the server reported as removed since the last call.
    fn take_removed(&mut self) -> Vec<u32>;
}
