//! In-process folder used by the consumer tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;

use super::flags::{Flag, FlagSet, FlagTerm};
use super::folder::{MailFolder, MessageCount, OpenMode};
use super::message::MailMessage;

/// A folder held entirely in memory, with counters for every operation the
/// consumer performs and switches to inject faults.
#[derive(Debug, Default)]
pub struct MemoryFolder {
    name: String,
    messages: Vec<MailMessage>,
    open_mode: Option<OpenMode>,
    pending_removed: Vec<u32>,

    pub open_calls: usize,
    pub close_calls: usize,
    pub expunged: Vec<u32>,
    pub flag_writes: Vec<(u32, Flag, bool)>,

    pub fail_open: bool,
    pub fail_fetch: bool,
    pub fail_close: bool,
    pub report_closed: bool,
    pub fail_flag_on: HashSet<u32>,
}

impl MemoryFolder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Append a message, numbering it after the current last one.
    pub fn push(&mut self, content: &[u8], flags: &[Flag]) -> u32 {
        let number = self.messages.len() as u32 + 1;
        let flags: FlagSet = flags.iter().cloned().collect();
        self.messages
            .push(MailMessage::new(number, content.to_vec()).with_flags(flags));
        number
    }

    pub fn message(&self, number: u32) -> Option<&MailMessage> {
        self.messages.iter().find(|m| m.number == number)
    }

    pub fn flags(&self, number: u32) -> FlagSet {
        self.message(number)
            .map(|m| m.flags.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Simulate another client expunging a message.
    pub fn remove_by_other_client(&mut self, number: u32) {
        self.messages.retain(|m| m.number != number);
        self.pending_removed.push(number);
    }
}

#[async_trait]
impl MailFolder for MemoryFolder {
    fn full_name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.open_mode.is_some()
    }

    async fn open(&mut self, mode: OpenMode) -> Result<()> {
        self.open_calls += 1;
        if self.fail_open {
            bail!("connection refused");
        }
        self.open_mode = Some(mode);
        Ok(())
    }

    async fn close(&mut self, expunge: bool) -> Result<()> {
        if self.open_mode.is_none() {
            return Ok(());
        }
        self.close_calls += 1;
        let mode = self.open_mode.take();
        if self.fail_close {
            bail!("connection reset during close");
        }

        if expunge && mode == Some(OpenMode::ReadWrite) {
            let (gone, kept): (Vec<_>, Vec<_>) =
                self.messages.drain(..).partition(|m| m.is_deleted());
            self.expunged.extend(gone.iter().map(|m| m.number));
            self.messages = kept;
        }
        Ok(())
    }

    async fn message_count(&mut self) -> Result<MessageCount> {
        if self.report_closed || self.open_mode.is_none() {
            return Ok(MessageCount::Closed);
        }
        Ok(MessageCount::Available(self.messages.len() as u32))
    }

    async fn messages(&mut self) -> Result<Vec<MailMessage>> {
        if self.fail_fetch {
            bail!("fetch failed");
        }
        Ok(self.messages.clone())
    }

    async fn search(&mut self, term: &FlagTerm) -> Result<Vec<MailMessage>> {
        if self.fail_fetch {
            bail!("search failed");
        }
        Ok(self
            .messages
            .iter()
            .filter(|m| term.matches(&m.flags))
            .cloned()
            .collect())
    }

    async fn set_flag(
        &mut self,
        message: &mut MailMessage,
        flag: Flag,
        value: bool,
    ) -> Result<()> {
        if self.fail_flag_on.contains(&message.number) {
            bail!("STORE rejected for message {}", message.number);
        }
        if self.open_mode != Some(OpenMode::ReadWrite) {
            bail!("folder {} is not open read-write", self.name);
        }

        if let Some(stored) = self.messages.iter_mut().find(|m| m.number == message.number) {
            stored.flags.set(flag.clone(), value);
        }
        self.flag_writes.push((message.number, flag.clone(), value));
        message.flags.set(flag, value);
        Ok(())
    }

    fn take_removed(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.pending_removed)
    }
}
