use std::fmt;

use super::flags::{Flag, FlagSet};

/// A message as retrieved from a folder.
///
/// This is a projection of server state: flag changes must go through
/// [`MailFolder::set_flag`](super::folder::MailFolder::set_flag) so the
/// server sees them, which then updates `flags` here.
#[derive(Debug, Clone)]
pub struct MailMessage {
    /// Sequence number within the folder at fetch time
    pub number: u32,
    /// Server UID, when the transport reports one
    pub uid: Option<u32>,
    /// Raw RFC 5322 content
    pub content: Vec<u8>,
    pub flags: FlagSet,
}

impl MailMessage {
    pub fn new(number: u32, content: Vec<u8>) -> Self {
        Self {
            number,
            uid: None,
            content,
            flags: FlagSet::new(),
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn with_flags(mut self, flags: FlagSet) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.contains(&Flag::Deleted)
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

impl fmt::Display for MailMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.uid {
            Some(uid) => write!(f, "message #{} (uid {}) {}", self.number, uid, self.flags),
            None => write!(f, "message #{} {}", self.number, self.flags),
        }
    }
}
