use std::collections::BTreeSet;
use std::fmt;

/// A named boolean marker on a message, persisted by the server.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Recent,
    /// A server or user defined keyword
    Keyword(String),
}

impl Flag {
    /// IMAP wire name of the flag, as used in STORE and FETCH.
    pub fn imap_name(&self) -> &str {
        match self {
            Flag::Seen => "\\Seen",
            Flag::Answered => "\\Answered",
            Flag::Flagged => "\\Flagged",
            Flag::Deleted => "\\Deleted",
            Flag::Draft => "\\Draft",
            Flag::Recent => "\\Recent",
            Flag::Keyword(name) => name,
        }
    }

    /// SEARCH key matching messages that carry (or lack) this flag.
    fn search_key(&self, set: bool) -> String {
        let system = match self {
            Flag::Seen => Some(("SEEN", "UNSEEN")),
            Flag::Answered => Some(("ANSWERED", "UNANSWERED")),
            Flag::Flagged => Some(("FLAGGED", "UNFLAGGED")),
            Flag::Deleted => Some(("DELETED", "UNDELETED")),
            Flag::Draft => Some(("DRAFT", "UNDRAFT")),
            Flag::Recent => Some(("RECENT", "OLD")),
            Flag::Keyword(_) => None,
        };

        match (system, set) {
            (Some((on, _)), true) => on.to_string(),
            (Some((_, off)), false) => off.to_string(),
            (None, true) => format!("KEYWORD {}", self.imap_name()),
            (None, false) => format!("UNKEYWORD {}", self.imap_name()),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.imap_name())
    }
}

impl From<&async_imap::types::Flag<'_>> for Flag {
    fn from(flag: &async_imap::types::Flag<'_>) -> Self {
        use async_imap::types::Flag as ImapFlag;

        match flag {
            ImapFlag::Seen => Flag::Seen,
            ImapFlag::Answered => Flag::Answered,
            ImapFlag::Flagged => Flag::Flagged,
            ImapFlag::Deleted => Flag::Deleted,
            ImapFlag::Draft => Flag::Draft,
            ImapFlag::Recent => Flag::Recent,
            ImapFlag::Custom(name) => Flag::Keyword(name.to_string()),
            other => Flag::Keyword(format!("{:?}", other)),
        }
    }
}

/// The set of flags currently known for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    flags: BTreeSet<Flag>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    /// Set or clear a flag. Returns true if the set changed.
    pub fn set(&mut self, flag: Flag, value: bool) -> bool {
        if value {
            self.flags.insert(flag)
        } else {
            self.flags.remove(&flag)
        }
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        Self {
            flags: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.flags.iter().map(Flag::imap_name).collect();
        write!(f, "({})", names.join(" "))
    }
}

/// Search criterion selecting messages by the presence or absence of one flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagTerm {
    pub flag: Flag,
    pub set: bool,
}

impl FlagTerm {
    pub fn new(flag: Flag, set: bool) -> Self {
        Self { flag, set }
    }

    /// Messages that have not been seen yet
    pub fn unseen() -> Self {
        Self::new(Flag::Seen, false)
    }

    #[cfg(test)]
    pub fn matches(&self, flags: &FlagSet) -> bool {
        flags.contains(&self.flag) == self.set
    }

    /// Render the term as an IMAP SEARCH query
    pub fn to_imap_query(&self) -> String {
        self.flag.search_key(self.set)
    }
}
