use std::fmt;

use crate::error::ProcessingError;
use crate::mail::{Flag, MailFolder, MailMessage};

use super::MailConsumer;

/// Messages discovered by one poll cycle, in folder order.
#[derive(Debug)]
pub struct Batch {
    pub messages: Vec<MailMessage>,
}

impl Batch {
    pub fn added(messages: Vec<MailMessage>) -> Self {
        Self { messages }
    }
}

/// What happened to one message of a batch.
#[derive(Debug)]
pub enum MessageOutcome {
    /// Processed and marked with the given flag
    Processed(Flag),
    /// Already flagged `\Deleted` when its turn came
    SkippedDeleted,
    Failed(ProcessingError),
}

impl fmt::Display for MessageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageOutcome::Processed(flag) => write!(f, "processed, flagged {}", flag),
            MessageOutcome::SkippedDeleted => write!(f, "skipped, already deleted"),
            MessageOutcome::Failed(error) => write!(f, "failed: {}", error.failure),
        }
    }
}

/// Summary of one poll cycle.
#[derive(Debug)]
pub struct PollReport {
    pub folder: String,
    /// Messages in the fetched batch
    pub fetched: usize,
    /// Per-message outcomes keyed by message number, in dispatch order
    pub outcomes: Vec<(u32, MessageOutcome)>,
    /// Message numbers another client removed
    pub removed: Vec<u32>,
}

impl PollReport {
    pub fn new(folder: &str) -> Self {
        Self {
            folder: folder.to_string(),
            fetched: 0,
            outcomes: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn processed(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Processed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::SkippedDeleted))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&MessageOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

impl<F: MailFolder> MailConsumer<F> {
    /// Dispatch an added batch one message at a time.
    ///
    /// A failing message is reported to the failure handler and the batch
    /// moves on; nothing here aborts the cycle.
    pub(crate) async fn messages_added(&mut self, batch: Batch) -> Vec<(u32, MessageOutcome)> {
        let mut outcomes = Vec::with_capacity(batch.messages.len());

        for mut message in batch.messages {
            let outcome = if message.is_deleted() {
                tracing::trace!("Skipping {} as it is flagged as deleted", message);
                MessageOutcome::SkippedDeleted
            } else {
                match self.handle_message(&mut message).await {
                    Ok(flag) => MessageOutcome::Processed(flag),
                    Err(failure) => {
                        let error = ProcessingError {
                            folder: self.folder.full_name().to_string(),
                            message_number: message.number,
                            failure,
                        };
                        self.failure_handler.handle(&error);
                        MessageOutcome::Failed(error)
                    }
                }
            };
            tracing::debug!(
                "Message #{} in {}: {}",
                message.number,
                self.folder.full_name(),
                outcome
            );
            outcomes.push((message.number, outcome));
        }

        outcomes
    }

    /// Removed messages are gone from the server; only their numbers remain.
    pub(crate) fn messages_removed(&self, numbers: &[u32]) {
        for number in numbers {
            tracing::debug!(
                "Removed message number {} from {}",
                number,
                self.folder.full_name()
            );
        }
    }
}
