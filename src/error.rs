use thiserror::Error;

use crate::consumer::ConsumerState;

/// Errors that end a poll cycle or reject a lifecycle transition.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The folder could not be opened, counted or read. The scheduler
    /// retries on the next interval.
    #[error("connection error on folder {folder}: {cause:#}")]
    Connection { folder: String, cause: anyhow::Error },

    #[error("consumer is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: ConsumerState,
        actual: ConsumerState,
    },
}

impl ConsumerError {
    pub fn connection(folder: &str, cause: anyhow::Error) -> Self {
        ConsumerError::Connection {
            folder: folder.to_string(),
            cause,
        }
    }

    /// True for the failures the scheduler should simply retry.
    pub fn is_connection(&self) -> bool {
        matches!(self, ConsumerError::Connection { .. })
    }
}

/// What went wrong while handling a single message.
#[derive(Debug, Error)]
pub enum ProcessingFailure {
    #[error("processor failed: {0:#}")]
    Processor(anyhow::Error),

    #[error("processor panicked: {0}")]
    Panic(String),

    #[error("could not flag message as processed: {0:#}")]
    FlagCommit(anyhow::Error),
}

/// A failure confined to one message of a batch.
#[derive(Debug, Error)]
#[error("message #{message_number} in {folder}: {failure}")]
pub struct ProcessingError {
    pub folder: String,
    pub message_number: u32,
    pub failure: ProcessingFailure,
}
