pub mod dispatch;
pub mod exchange;
pub mod scheduler;

use std::sync::Arc;

use crate::error::ConsumerError;
use crate::mail::{Flag, FlagTerm, MailFolder, MessageCount, OpenMode};

pub use dispatch::{Batch, PollReport};
pub use exchange::{FailureHandler, LoggingFailureHandler, MailExchange, Processor};

/// What to fetch and how to mark messages once processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fetch only messages without `\Seen` instead of the whole folder
    pub process_only_unseen_messages: bool,
    /// Mark processed messages `\Deleted` (expunged on close) instead of `\Seen`
    pub delete_processed_messages: bool,
}

impl PollPolicy {
    /// The flag that marks a message as processed under this policy
    pub fn processed_flag(&self) -> Flag {
        if self.delete_processed_messages {
            Flag::Deleted
        } else {
            Flag::Seen
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Polls one mail folder and hands each eligible message to a processor.
///
/// The consumer owns its folder. `poll` takes `&mut self`, so two cycles can
/// never run against the same folder at once.
pub struct MailConsumer<F: MailFolder> {
    folder: F,
    policy: PollPolicy,
    processor: Arc<dyn Processor>,
    failure_handler: Arc<dyn FailureHandler>,
    state: ConsumerState,
}

impl<F: MailFolder> MailConsumer<F> {
    pub fn new(folder: F, policy: PollPolicy, processor: Arc<dyn Processor>) -> Self {
        Self {
            folder,
            policy,
            processor,
            failure_handler: Arc::new(LoggingFailureHandler),
            state: ConsumerState::Stopped,
        }
    }

    pub fn with_failure_handler(mut self, handler: Arc<dyn FailureHandler>) -> Self {
        self.failure_handler = handler;
        self
    }

    #[cfg(test)]
    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn folder(&self) -> &F {
        &self.folder
    }

    #[cfg(test)]
    pub fn folder_mut(&mut self) -> &mut F {
        &mut self.folder
    }

    fn expect_state(&self, expected: ConsumerState) -> Result<(), ConsumerError> {
        if self.state != expected {
            return Err(ConsumerError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Register for batch notifications and enter the running state.
    pub fn start(&mut self) -> Result<(), ConsumerError> {
        self.expect_state(ConsumerState::Stopped)?;
        self.state = ConsumerState::Starting;

        // Removal notices from before registration are not ours to report.
        self.folder.take_removed();

        self.state = ConsumerState::Running;
        tracing::info!("Consumer for folder {} started", self.folder.full_name());
        Ok(())
    }

    /// Deregister and make sure the folder is not left open.
    ///
    /// Removal notices still pending when the consumer stops are dropped, so
    /// a later `start` never reports removals from a stopped period.
    pub async fn stop(&mut self) -> Result<(), ConsumerError> {
        self.expect_state(ConsumerState::Running)?;
        self.state = ConsumerState::Stopping;

        let result = self.release_folder().await;
        let dropped = self.folder.take_removed();
        if !dropped.is_empty() {
            tracing::debug!(
                "Dropping {} removal notices for {} on stop",
                dropped.len(),
                self.folder.full_name()
            );
        }

        self.state = ConsumerState::Stopped;
        tracing::info!("Consumer for folder {} stopped", self.folder.full_name());
        result
    }

    /// Run one poll cycle: open, count, fetch, dispatch, close.
    ///
    /// Only connection failures are returned; failures of individual messages
    /// are reported to the failure handler and recorded in the report. The
    /// folder is closed before this returns, whatever the outcome.
    pub async fn poll(&mut self) -> Result<PollReport, ConsumerError> {
        self.expect_state(ConsumerState::Running)?;

        let result = self.poll_folder().await;
        let released = self.release_folder().await;

        match (result, released) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Err(close_err)) => {
                tracing::warn!("Failed to close folder after failed poll: {}", close_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        }
    }

    async fn poll_folder(&mut self) -> Result<PollReport, ConsumerError> {
        self.ensure_folder_is_open().await?;

        let name = self.folder.full_name().to_string();
        let count = self
            .folder
            .message_count()
            .await
            .map_err(|e| ConsumerError::connection(&name, e))?;

        let mut report = PollReport::new(&name);
        match count {
            MessageCount::Closed => {
                return Err(ConsumerError::connection(
                    &name,
                    anyhow::anyhow!("Folder {} is closed", name),
                ));
            }
            MessageCount::Available(0) => {
                tracing::debug!("Folder {} is empty", name);
            }
            MessageCount::Available(count) => {
                tracing::debug!("Folder {} has {} messages", name, count);
                let messages = if self.policy.process_only_unseen_messages {
                    self.folder.search(&FlagTerm::unseen()).await
                } else {
                    self.folder.messages().await
                }
                .map_err(|e| ConsumerError::connection(&name, e))?;

                report.fetched = messages.len();
                report.outcomes = self.messages_added(Batch::added(messages)).await;
            }
        }

        let removed = self.folder.take_removed();
        if !removed.is_empty() {
            self.messages_removed(&removed);
            report.removed = removed;
        }

        Ok(report)
    }

    async fn ensure_folder_is_open(&mut self) -> Result<(), ConsumerError> {
        if !self.folder.is_open() {
            let name = self.folder.full_name().to_string();
            self.folder
                .open(OpenMode::ReadWrite)
                .await
                .map_err(|e| ConsumerError::connection(&name, e))?;
        }
        Ok(())
    }

    async fn release_folder(&mut self) -> Result<(), ConsumerError> {
        if self.folder.is_open() {
            let name = self.folder.full_name().to_string();
            self.folder
                .close(true)
                .await
                .map_err(|e| ConsumerError::connection(&name, e))?;
        }
        Ok(())
    }
}
