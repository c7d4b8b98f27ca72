use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use mailparse::MailHeaderMap;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use uuid::Uuid;

use crate::error::{ProcessingError, ProcessingFailure};
use crate::mail::{Flag, MailFolder, MailMessage};

use super::MailConsumer;

/// Envelope handed to the processor for one message.
///
/// It borrows the message, so it cannot outlive the processor call.
#[derive(Debug)]
pub struct MailExchange<'a> {
    id: Uuid,
    folder: &'a str,
    message: &'a MailMessage,
    created_at: DateTime<Utc>,
}

impl<'a> MailExchange<'a> {
    pub fn new(folder: &'a str, message: &'a MailMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            folder,
            message,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Name of the folder the message came from
    pub fn folder(&self) -> &str {
        self.folder
    }

    pub fn message(&self) -> &MailMessage {
        self.message
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// First value of a top-level header, decoded.
    /// Returns `None` if the header is absent or the head does not parse.
    pub fn header(&self, name: &str) -> Option<String> {
        let (headers, _) = mailparse::parse_headers(&self.message.content).ok()?;
        headers.get_first_value(name)
    }
}

/// Downstream consumer of exchanges.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, exchange: &MailExchange<'_>) -> anyhow::Result<()>;
}

/// Receives failures that were contained to a single message.
pub trait FailureHandler: Send + Sync {
    fn handle(&self, error: &ProcessingError);
}

pub struct LoggingFailureHandler;

impl FailureHandler for LoggingFailureHandler {
    fn handle(&self, error: &ProcessingError) {
        tracing::warn!("Failed to process {}", error);
    }
}

/// Build an exchange for `message` and run the processor on it.
///
/// Errors and panics from the processor stop here.
async fn process_message(
    processor: &dyn Processor,
    folder: &str,
    message: &MailMessage,
) -> Result<(), ProcessingFailure> {
    let exchange = MailExchange::new(folder, message);
    tracing::debug!("Processing {} as exchange {}", message, exchange.id());

    match AssertUnwindSafe(processor.process(&exchange))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ProcessingFailure::Processor(e)),
        Err(panic) => Err(ProcessingFailure::Panic(panic_message(panic))),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl<F: MailFolder> MailConsumer<F> {
    /// Process one message and, only if that succeeded, commit its flag.
    pub(crate) async fn handle_message(
        &mut self,
        message: &mut MailMessage,
    ) -> Result<Flag, ProcessingFailure> {
        let folder = self.folder.full_name().to_string();
        let processor = self.processor.clone();

        process_message(processor.as_ref(), &folder, message).await?;
        self.flag_message_processed(message).await
    }

    async fn flag_message_processed(
        &mut self,
        message: &mut MailMessage,
    ) -> Result<Flag, ProcessingFailure> {
        let flag = self.policy.processed_flag();
        self.folder
            .set_flag(message, flag.clone(), true)
            .await
            .map_err(ProcessingFailure::FlagCommit)?;

        tracing::debug!("Flagged {} as processed", message);
        Ok(flag)
    }
}
