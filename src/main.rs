mod config;
mod consumer;
mod error;
mod mail;
mod processor;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use config::AppConfig;
use consumer::scheduler::PollScheduler;
use consumer::{LoggingFailureHandler, MailConsumer};
use mail::imap::ImapFolder;
use processor::spool::SpoolProcessor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!("mailpoll starting...");
    tracing::info!(
        "Mailbox: {}@{}:{}/{}",
        config.mail.username,
        config.mail.imap_host,
        config.mail.imap_port,
        config.mail.folder
    );
    tracing::info!(
        "Only unseen: {}, delete processed: {}",
        config.consumer.process_only_unseen_messages,
        config.consumer.delete_processed_messages
    );

    let processor = SpoolProcessor::new(config.spool.dir.clone());
    tokio::fs::create_dir_all(processor.dir()).await?;
    tracing::info!("Spooling messages to {}", processor.dir().display());

    let folder = ImapFolder::new(&config.mail);
    let consumer = MailConsumer::new(folder, config.poll_policy(), Arc::new(processor))
        .with_failure_handler(Arc::new(LoggingFailureHandler));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            signal.cancel();
        }
    });

    PollScheduler::new(consumer, config.schedule(), shutdown)
        .run()
        .await?;

    tracing::info!("mailpoll stopped");
    Ok(())
}
