use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::ConsumerError;
use crate::mail::MailFolder;

use super::MailConsumer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Wait before the first poll
    pub initial_delay: Duration,
    /// Interval between polls
    pub delay: Duration,
    /// Measure `delay` from the end of a poll rather than from its start
    pub use_fixed_delay: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            delay: Duration::from_millis(60_000),
            use_fixed_delay: false,
        }
    }
}

/// Drives a consumer on a timer until cancelled.
///
/// Each poll is awaited before the next tick is armed, so cycles never
/// overlap. Cancellation is only observed between polls.
pub struct PollScheduler<F: MailFolder> {
    consumer: MailConsumer<F>,
    config: ScheduleConfig,
    shutdown: CancellationToken,
}

impl<F: MailFolder> PollScheduler<F> {
    pub fn new(
        consumer: MailConsumer<F>,
        config: ScheduleConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            consumer,
            config,
            shutdown,
        }
    }

    /// Start the consumer, poll until shutdown, then stop it.
    /// Returns the stopped consumer.
    pub async fn run(mut self) -> Result<MailConsumer<F>, ConsumerError> {
        self.consumer.start()?;
        let policy = self.consumer.policy();
        tracing::info!(
            "Polling {} every {:?} (initial delay {:?}, fixed delay: {}, only unseen: {}, mark processed {})",
            self.consumer.folder().full_name(),
            self.config.delay,
            self.config.initial_delay,
            self.config.use_fixed_delay,
            policy.process_only_unseen_messages,
            policy.processed_flag()
        );

        let period = self.config.delay.max(Duration::from_millis(1));
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.config.initial_delay, period);
        // A slow poll pushes the schedule back instead of causing a burst.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.poll_once().await;

            if self.config.use_fixed_delay {
                ticker.reset();
            }
        }

        tracing::info!("Shutting down poller for {}", self.consumer.folder().full_name());
        self.consumer.stop().await?;
        Ok(self.consumer)
    }

    async fn poll_once(&mut self) {
        match self.consumer.poll().await {
            Ok(report) if report.fetched > 0 || !report.removed.is_empty() => {
                tracing::info!(
                    "Polled {}: {} fetched, {} processed, {} skipped, {} failed, {} removed",
                    report.folder,
                    report.fetched,
                    report.processed(),
                    report.skipped(),
                    report.failed(),
                    report.removed.len()
                );
            }
            Ok(report) => {
                tracing::debug!("Polled {}: nothing to do", report.folder);
            }
            Err(e) if e.is_connection() => {
                tracing::warn!("Poll failed, retrying in {:?}: {}", self.config.delay, e);
            }
            Err(e) => {
                tracing::error!("Poll rejected: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::{ConsumerState, MailExchange, PollPolicy, Processor};
    use crate::mail::memory::MemoryFolder;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Processor for Counting {
        async fn process(&self, _exchange: &MailExchange<'_>) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn consumer(folder: MemoryFolder, processor: Arc<Counting>) -> MailConsumer<MemoryFolder> {
        let policy = PollPolicy {
            process_only_unseen_messages: true,
            delete_processed_messages: false,
        };
        MailConsumer::new(folder, policy, processor)
    }

    #[tokio::test]
    async fn test_polls_until_cancelled() {
        let mut folder = MemoryFolder::new("INBOX");
        folder.push(b"Subject: hello\r\n\r\nbody", &[]);
        let processor = Arc::new(Counting::default());

        let config = ScheduleConfig {
            initial_delay: Duration::ZERO,
            delay: Duration::from_millis(10),
            use_fixed_delay: false,
        };
        let shutdown = CancellationToken::new();
        let scheduler = PollScheduler::new(
            consumer(folder, processor.clone()),
            config,
            shutdown.clone(),
        );
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown.cancel();
        let consumer = handle.await.unwrap().unwrap();

        assert_eq!(consumer.state(), ConsumerState::Stopped);
        let folder = consumer.folder();
        assert!(folder.open_calls >= 2);
        assert_eq!(folder.open_calls, folder.close_calls);
        assert!(!folder.is_open());
        // Only unseen messages are fetched, so the message is handled once.
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_polls_are_retried() {
        let mut folder = MemoryFolder::new("INBOX");
        folder.fail_open = true;
        let processor = Arc::new(Counting::default());

        let config = ScheduleConfig {
            initial_delay: Duration::ZERO,
            delay: Duration::from_millis(10),
            use_fixed_delay: true,
        };
        let shutdown = CancellationToken::new();
        let scheduler = PollScheduler::new(consumer(folder, processor), config, shutdown.clone());
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown.cancel();
        let consumer = handle.await.unwrap().unwrap();

        assert!(consumer.folder().open_calls >= 2);
        assert_eq!(consumer.folder().close_calls, 0);
    }

    #[tokio::test]
    async fn test_cancel_before_first_poll() {
        let processor = Arc::new(Counting::default());
        let config = ScheduleConfig {
            initial_delay: Duration::from_secs(3600),
            ..ScheduleConfig::default()
        };
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let consumer = PollScheduler::new(
            consumer(MemoryFolder::new("INBOX"), processor),
            config,
            shutdown,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(consumer.folder().open_calls, 0);
        assert_eq!(consumer.state(), ConsumerState::Stopped);
    }
}
