use std::path::PathBuf;
use std::time::Duration;

use crate::consumer::scheduler::ScheduleConfig;
use crate::consumer::PollPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mail: MailConfig,
    pub consumer: ConsumerConfig,
    pub spool: SpoolConfig,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub username: String,
    pub password: String,
    pub folder: String,
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub process_only_unseen_messages: bool,
    pub delete_processed_messages: bool,
    pub initial_delay_ms: u64,
    pub delay_ms: u64,
    pub use_fixed_delay: bool,
}

#[derive(Debug, Clone)]
pub struct SpoolConfig {
    pub dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            mail: MailConfig {
                imap_host: std::env::var("MAIL_IMAP_HOST")
                    .unwrap_or_else(|_| "localhost".to_string()),
                imap_port: std::env::var("MAIL_IMAP_PORT")
                    .unwrap_or_else(|_| "993".to_string())
                    .parse()?,
                username: std::env::var("MAIL_USERNAME")?,
                password: std::env::var("MAIL_PASSWORD").unwrap_or_else(|_| String::new()),
                folder: std::env::var("MAIL_FOLDER").unwrap_or_else(|_| "INBOX".to_string()),
            },
            consumer: ConsumerConfig {
                process_only_unseen_messages: std::env::var("CONSUMER_PROCESS_ONLY_UNSEEN")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                delete_processed_messages: std::env::var("CONSUMER_DELETE_PROCESSED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()?,
                initial_delay_ms: std::env::var("CONSUMER_INITIAL_DELAY_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()?,
                delay_ms: std::env::var("CONSUMER_DELAY_MS")
                    .unwrap_or_else(|_| "60000".to_string())
                    .parse()?,
                use_fixed_delay: std::env::var("CONSUMER_USE_FIXED_DELAY")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()?,
            },
            spool: SpoolConfig {
                dir: PathBuf::from(
                    std::env::var("SPOOL_DIR").unwrap_or_else(|_| "./spool".to_string()),
                ),
            },
        })
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            process_only_unseen_messages: self.consumer.process_only_unseen_messages,
            delete_processed_messages: self.consumer.delete_processed_messages,
        }
    }

    pub fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            initial_delay: Duration::from_millis(self.consumer.initial_delay_ms),
            delay: Duration::from_millis(self.consumer.delay_ms),
            use_fixed_delay: self.consumer.use_fixed_delay,
        }
    }
}
