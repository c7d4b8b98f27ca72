use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::consumer::{MailExchange, Processor};

/// Sidecar written next to every spooled message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoolRecord {
    pub exchange_id: Uuid,
    pub folder: String,
    pub message_number: u32,
    pub uid: Option<u32>,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub date: Option<String>,
    pub size: u64,
    /// SHA256 of the raw message
    pub sha256: String,
    pub received_at: DateTime<Utc>,
}

/// Writes each message to `<dir>/<YYYY-MM-DD>/<exchange id>.eml` with a
/// JSON sidecar of the same name.
pub struct SpoolProcessor {
    dir: PathBuf,
}

impl SpoolProcessor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record(exchange: &MailExchange<'_>) -> SpoolRecord {
        let message = exchange.message();
        let mut hasher = Sha256::new();
        hasher.update(&message.content);

        SpoolRecord {
            exchange_id: exchange.id(),
            folder: exchange.folder().to_string(),
            message_number: message.number,
            uid: message.uid,
            subject: exchange.header("Subject"),
            from: exchange.header("From"),
            date: exchange.header("Date"),
            size: message.size() as u64,
            sha256: hex::encode(hasher.finalize()),
            received_at: exchange.created_at(),
        }
    }
}

#[async_trait]
impl Processor for SpoolProcessor {
    async fn process(&self, exchange: &MailExchange<'_>) -> Result<()> {
        let record = Self::record(exchange);

        let day_dir = self
            .dir
            .join(record.received_at.format("%Y-%m-%d").to_string());
        tokio::fs::create_dir_all(&day_dir)
            .await
            .with_context(|| format!("Failed to create spool directory {}", day_dir.display()))?;

        let eml_path = day_dir.join(format!("{}.eml", record.exchange_id));
        tokio::fs::write(&eml_path, &exchange.message().content)
            .await
            .with_context(|| format!("Failed to write {}", eml_path.display()))?;

        let json = serde_json::to_vec_pretty(&record).context("Failed to serialize spool record")?;
        let json_path = day_dir.join(format!("{}.json", record.exchange_id));
        tokio::fs::write(&json_path, json)
            .await
            .with_context(|| format!("Failed to write {}", json_path.display()))?;

        tracing::info!(
            "Spooled message #{} from {} ({} bytes, subject: {})",
            record.message_number,
            record.folder,
            record.size,
            record.subject.as_deref().unwrap_or("<none>")
        );
        Ok(())
    }
}
