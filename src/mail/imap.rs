use anyhow::{Context, Result};
use async_imap::types::{Fetch, Mailbox, UnsolicitedResponse};
use async_imap::Session;
use async_trait::async_trait;
use futures::StreamExt;

use super::flags::{Flag, FlagSet, FlagTerm};
use super::folder::{MailFolder, MessageCount, OpenMode};
use super::message::MailMessage;
use super::transport::ImapStream;
use crate::config::MailConfig;

/// Fetch items for a full message. `BODY.PEEK` keeps the server from
/// setting `\Seen` as a side effect of the fetch.
const FETCH_ITEMS: &str = "(UID FLAGS RFC822.SIZE BODY.PEEK[])";

/// One IMAP mailbox, reached over a lazily established session.
///
/// The session outlives individual open/close cycles and is revalidated with
/// NOOP before reuse. The message count comes from the EXISTS figure of the
/// selection, kept current from the server's EXISTS and EXPUNGE notices.
pub struct ImapFolder {
    host: String,
    port: u16,
    username: String,
    password: String,
    name: String,
    session: Option<Session<ImapStream>>,
    mode: Option<OpenMode>,
    exists: u32,
    removed: Vec<u32>,
}

impl ImapFolder {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            host: config.imap_host.clone(),
            port: config.imap_port,
            username: config.username.clone(),
            password: config.password.clone(),
            name: config.folder.clone(),
            session: None,
            mode: None,
            exists: 0,
            removed: Vec::new(),
        }
    }

    /// Establish a new IMAP connection
    async fn connect(&self) -> Result<Session<ImapStream>> {
        tracing::info!("Connecting to IMAP {}:{}", self.host, self.port);

        let stream = ImapStream::connect(&self.host, self.port).await?;
        let client = async_imap::Client::new(stream);

        let session = client
            .login(&self.username, &self.password)
            .await
            .map_err(|(err, _)| err)
            .context("IMAP login failed")?;

        tracing::info!("IMAP login successful for {}", self.username);
        Ok(session)
    }

    /// Reconnect if the session is missing or stale
    async fn ensure_session(&mut self) -> Result<()> {
        let needs_reconnect = match self.session.as_mut() {
            Some(session) => session.noop().await.is_err(),
            None => true,
        };

        if needs_reconnect {
            if self.session.is_some() {
                tracing::info!("Reconnecting IMAP session...");
            }
            self.mode = None;
            self.session = None;
            let session = self.connect().await?;
            self.session = Some(session);
        }

        Ok(())
    }

    fn session(&mut self) -> Result<&mut Session<ImapStream>> {
        self.session.as_mut().context("No IMAP session")
    }

    /// Apply EXISTS and EXPUNGE notifications the server sent alongside
    /// other responses.
    fn collect_unsolicited(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };

        while let Ok(response) = session.unsolicited_responses.try_recv() {
            match response {
                UnsolicitedResponse::Expunge(number) => {
                    self.removed.push(number);
                    self.exists = self.exists.saturating_sub(1);
                }
                UnsolicitedResponse::Exists(count) => self.exists = count,
                _ => {}
            }
        }
    }

    /// The session died underneath us; forget it so the next open reconnects.
    fn drop_session(&mut self) {
        self.mode = None;
        self.session = None;
    }

    async fn fetch_sequence(&mut self, sequence: &str) -> Result<Vec<MailMessage>> {
        let session = self.session()?;

        let mut fetch_stream = session
            .fetch(sequence, FETCH_ITEMS)
            .await
            .context("IMAP FETCH failed")?;

        let mut messages = Vec::new();
        while let Some(result) = fetch_stream.next().await {
            let fetch = result.context("Error fetching message")?;
            messages.push(message_from_fetch(&fetch));
        }
        drop(fetch_stream);

        self.collect_unsolicited();
        Ok(messages)
    }
}

fn message_from_fetch(fetch: &Fetch) -> MailMessage {
    let flags: FlagSet = fetch.flags().map(|flag| Flag::from(&flag)).collect();
    let content = fetch.body().map(|body| body.to_vec()).unwrap_or_default();

    let message = MailMessage::new(fetch.message, content).with_flags(flags);
    match fetch.uid {
        Some(uid) => message.with_uid(uid),
        None => message,
    }
}

fn sequence_set(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

async fn select_mailbox(
    session: &mut Session<ImapStream>,
    name: &str,
    mode: OpenMode,
) -> Result<Mailbox> {
    match mode {
        OpenMode::ReadWrite => session.select(name).await,
        OpenMode::ReadOnly => session.examine(name).await,
    }
    .with_context(|| format!("Failed to open folder {} {:?}", name, mode))
}

async fn close_selected(
    session: &mut Session<ImapStream>,
    name: &str,
    mode: OpenMode,
    expunge: bool,
) -> Result<()> {
    // CLOSE only expunges a mailbox that was SELECTed; re-selecting it
    // read-only first makes CLOSE a plain deselect.
    if !expunge && mode == OpenMode::ReadWrite {
        select_mailbox(session, name, OpenMode::ReadOnly).await?;
    }

    session.close().await.context("IMAP CLOSE failed")
}

#[async_trait]
impl MailFolder for ImapFolder {
    fn full_name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.mode.is_some() && self.session.is_some()
    }

    async fn open(&mut self, mode: OpenMode) -> Result<()> {
        self.ensure_session().await?;

        let name = self.name.clone();
        let session = self.session()?;
        let mailbox = select_mailbox(session, &name, mode).await?;

        self.mode = Some(mode);
        self.exists = mailbox.exists;
        self.collect_unsolicited();

        tracing::debug!(
            "Folder {} opened {:?} ({} messages)",
            name,
            mode,
            self.exists
        );
        Ok(())
    }

    async fn close(&mut self, expunge: bool) -> Result<()> {
        let Some(mode) = self.mode.take() else {
            return Ok(());
        };
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        let result = close_selected(session, &self.name, mode, expunge).await;
        match &result {
            Ok(()) => {
                self.collect_unsolicited();
                tracing::debug!("Folder {} closed (expunge: {})", self.name, expunge);
            }
            Err(_) => self.drop_session(),
        }
        result
    }

    async fn message_count(&mut self) -> Result<MessageCount> {
        if !self.is_open() {
            return Ok(MessageCount::Closed);
        }

        // NOOP lets the server deliver pending EXISTS/EXPUNGE updates; a
        // session that cannot answer it has lost the folder.
        let session = self.session()?;
        if let Err(e) = session.noop().await {
            tracing::warn!("IMAP connection lost while counting {}: {}", self.name, e);
            self.drop_session();
            return Ok(MessageCount::Closed);
        }

        self.collect_unsolicited();
        Ok(MessageCount::Available(self.exists))
    }

    async fn messages(&mut self) -> Result<Vec<MailMessage>> {
        self.fetch_sequence("1:*").await
    }

    async fn search(&mut self, term: &FlagTerm) -> Result<Vec<MailMessage>> {
        let query = term.to_imap_query();
        let session = self.session()?;

        // SEARCH answers with an unordered set; restore folder order.
        let mut numbers: Vec<u32> = session
            .search(&query)
            .await
            .with_context(|| format!("IMAP SEARCH {} failed", query))?
            .into_iter()
            .collect();
        numbers.sort_unstable();

        if numbers.is_empty() {
            return Ok(Vec::new());
        }

        self.fetch_sequence(&sequence_set(&numbers)).await
    }

    async fn set_flag(
        &mut self,
        message: &mut MailMessage,
        flag: Flag,
        value: bool,
    ) -> Result<()> {
        let action = if value { "+FLAGS.SILENT" } else { "-FLAGS.SILENT" };
        let query = format!("{} ({})", action, flag.imap_name());
        let session = self.session()?;

        let responses: Vec<_> = match message.uid {
            Some(uid) => {
                session
                    .uid_store(uid.to_string(), &query)
                    .await
                    .context("IMAP UID STORE failed")?
                    .collect()
                    .await
            }
            None => {
                session
                    .store(message.number.to_string(), &query)
                    .await
                    .context("IMAP STORE failed")?
                    .collect()
                    .await
            }
        };

        for response in responses {
            response.context("Error in STORE response")?;
        }

        self.collect_unsolicited();
        message.flags.set(flag, value);
        Ok(())
    }

    fn take_removed(&mut self) -> Vec<u32> {
        self.collect_unsolicited();
        std::mem::take(&mut self.removed)
    }
}
