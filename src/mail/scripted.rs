//! Scripted IMAP server for exercising `ImapFolder` over a real socket.
//!
//! The server accepts one plain-text connection, greets it, and answers each
//! tagged command from a list of `(prefix, reply)` rules. Commands without a
//! matching rule get a bare tagged OK. Every command is recorded without its
//! tag.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1] scripted server ready\r\n";

pub enum Reply {
    /// Raw response text; `{tag}` is replaced by the command's tag
    Send(String),
    /// Drop the connection without answering
    Hangup,
}

impl Reply {
    pub fn send(text: impl Into<String>) -> Self {
        Reply::Send(text.into())
    }
}

pub struct ScriptedServer {
    port: u16,
    commands: Arc<Mutex<Vec<String>>>,
}

impl ScriptedServer {
    pub async fn start(rules: Vec<(&'static str, Reply)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let log = commands.clone();

        tokio::spawn(async move {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let (read, mut write) = socket.into_split();
            if write.write_all(GREETING).await.is_err() {
                return;
            }

            let mut lines = BufReader::new(read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let (tag, command) = line.split_once(' ').unwrap_or((line.as_str(), ""));
                log.lock().unwrap().push(command.to_string());

                let rule = rules
                    .iter()
                    .find(|(prefix, _)| command.starts_with(*prefix))
                    .map(|(_, reply)| reply);
                let text = match rule {
                    Some(Reply::Hangup) => return,
                    Some(Reply::Send(text)) => text.replace("{tag}", tag),
                    None => {
                        let verb = command.split(' ').next().unwrap_or_default();
                        format!("{} OK {} completed\r\n", tag, verb)
                    }
                };
                if write.write_all(text.as_bytes()).await.is_err() {
                    return;
                }
            }
        });

        Self { port, commands }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Commands received so far, tags stripped
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// First word of every command received so far
    pub fn verbs(&self) -> Vec<String> {
        self.commands()
            .iter()
            .map(|c| c.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }
}
