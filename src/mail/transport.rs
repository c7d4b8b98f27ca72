use anyhow::{Context, Result};
use async_native_tls::TlsStream;
use futures::io::{AsyncRead, AsyncWrite};
use std::fmt;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

/// Byte stream carrying an IMAP session, with or without TLS.
pub enum ImapStream {
    Tls(TlsStream<Compat<TcpStream>>),
    Plain(Compat<TcpStream>),
}

impl ImapStream {
    /// Connect to `host:port`, negotiating TLS on the implicit-TLS ports.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let tcp = TcpStream::connect((host, port))
            .await
            .with_context(|| format!("Failed to connect to IMAP server {}:{}", host, port))?;

        if uses_implicit_tls(port) {
            tracing::debug!("Using IMAPS (TLS) for {}:{}", host, port);
            let tls = async_native_tls::TlsConnector::new();
            let stream = tls
                .connect(host, tcp.compat())
                .await
                .context("TLS handshake failed")?;
            Ok(ImapStream::Tls(stream))
        } else {
            tracing::debug!("Using plain IMAP for {}:{}", host, port);
            Ok(ImapStream::Plain(tcp.compat()))
        }
    }
}

pub fn uses_implicit_tls(port: u16) -> bool {
    port == 993 || port == 3993
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            ImapStream::Tls(s) => Pin::new(s).poll_read(cx, buf),
            ImapStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            ImapStream::Tls(s) => Pin::new(s).poll_write(cx, buf),
            ImapStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ImapStream::Tls(s) => Pin::new(s).poll_flush(cx),
            ImapStream::Plain(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ImapStream::Tls(s) => Pin::new(s).poll_close(cx),
            ImapStream::Plain(s) => Pin::new(s).poll_close(cx),
        }
    }
}

impl fmt::Debug for ImapStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImapStream::Tls(_) => write!(f, "ImapStream::Tls"),
            ImapStream::Plain(_) => write!(f, "ImapStream::Plain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_tls_ports() {
        assert!(uses_implicit_tls(993));
        assert!(uses_implicit_tls(3993));
        assert!(!uses_implicit_tls(143));
        assert!(!uses_implicit_tls(3143));
    }

    #[test]
    fn test_stream_is_send_without_unsafe_impl() {
        fn assert_send<T: Send>() {}
        assert_send::<ImapStream>();
        assert_send::<async_imap::Session<ImapStream>>();
    }
}
