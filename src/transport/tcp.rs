//! Socket setup
//!
//! Opens the TCP connection for a session and, when configured, wraps it in
//! TLS. Both variants expose the same byte-stream interface so the framing
//! layer does not care which one it runs over.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;

use crate::config::{Config, HostInfo};
use crate::error::{Error, Result};
use crate::transport::tls::{connect_tls, TlsConfig};

/// A connected socket, plain or TLS
pub enum SessionStream {
    /// Plain TCP connection
    Plain(TcpStream),
    /// TLS-encrypted connection
    Tls(Box<TlsStream<TcpStream>>),
}

impl SessionStream {
    /// Connect to `host` using the socket settings in `config`
    pub async fn connect(host: &HostInfo, config: &Config) -> Result<Self> {
        let addr = host.socket_addr();
        let tcp_stream = timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::ConnectionTimeout(config.connect_timeout))??;
        tcp_stream.set_nodelay(true)?;
        tracing::debug!(addr = %addr, tls = config.is_tls_enabled(), "Socket connected");

        if config.is_tls_enabled() {
            let tls_config = config.tls_config.clone().unwrap_or_else(TlsConfig::new);
            let tls_stream = connect_tls(tcp_stream, &host.host, &tls_config).await?;
            Ok(SessionStream::Tls(Box::new(tls_stream)))
        } else {
            Ok(SessionStream::Plain(tcp_stream))
        }
    }

    /// Check if this stream is TLS-encrypted
    pub fn is_tls(&self) -> bool {
        matches!(self, SessionStream::Tls(_))
    }
}

impl AsyncRead for SessionStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SessionStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            SessionStream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SessionStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            SessionStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            SessionStream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SessionStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            SessionStream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SessionStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            SessionStream::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_connect_refused_is_io_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config::new("127.0.0.1", port).connect_timeout(Duration::from_secs(2));
        let err = SessionStream::connect(&config.host, &config).await.err().unwrap();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_connect_plain() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = Config::new("127.0.0.1", port);
        let (stream, accepted) =
            tokio::join!(SessionStream::connect(&config.host, &config), listener.accept());
        assert!(!stream.unwrap().is_tls());
        assert!(accepted.is_ok());
    }
}
