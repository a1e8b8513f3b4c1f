//! Connection acceptor.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::Result;
use crate::config::ServerConfig;
use crate::connection::Session;
use crate::sink::Sink;

/// Pause after a failed `accept`, so a persistent error such as running out
/// of file descriptors does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// SMTP listener that runs one session task per accepted connection.
///
/// Sessions share nothing but the sink. The set of running sessions is kept
/// only to log the ones that fail or panic.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
}

impl Server {
    /// Binds the listener described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address cannot be bound.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        Ok(Self::from_listener(listener, config))
    }

    /// Wraps an already-bound listener.
    #[must_use]
    pub const fn from_listener(listener: TcpListener, config: ServerConfig) -> Self {
        Self { listener, config }
    }

    /// Accepts connections on `listener` until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the listener's address cannot be read.
    pub async fn serve<K: Sink>(listener: TcpListener, config: ServerConfig, sink: Arc<K>) -> Result<()> {
        Self::from_listener(listener, config).run(sink).await
    }

    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the listener's address cannot be read.
    pub async fn run<K: Sink>(self, sink: Arc<K>) -> Result<()> {
        self.run_until(sink, std::future::pending()).await
    }

    /// Accepts connections until `shutdown` completes, then aborts the
    /// sessions still running.
    ///
    /// An accept error is logged and the loop carries on after a short
    /// pause.
    ///
    /// # Errors
    ///
    /// Returns an error only if the listener's address cannot be read.
    pub async fn run_until<K, F>(self, sink: Arc<K>, shutdown: F) -> Result<()>
    where
        K: Sink,
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %self.local_addr()?, "SMTP bridge listening");

        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::info!(%peer, "Accepted connection");
                        let session = Session::new(stream, Arc::clone(&sink), &self.config);
                        sessions.spawn(
                            async move {
                                match session.run().await {
                                    Ok(()) => tracing::debug!("Session closed"),
                                    Err(e) if e.is_transport() => {
                                        tracing::info!(error = %e, "Session dropped");
                                    }
                                    Err(e) => tracing::warn!(error = %e, "Session failed"),
                                }
                            }
                            .instrument(tracing::info_span!("session", %peer)),
                        );
                    }
                    Err(e) => accept_failed(&e).await,
                },
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Session task panicked");
                    }
                }
            }
        }

        tracing::info!(sessions = sessions.len(), "SMTP bridge shutting down");
        sessions.shutdown().await;
        Ok(())
    }
}

async fn accept_failed(error: &std::io::Error) {
    tracing::warn!(error = %error, backoff = ?ACCEPT_BACKOFF, "Accept failed");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names,
)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    fn test_config() -> ServerConfig {
        ServerConfig::builder().port(0).build()
    }

    #[tokio::test]
    async fn test_bind_port_zero() {
        let server = Server::bind(test_config()).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_accept_error_backs_off() {
        let error = std::io::Error::from_raw_os_error(24);
        let started = std::time::Instant::now();
        accept_failed(&error).await;
        assert!(started.elapsed() >= ACCEPT_BACKOFF);
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let server = Server::bind(test_config()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (sink, _rx) = ChannelSink::new(1);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(server.run_until(Arc::new(sink), async {
            let _ = stop_rx.await;
        }));

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut greeting = [0u8; 27];
        client.read_exact(&mut greeting).await.unwrap();
        assert_eq!(&greeting, b"220 Sandstorm SMTP Bridge\r\n");

        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        // The open session was aborted along with the listener.
        let mut rest = Vec::new();
        client.write_all(b"NOOP\r\n").await.ok();
        let n = client.read_to_end(&mut rest).await.unwrap_or(0);
        assert_eq!(n, 0);
    }
}
