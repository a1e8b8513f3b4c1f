//! Delivery of structured emails out of the session.

use std::future::Future;

use mailbridge_mime::StructuredEmail;
use tokio::sync::mpsc;

/// Error returned by a [`Sink`].
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The receiving side is gone.
    #[error("Sink closed")]
    Closed,

    /// Delivery failed downstream.
    #[error("Delivery failed: {0}")]
    Delivery(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SinkError {
    /// Wraps a downstream failure.
    pub fn delivery(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Delivery(err.into())
    }
}

/// Destination for assembled emails.
///
/// A session calls [`Sink::send`] once per accepted message, after the body
/// has been decomposed and before `250 OK` is sent. A failure closes the
/// session and is not retried. One sink is shared by every session.
pub trait Sink: Send + Sync + 'static {
    /// Delivers one email.
    fn send(&self, email: StructuredEmail) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Sink that forwards emails into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<StructuredEmail>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its emails arrive on.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<StructuredEmail>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Sink for ChannelSink {
    async fn send(&self, email: StructuredEmail) -> Result<(), SinkError> {
        self.tx.send(email).await.map_err(|_| SinkError::Closed)
    }
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

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new(4);
        let email = StructuredEmail {
            subject: Some("Hi".to_string()),
            ..StructuredEmail::default()
        };

        sink.send(email.clone()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), email);
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);

        let err = sink.send(StructuredEmail::default()).await.unwrap_err();
        assert!(matches!(err, SinkError::Closed));
    }

    #[test]
    fn test_delivery_error_display() {
        let err = SinkError::delivery("backend down");
        assert_eq!(err.to_string(), "Delivery failed: backend down");
    }
}
