//! Error types for SMTP sessions.

use std::io;
use std::time::Duration;

use crate::sink::SinkError;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// Every variant ends the session it occurred in. None of them reach the
/// acceptor or any other session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No bytes arrived within the idle timeout.
    #[error("Idle timeout after {0:?}")]
    Timeout(Duration),

    /// Submitted message could not be decomposed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailbridge_mime::Error),

    /// Sink rejected the structured email.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

impl Error {
    /// Returns true if the error came from the transport.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_))
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

    #[test]
    fn test_transport_errors() {
        assert!(Error::Timeout(Duration::from_secs(1)).is_transport());
        assert!(Error::from(io::Error::from(io::ErrorKind::ConnectionReset)).is_transport());
        assert!(!Error::from(SinkError::Closed).is_transport());
        assert!(!Error::from(mailbridge_mime::Error::Unparseable).is_transport());
    }

    #[test]
    fn test_display() {
        let err = Error::from(mailbridge_mime::Error::unhandled(Some("image/png")));
        assert_eq!(err.to_string(), "MIME error: Unhandled MIME part: image/png");
    }
}
