//! Per-connection SMTP command loop.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use super::reader::{DelimiterReader, ReadOutcome};
use crate::Result;
use crate::command::Command;
use crate::config::ServerConfig;
use crate::sink::Sink;
use crate::types::Reply;

/// Command line terminator.
const CRLF: &[u8] = b"\r\n";

/// End of a message body. The leading `CRLF` ends the last body line.
const DATA_TERMINATOR: &[u8] = b"\r\n.\r\n";

/// What the command loop does after one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command.
    Continue,
    /// Close the connection.
    Stop,
}

/// One client connection.
///
/// Commands are handled strictly in order: a reply is written only after
/// the command that triggered it, including any message body, has been
/// read in full.
pub struct Session<S, K> {
    reader: DelimiterReader<S>,
    sink: Arc<K>,
}

impl<S, K> Session<S, K>
where
    S: AsyncRead + AsyncWrite + Unpin,
    K: Sink,
{
    /// Creates a session over an accepted stream.
    pub fn new(stream: S, sink: Arc<K>, config: &ServerConfig) -> Self {
        Self {
            reader: DelimiterReader::with_limits(stream, config.read_chunk_size, config.idle_timeout),
            sink,
        }
    }

    /// Sends the greeting and runs the command loop until the client quits
    /// or disconnects.
    ///
    /// # Errors
    ///
    /// Returns the first error hit while handling a command. No further
    /// replies are attempted after an error.
    pub async fn run(mut self) -> Result<()> {
        self.reply(Reply::GREETING).await?;
        while self.step().await? == Flow::Continue {}
        Ok(())
    }

    /// Reads and handles one command.
    ///
    /// # Errors
    ///
    /// Returns transport, MIME and sink errors. Unrecognized commands are
    /// answered and are not errors.
    pub async fn step(&mut self) -> Result<Flow> {
        let line = match self.reader.read_until(CRLF).await? {
            ReadOutcome::Delimited(line) => line,
            ReadOutcome::Closed(rest) => {
                tracing::debug!(bytes = rest.len(), "Peer closed connection");
                return Ok(Flow::Stop);
            }
        };

        let command = Command::parse(&line);
        tracing::debug!(verb = command.verb(), "Command");

        match command {
            Command::Helo { hostname } => {
                tracing::debug!(%hostname, "Client introduced itself");
                self.reply(Reply::HELO).await?;
            }
            Command::Mail | Command::Rcpt | Command::Noop | Command::Rset => {
                self.reply(Reply::OK).await?;
            }
            Command::Data => return self.receive_message().await,
            Command::Quit => {
                self.reply(Reply::GOODBYE).await?;
                return Ok(Flow::Stop);
            }
            Command::Unrecognized { .. } => self.reply(Reply::NOT_RECOGNIZED).await?,
        }

        Ok(Flow::Continue)
    }

    async fn receive_message(&mut self) -> Result<Flow> {
        self.reply(Reply::START_DATA).await?;

        // The CRLF ending the DATA line also starts the first body line, so
        // an empty body is a bare ".\r\n".
        self.reader.push_front(CRLF);
        let payload = match self.reader.read_until(DATA_TERMINATOR).await? {
            ReadOutcome::Delimited(payload) => payload,
            ReadOutcome::Closed(rest) => {
                tracing::debug!(bytes = rest.len(), "Peer closed connection during DATA");
                return Ok(Flow::Stop);
            }
        };

        let message = message_bytes(&payload);
        let email = mailbridge_mime::parse_message(&message)?;
        tracing::info!(
            bytes = message.len(),
            recipients = email.to.len(),
            attachments = email.attachments.len(),
            "Message received"
        );

        self.sink.send(email).await?;
        self.reply(Reply::OK).await?;
        Ok(Flow::Continue)
    }

    async fn reply(&mut self, reply: Reply) -> Result<()> {
        tracing::trace!(%reply, "Reply");
        self.reader.write_all(&reply.to_bytes()).await
    }
}

/// Turns a DATA payload into message bytes.
///
/// `payload` is everything between the `CRLF` that ended the DATA line and
/// the terminator. Dot-stuffed lines are restored and the `CRLF` ending the
/// last line, which the terminator swallowed, is put back.
fn message_bytes(payload: &[u8]) -> Vec<u8> {
    if payload.is_empty() {
        return Vec::new();
    }

    let mut message = Vec::with_capacity(payload.len() + CRLF.len());
    let mut rest = payload;
    while let Some(pos) = rest.windows(4).position(|w| w == b"\r\n..") {
        message.extend_from_slice(&rest[..pos + 3]);
        rest = &rest[pos + 4..];
    }
    message.extend_from_slice(rest);

    if message.starts_with(CRLF) {
        message.drain(..CRLF.len());
    }
    message.extend_from_slice(CRLF);
    message
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::sink::{ChannelSink, SinkError};
    use mailbridge_mime::StructuredEmail;
    use tokio::sync::mpsc;
    use tokio_test::io::{Builder, Mock};

    fn session(mock: Mock) -> (Session<Mock, ChannelSink>, mpsc::Receiver<StructuredEmail>) {
        let (sink, rx) = ChannelSink::new(8);
        let config = ServerConfig::builder().idle_timeout(None).build();
        (Session::new(mock, Arc::new(sink), &config), rx)
    }

    /// Sink that always fails.
    struct DownSink;

    impl Sink for DownSink {
        async fn send(&self, _email: StructuredEmail) -> std::result::Result<(), SinkError> {
            Err(SinkError::delivery("backend down"))
        }
    }

    #[test]
    fn test_message_bytes_restores_last_line() {
        assert_eq!(
            message_bytes(b"\r\nSubject: Hi\r\n\r\nHello"),
            b"Subject: Hi\r\n\r\nHello\r\n"
        );
    }

    #[test]
    fn test_message_bytes_empty_and_blank() {
        assert_eq!(message_bytes(b""), b"");
        assert_eq!(message_bytes(b"\r\n"), b"\r\n");
    }

    #[test]
    fn test_message_bytes_unstuffs_dots() {
        assert_eq!(
            message_bytes(b"\r\n..leading\r\nmiddle..dots\r\n...\r\nend"),
            b".leading\r\nmiddle..dots\r\n..\r\nend\r\n"
        );
    }

    #[tokio::test]
    async fn test_full_scenario() {
        let mock = Builder::new()
            .write(b"220 Sandstorm SMTP Bridge\r\n")
            .read(b"HELO foo\r\n")
            .write(b"250 Sandstorm at your service\r\n")
            .read(b"MAIL FROM:<a@b.com>\r\n")
            .write(b"250 OK\r\n")
            .read(b"RCPT TO:<c@d.com>\r\n")
            .write(b"250 OK\r\n")
            .read(b"DATA\r\n")
            .write(b"354 Start mail input; end with <CRLF>.<CRLF>\r\n")
            .read(b"Subject: Hi\r\n\r\nHello\r\n.\r\n")
            .write(b"250 OK\r\n")
            .read(b"QUIT\r\n")
            .write(b"221 2.0.0 Goodbye!\r\n")
            .build();
        let (session, mut rx) = session(mock);

        session.run().await.unwrap();

        let email = rx.recv().await.unwrap();
        assert_eq!(email.subject.as_deref(), Some("Hi"));
        assert_eq!(email.text.as_deref(), Some("Hello\r\n"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unrecognized_command_keeps_session_open() {
        let mock = Builder::new()
            .write(b"220 Sandstorm SMTP Bridge\r\n")
            .read(b"FOOBAR\r\n")
            .write(b"502 5.5.2 Error: command not recognized\r\n")
            .read(b"NOOP\r\n")
            .write(b"250 OK\r\n")
            .build();
        let (session, _rx) = session(mock);

        // Stream ends after NOOP, which closes the session quietly.
        session.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_pipelined_commands_in_one_read() {
        let mock = Builder::new()
            .write(b"220 Sandstorm SMTP Bridge\r\n")
            .read(b"helo foo\r\nrset\r\nquit\r\n")
            .write(b"250 Sandstorm at your service\r\n")
            .write(b"250 OK\r\n")
            .write(b"221 2.0.0 Goodbye!\r\n")
            .build();
        let (session, _rx) = session(mock);
        session.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_data_split_across_reads() {
        let mock = Builder::new()
            .write(b"220 Sandstorm SMTP Bridge\r\n")
            .read(b"DATA\r\n")
            .write(b"354 Start mail input; end with <CRLF>.<CRLF>\r\n")
            .read(b"Subject: Parts\r\n\r\n..dot line\r\nmore\r")
            .read(b"\n.")
            .read(b"\r\nQUIT\r\n")
            .write(b"250 OK\r\n")
            .write(b"221 2.0.0 Goodbye!\r\n")
            .build();
        let (session, mut rx) = session(mock);

        session.run().await.unwrap();

        let email = rx.recv().await.unwrap();
        assert_eq!(email.subject.as_deref(), Some("Parts"));
        assert_eq!(email.text.as_deref(), Some(".dot line\r\nmore\r\n"));
    }

    #[tokio::test]
    async fn test_two_messages_in_one_session() {
        let mock = Builder::new()
            .write(b"220 Sandstorm SMTP Bridge\r\n")
            .read(b"DATA\r\n")
            .write(b"354 Start mail input; end with <CRLF>.<CRLF>\r\n")
            .read(b"Subject: One\r\n\r\n1\r\n.\r\n")
            .write(b"250 OK\r\n")
            .read(b"DATA\r\n")
            .write(b"354 Start mail input; end with <CRLF>.<CRLF>\r\n")
            .read(b"Subject: Two\r\n\r\n2\r\n.\r\n")
            .write(b"250 OK\r\n")
            .build();
        let (session, mut rx) = session(mock);

        session.run().await.unwrap();

        assert_eq!(rx.recv().await.unwrap().subject.as_deref(), Some("One"));
        assert_eq!(rx.recv().await.unwrap().subject.as_deref(), Some("Two"));
    }

    #[tokio::test]
    async fn test_partial_command_at_close_is_dropped() {
        // QUIT without its CRLF is never answered.
        let mock = Builder::new()
            .write(b"220 Sandstorm SMTP Bridge\r\n")
            .read(b"NOOP\r\nQU")
            .write(b"250 OK\r\n")
            .read(b"IT")
            .build();
        let (mut session, mut rx) = session(mock);

        session.reply(Reply::GREETING).await.unwrap();
        assert_eq!(session.step().await.unwrap(), Flow::Continue);
        assert_eq!(session.step().await.unwrap(), Flow::Stop);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_during_data_is_quiet() {
        let mock = Builder::new()
            .write(b"220 Sandstorm SMTP Bridge\r\n")
            .read(b"DATA\r\n")
            .write(b"354 Start mail input; end with <CRLF>.<CRLF>\r\n")
            .read(b"Subject: cut off\r\n")
            .build();
        let (session, mut rx) = session(mock);

        session.run().await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_bad_mime_ends_session_without_reply() {
        let mock = Builder::new()
            .write(b"220 Sandstorm SMTP Bridge\r\n")
            .read(b"DATA\r\n")
            .write(b"354 Start mail input; end with <CRLF>.<CRLF>\r\n")
            .read(b"Content-Type: image/png\r\n\r\nnot really\r\n.\r\n")
            .build();
        let (session, mut rx) = session(mock);

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, Error::Mime(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sink_failure_ends_session_without_reply() {
        let mock = Builder::new()
            .write(b"220 Sandstorm SMTP Bridge\r\n")
            .read(b"DATA\r\n")
            .write(b"354 Start mail input; end with <CRLF>.<CRLF>\r\n")
            .read(b"Subject: Hi\r\n\r\nHello\r\n.\r\n")
            .build();
        let session = Session::new(mock, Arc::new(DownSink), &ServerConfig::new());

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, Error::Sink(SinkError::Delivery(_))));
    }

    #[tokio::test]
    async fn test_read_error_ends_session() {
        let mock = Builder::new()
            .write(b"220 Sandstorm SMTP Bridge\r\n")
            .read_error(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
            .build();
        let (session, _rx) = session(mock);

        let err = session.run().await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_step_flow() {
        let mock = Builder::new()
            .read(b"NOOP\r\n")
            .write(b"250 OK\r\n")
            .read(b"QUIT\r\n")
            .write(b"221 2.0.0 Goodbye!\r\n")
            .build();
        let (mut session, _rx) = session(mock);

        assert_eq!(session.step().await.unwrap(), Flow::Continue);
        assert_eq!(session.step().await.unwrap(), Flow::Stop);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn dot_stuffing_round_trips(content in "[x.\r\n]{0,100}\r\n") {
                let mut stuffed = content.replace("\r\n.", "\r\n..");
                if stuffed.starts_with('.') {
                    stuffed.insert(0, '.');
                }

                // What the reader hands back: the pushed-front CRLF plus the
                // stuffed body minus the CRLF the terminator swallowed.
                let payload = format!("\r\n{}", &stuffed[..stuffed.len() - 2]);
                prop_assert_eq!(message_bytes(payload.as_bytes()), content.as_bytes());
            }
        }
    }
}
