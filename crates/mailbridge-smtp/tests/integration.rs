//! Integration tests for the SMTP bridge.
//!
//! These tests bind a real listener on a free loopback port and talk to it
//! over TCP the way a mail client would.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;

use mailbridge_mime::StructuredEmail;
use mailbridge_smtp::{ChannelSink, Server, ServerConfig};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("mailbridge_smtp=debug")
        .try_init();
}

async fn start() -> (SocketAddr, mpsc::Receiver<StructuredEmail>) {
    init_tracing();

    let config = ServerConfig::builder()
        .port(0)
        .idle_timeout(Some(Duration::from_secs(5)))
        .build();
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (sink, rx) = ChannelSink::new(8);
    tokio::spawn(server.run(Arc::new(sink)));
    (addr, rx)
}

/// Line-oriented test client.
struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, write) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer: write,
        }
    }

    async fn send(&mut self, data: &[u8]) {
        self.writer.write_all(data).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line
    }

    async fn command(&mut self, data: &[u8]) -> String {
        self.send(data).await;
        self.line().await
    }

    async fn is_closed(&mut self) -> bool {
        let mut line = String::new();
        matches!(self.reader.read_line(&mut line).await, Ok(0) | Err(_))
    }
}

#[tokio::test]
async fn test_full_session() {
    let (addr, mut rx) = start().await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.line().await, "220 Sandstorm SMTP Bridge\r\n");
    assert_eq!(client.command(b"HELO foo\r\n").await, "250 Sandstorm at your service\r\n");
    assert_eq!(client.command(b"MAIL FROM:<a@b.com>\r\n").await, "250 OK\r\n");
    assert_eq!(client.command(b"RCPT TO:<c@d.com>\r\n").await, "250 OK\r\n");
    assert_eq!(
        client.command(b"DATA\r\n").await,
        "354 Start mail input; end with <CRLF>.<CRLF>\r\n"
    );
    assert_eq!(
        client.command(b"Subject: Hi\r\n\r\nHello\r\n.\r\n").await,
        "250 OK\r\n"
    );

    let email = rx.recv().await.unwrap();
    assert_eq!(email.subject.as_deref(), Some("Hi"));
    assert_eq!(email.text.as_deref(), Some("Hello\r\n"));

    assert_eq!(client.command(b"QUIT\r\n").await, "221 2.0.0 Goodbye!\r\n");
    assert!(client.is_closed().await);
}

#[tokio::test]
async fn test_unrecognized_command() {
    let (addr, _rx) = start().await;
    let mut client = Client::connect(addr).await;

    client.line().await;
    assert_eq!(
        client.command(b"FOOBAR\r\n").await,
        "502 5.5.2 Error: command not recognized\r\n"
    );
    assert_eq!(client.command(b"NOOP\r\n").await, "250 OK\r\n");
}

#[tokio::test]
async fn test_byte_at_a_time_client() {
    let (addr, mut rx) = start().await;
    let mut client = Client::connect(addr).await;

    client.line().await;
    for byte in b"DATA\r\n" {
        client.send(&[*byte]).await;
    }
    assert_eq!(
        client.line().await,
        "354 Start mail input; end with <CRLF>.<CRLF>\r\n"
    );

    let body = concat!(
        "From: Jane <jane@example.com>\r\n",
        "To: bob@example.com, carol@example.com\r\n",
        "Subject: Slow\r\n",
        "\r\n",
        "one byte at a time\r\n",
        ".\r\n"
    );
    for byte in body.as_bytes() {
        client.send(&[*byte]).await;
    }
    assert_eq!(client.line().await, "250 OK\r\n");

    let email = rx.recv().await.unwrap();
    assert_eq!(email.subject.as_deref(), Some("Slow"));
    assert_eq!(email.to.len(), 2);
    assert_eq!(email.from.unwrap().address, "jane@example.com");
    assert_eq!(email.text.as_deref(), Some("one byte at a time\r\n"));
}

#[tokio::test]
async fn test_multipart_with_attachment() {
    let (addr, mut rx) = start().await;
    let mut client = Client::connect(addr).await;

    client.line().await;
    client.command(b"DATA\r\n").await;
    let body = concat!(
        "Subject: Report\r\n",
        "Content-Type: multipart/mixed; boundary=\"B\"\r\n",
        "\r\n",
        "--B\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "See attached.\r\n",
        "--B\r\n",
        "Content-Type: text/html\r\n",
        "\r\n",
        "<p>See attached.</p>\r\n",
        "--B\r\n",
        "Content-Type: application/octet-stream\r\n",
        "Content-Disposition: attachment; filename=\"r.bin\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "3q2+7w==\r\n",
        "--B--\r\n",
        ".\r\n"
    );
    assert_eq!(client.command(body.as_bytes()).await, "250 OK\r\n");

    let email = rx.recv().await.unwrap();
    assert!(email.text.is_some());
    assert!(email.html.is_some());
    assert_eq!(email.attachments.len(), 1);
    assert_eq!(email.attachments[0].content, vec![0xde, 0xad, 0xbe, 0xef]);
}

#[tokio::test]
async fn test_failed_session_does_not_affect_others() {
    let (addr, mut rx) = start().await;

    let mut broken = Client::connect(addr).await;
    let mut healthy = Client::connect(addr).await;
    broken.line().await;
    healthy.line().await;

    broken.command(b"DATA\r\n").await;
    broken
        .send(b"Content-Type: image/png\r\n\r\nnot text\r\n.\r\n")
        .await;
    assert!(broken.is_closed().await);

    assert_eq!(healthy.command(b"HELO bar\r\n").await, "250 Sandstorm at your service\r\n");
    healthy.command(b"DATA\r\n").await;
    assert_eq!(
        healthy.command(b"Subject: Still here\r\n\r\nok\r\n.\r\n").await,
        "250 OK\r\n"
    );
    assert_eq!(
        rx.recv().await.unwrap().subject.as_deref(),
        Some("Still here")
    );
}

#[tokio::test]
async fn test_client_disconnect_is_quiet() {
    let (addr, _rx) = start().await;

    let mut client = Client::connect(addr).await;
    client.line().await;
    drop(client);

    // The listener keeps accepting.
    let mut next = Client::connect(addr).await;
    assert_eq!(next.line().await, "220 Sandstorm SMTP Bridge\r\n");
}
