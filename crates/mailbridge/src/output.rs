//! JSON sink: writes each structured email as JSON.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use mailbridge_mime::StructuredEmail;
use mailbridge_smtp::{Sink, SinkError};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Where serialized emails go.
enum Target {
    /// One JSON document per line on a shared writer.
    Lines(Mutex<Box<dyn AsyncWrite + Send + Unpin>>),
    /// One `.json` file per email in a directory.
    Directory(PathBuf),
}

/// Sink that serializes emails with `serde_json`.
///
/// Attachment content is written as base64.
pub struct JsonSink {
    target: Target,
    sequence: AtomicU64,
}

impl JsonSink {
    /// Writes one JSON line per email to standard output.
    pub fn stdout() -> Self {
        Self::lines(tokio::io::stdout())
    }

    /// Writes one JSON line per email to `writer`.
    pub fn lines(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            target: Target::Lines(Mutex::new(Box::new(writer))),
            sequence: AtomicU64::new(0),
        }
    }

    /// Writes one file per email into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub async fn directory(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            target: Target::Directory(dir),
            sequence: AtomicU64::new(0),
        })
    }

    fn file_name(&self, dir: &Path) -> PathBuf {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        dir.join(format!("{stamp}-{sequence:06}.json"))
    }
}

impl Sink for JsonSink {
    async fn send(&self, email: StructuredEmail) -> Result<(), SinkError> {
        let mut json = serde_json::to_vec(&email).map_err(SinkError::delivery)?;

        match &self.target {
            Target::Lines(writer) => {
                json.push(b'\n');
                let mut writer = writer.lock().await;
                writer.write_all(&json).await.map_err(SinkError::delivery)?;
                writer.flush().await.map_err(SinkError::delivery)?;
            }
            Target::Directory(dir) => {
                let path = self.file_name(dir);
                tokio::fs::write(&path, &json)
                    .await
                    .map_err(SinkError::delivery)?;
                tracing::debug!(path = %path.display(), "Wrote email");
            }
        }

        Ok(())
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
    use mailbridge_mime::{Attachment, EmailAddress};
    use tokio::io::AsyncReadExt;

    fn sample() -> StructuredEmail {
        StructuredEmail {
            to: vec![EmailAddress::parse("Jane Doe <jane@example.com>")],
            reply_to: Some(EmailAddress::new("replies@example.com")),
            subject: Some("Hi".to_string()),
            in_reply_to: vec!["<a@example.com>".to_string()],
            text: Some("Hello\r\n".to_string()),
            attachments: vec![Attachment {
                content: vec![0xde, 0xad, 0xbe, 0xef],
                content_type: Some("application/octet-stream".to_string()),
                ..Attachment::default()
            }],
            ..StructuredEmail::default()
        }
    }

    #[tokio::test]
    async fn test_lines_target() {
        let (writer, mut reader) = tokio::io::duplex(4096);
        let sink = JsonSink::lines(writer);

        sink.send(sample()).await.unwrap();
        drop(sink);

        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert!(out.ends_with('\n'));
        assert_eq!(out.lines().count(), 1);

        let json: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(json["subject"], "Hi");
        assert_eq!(json["to"][0]["name"], "Jane Doe ");
        assert_eq!(json["to"][0]["address"], "jane@example.com");
        assert_eq!(json["replyTo"]["address"], "replies@example.com");
        assert_eq!(json["inReplyTo"][0], "<a@example.com>");
        assert_eq!(json["text"], "Hello\r\n");
        assert!(json["html"].is_null());
        assert_eq!(json["attachments"][0]["content"], "3q2+7w==");
        assert_eq!(
            json["attachments"][0]["contentType"],
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_directory_target() {
        let dir = std::env::temp_dir().join(format!("mailbridge-test-{}", std::process::id()));
        let sink = JsonSink::directory(&dir).await.unwrap();

        sink.send(sample()).await.unwrap();
        sink.send(sample()).await.unwrap();

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("-000000.json"));
        assert!(names[1].ends_with("-000001.json"));

        let body = tokio::fs::read_to_string(dir.join(&names[0])).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["subject"], "Hi");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
