//! Delimiter-framed reading over a byte stream.
//!
//! SMTP frames commands with `CRLF` and message bodies with `CRLF.CRLF`.
//! Neither lines up with socket reads, so bytes read past a delimiter are
//! kept as residual and served first on the next call.

#![allow(clippy::missing_errors_doc)]

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::DEFAULT_READ_CHUNK_SIZE;
use crate::{Error, Result};

/// Result of one [`DelimiterReader::read_until`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes before the delimiter. The delimiter itself is consumed.
    Delimited(Bytes),
    /// The peer closed the stream before a delimiter arrived. Holds every
    /// byte accumulated so far, possibly none.
    Closed(Bytes),
}

/// Reads delimiter-terminated segments from a stream.
///
/// Each socket read asks for at most `chunk_size` bytes and, when an idle
/// timeout is set, fails with [`Error::Timeout`] if nothing arrives in time.
pub struct DelimiterReader<S> {
    stream: S,
    residual: BytesMut,
    chunk_size: usize,
    idle_timeout: Option<Duration>,
}

impl<S> DelimiterReader<S>
where
    S: AsyncRead + Unpin,
{
    /// Creates a reader with the default chunk size and no idle timeout.
    pub fn new(stream: S) -> Self {
        Self::with_limits(stream, DEFAULT_READ_CHUNK_SIZE, None)
    }

    /// Creates a reader with an explicit chunk size and idle timeout.
    pub fn with_limits(stream: S, chunk_size: usize, idle_timeout: Option<Duration>) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            stream,
            residual: BytesMut::with_capacity(chunk_size),
            chunk_size,
            idle_timeout,
        }
    }

    /// Reads until `delimiter` and returns the bytes before it.
    ///
    /// The delimiter may straddle any number of socket reads. Bytes after
    /// it stay buffered for the next call.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `delimiter` is empty.
    pub async fn read_until(&mut self, delimiter: &[u8]) -> Result<ReadOutcome> {
        debug_assert!(!delimiter.is_empty(), "delimiter must not be empty");

        let mut scan_from = 0;
        loop {
            if let Some(pos) = find(&self.residual[scan_from..], delimiter) {
                let end = scan_from + pos;
                let mut segment = self.residual.split_to(end + delimiter.len());
                segment.truncate(end);
                return Ok(ReadOutcome::Delimited(segment.freeze()));
            }

            // A partial delimiter may sit at the tail, so rescan that much.
            scan_from = self
                .residual
                .len()
                .saturating_sub(delimiter.len().saturating_sub(1));

            if self.fill().await? == 0 {
                return Ok(ReadOutcome::Closed(self.residual.split().freeze()));
            }
        }
    }

    /// Puts bytes back in front of the residual buffer.
    pub fn push_front(&mut self, bytes: &[u8]) {
        let mut buffer = BytesMut::with_capacity(bytes.len() + self.residual.len());
        buffer.extend_from_slice(bytes);
        buffer.extend_from_slice(&self.residual);
        self.residual = buffer;
    }

    /// Reads at most one chunk from the stream into the residual buffer.
    async fn fill(&mut self) -> Result<usize> {
        let start = self.residual.len();
        self.residual.resize(start + self.chunk_size, 0);

        let read = self.stream.read(&mut self.residual[start..]);
        let result = match self.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, read).await {
                Ok(read) => read.map_err(Error::from),
                Err(_) => Err(Error::Timeout(limit)),
            },
            None => read.await.map_err(Error::from),
        };

        let n = *result.as_ref().unwrap_or(&0);
        self.residual.truncate(start + n);
        result
    }
}

impl<S> DelimiterReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Writes bytes to the stream and flushes.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

/// Finds the first occurrence of `needle` in `haystack`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
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
    use tokio_test::io::Builder;

    const CRLF: &[u8] = b"\r\n";
    const DATA_END: &[u8] = b"\r\n.\r\n";

    fn delimited(bytes: &[u8]) -> ReadOutcome {
        ReadOutcome::Delimited(Bytes::copy_from_slice(bytes))
    }

    fn closed(bytes: &[u8]) -> ReadOutcome {
        ReadOutcome::Closed(Bytes::copy_from_slice(bytes))
    }

    #[test]
    fn test_find() {
        assert_eq!(find(b"hello\r\n", CRLF), Some(5));
        assert_eq!(find(b"\r\n", CRLF), Some(0));
        assert_eq!(find(b"no newline", CRLF), None);
        assert_eq!(find(b"a\r\n.\r\nb", DATA_END), Some(1));
        assert_eq!(find(b"", CRLF), None);
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"HELO foo\r\n").build();
        let mut reader = DelimiterReader::new(mock);

        assert_eq!(reader.read_until(CRLF).await.unwrap(), delimited(b"HELO foo"));
        assert_eq!(reader.read_until(CRLF).await.unwrap(), closed(b""));
    }

    #[tokio::test]
    async fn test_residual_serves_next_call() {
        let mock = Builder::new().read(b"NOOP\r\nQUIT\r\nPART").build();
        let mut reader = DelimiterReader::new(mock);

        assert_eq!(reader.read_until(CRLF).await.unwrap(), delimited(b"NOOP"));
        assert_eq!(reader.read_until(CRLF).await.unwrap(), delimited(b"QUIT"));
        assert_eq!(reader.read_until(CRLF).await.unwrap(), closed(b"PART"));
    }

    #[tokio::test]
    async fn test_delimiter_split_across_reads() {
        let mock = Builder::new()
            .read(b"Subject: Hi\r\n\r\nHello\r")
            .read(b"\n.")
            .read(b"\r")
            .read(b"\nQUIT\r\n")
            .build();
        let mut reader = DelimiterReader::new(mock);

        assert_eq!(
            reader.read_until(DATA_END).await.unwrap(),
            delimited(b"Subject: Hi\r\n\r\nHello")
        );
        assert_eq!(reader.read_until(CRLF).await.unwrap(), delimited(b"QUIT"));
    }

    #[tokio::test]
    async fn test_small_chunks() {
        let mock = Builder::new().read(b"MAIL FROM:<a@b.com>\r\n").build();
        let mut reader = DelimiterReader::with_limits(mock, 3, None);

        assert_eq!(
            reader.read_until(CRLF).await.unwrap(),
            delimited(b"MAIL FROM:<a@b.com>")
        );
        assert_eq!(reader.read_until(CRLF).await.unwrap(), closed(b""));
    }

    #[tokio::test]
    async fn test_push_front() {
        let mock = Builder::new().read(b".\r\n").build();
        let mut reader = DelimiterReader::new(mock);

        reader.push_front(CRLF);
        assert_eq!(reader.read_until(DATA_END).await.unwrap(), delimited(b""));
    }

    #[tokio::test]
    async fn test_read_error() {
        let mock = Builder::new()
            .read(b"HEL")
            .read_error(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
            .build();
        let mut reader = DelimiterReader::new(mock);

        let err = reader.read_until(CRLF).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        // Bytes read before the error are kept.
        assert_eq!(reader.read_until(CRLF).await.unwrap(), closed(b"HEL"));
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let mock = Builder::new().wait(Duration::from_millis(500)).build();
        let mut reader = DelimiterReader::with_limits(mock, 1024, Some(Duration::from_millis(20)));

        let err = reader.read_until(CRLF).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_write_all() {
        let mock = Builder::new().write(b"250 OK\r\n").build();
        let mut reader = DelimiterReader::new(mock);
        reader.write_all(b"250 OK\r\n").await.unwrap();
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        /// Splits the input at every delimiter, as one big read would.
        fn reference(input: &[u8], delimiter: &[u8]) -> Vec<ReadOutcome> {
            let mut outcomes = Vec::new();
            let mut rest = input;
            while let Some(pos) = find(rest, delimiter) {
                outcomes.push(delimited(&rest[..pos]));
                rest = &rest[pos + delimiter.len()..];
            }
            outcomes.push(closed(rest));
            outcomes
        }

        fn read_all(
            input: &[u8],
            cuts: &[usize],
            chunk_size: usize,
            delimiter: &[u8],
        ) -> Vec<ReadOutcome> {
            let mut cuts: Vec<usize> = cuts.iter().map(|c| c % (input.len() + 1)).collect();
            cuts.push(0);
            cuts.push(input.len());
            cuts.sort_unstable();
            cuts.dedup();

            let mut builder = Builder::new();
            for window in cuts.windows(2) {
                builder.read(&input[window[0]..window[1]]);
            }
            let mut reader = DelimiterReader::with_limits(builder.build(), chunk_size, None);

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let mut outcomes = Vec::new();
                loop {
                    let outcome = reader.read_until(delimiter).await.unwrap();
                    let done = matches!(outcome, ReadOutcome::Closed(_));
                    outcomes.push(outcome);
                    if done {
                        return outcomes;
                    }
                }
            })
        }

        proptest! {
            #[test]
            fn partition_does_not_change_lines(
                input in "[ab.\r\n]{0,80}",
                cuts in proptest::collection::vec(any::<usize>(), 0..8),
                chunk_size in 1usize..=16,
            ) {
                prop_assert_eq!(
                    read_all(input.as_bytes(), &cuts, chunk_size, CRLF),
                    reference(input.as_bytes(), CRLF)
                );
            }

            #[test]
            fn partition_does_not_change_bodies(
                input in "[x.\r\n]{0,80}",
                cuts in proptest::collection::vec(any::<usize>(), 0..8),
                chunk_size in 1usize..=16,
            ) {
                prop_assert_eq!(
                    read_all(input.as_bytes(), &cuts, chunk_size, DATA_END),
                    reference(input.as_bytes(), DATA_END)
                );
            }
        }
    }
}
