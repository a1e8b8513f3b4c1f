//! Owned MIME part tree.
//!
//! The decoding collaborator (`mail-parser`) hands back a borrowed message
//! whose multipart children are indices into a flat part list. That value is
//! converted once into an owned tree of [`MimePart`] nodes and dropped before
//! the decomposition walk starts.

use crate::content_type::ContentType;
use crate::encoding::decode_transfer;
use crate::error::{Error, Result};
use crate::header::Headers;
use mail_parser::{Message, MessageParser, PartType};

/// A node in the parsed MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimePart {
    /// Headers of this part, undecoded.
    pub headers: Headers,
    /// Declared content type, if the part has one.
    pub content_type: Option<ContentType>,
    /// Leaf content or child parts.
    pub body: PartBody,
}

/// Body of a [`MimePart`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartBody {
    /// Content of a leaf part.
    ///
    /// For a part with a `Content-Disposition`, the body bytes with only the
    /// transfer encoding undone. Otherwise transfer-decoded (and, for text,
    /// charset-decoded to UTF-8) when the part declares a content type, and
    /// the verbatim body bytes when it does not.
    Leaf(Vec<u8>),
    /// Children of a structurally multipart part, in document order.
    Multipart(Vec<MimePart>),
}

impl MimePart {
    /// Creates a leaf part.
    #[must_use]
    pub fn leaf(headers: Headers, content: Vec<u8>) -> Self {
        let content_type = headers.get("content-type").and_then(ContentType::parse);
        Self {
            headers,
            content_type,
            body: PartBody::Leaf(content),
        }
    }

    /// Creates a multipart part.
    #[must_use]
    pub fn multipart(headers: Headers, children: Vec<Self>) -> Self {
        let content_type = headers.get("content-type").and_then(ContentType::parse);
        Self {
            headers,
            content_type,
            body: PartBody::Multipart(children),
        }
    }

    /// Parses raw message bytes into a part tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unparseable`] if the bytes do not form a message and
    /// [`Error::MissingContent`] if the parser's part list is inconsistent.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let message = MessageParser::default()
            .parse(raw)
            .filter(|message| !message.parts.is_empty())
            .ok_or(Error::Unparseable)?;
        Self::from_message(&message, 0)
    }

    fn from_message(message: &Message<'_>, id: usize) -> Result<Self> {
        let part = message.parts.get(id).ok_or(Error::MissingContent(id))?;
        let raw: &[u8] = message.raw_message.as_ref();

        let headers = Headers::parse(slice(raw, part.offset_header, part.offset_body));

        if let PartType::Multipart(children) = &part.body {
            let children = children
                .iter()
                .map(|&child| Self::from_message(message, child))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Self::multipart(headers, children));
        }

        // The root part runs to the end of the submission.
        let end = if id == 0 { raw.len() } else { part.offset_end };
        let body = slice(raw, part.offset_body, end);

        let content = if headers.has_value("content-disposition") {
            let encoding = headers.get("content-transfer-encoding");
            decode_transfer(encoding, body).unwrap_or_else(|e| {
                tracing::debug!(error = %e, part = id, "Falling back to parser contents");
                part.contents().to_vec()
            })
        } else if headers.get("content-type").is_some() {
            part.contents().to_vec()
        } else {
            body.to_vec()
        };

        Ok(Self::leaf(headers, content))
    }

    /// Returns true if the part carries a non-blank `Content-Disposition`.
    #[must_use]
    pub fn has_disposition(&self) -> bool {
        self.headers.has_value("content-disposition")
    }

    /// Returns the part's content type as text, for diagnostics.
    #[must_use]
    pub fn content_type_label(&self) -> Option<String> {
        self.content_type.as_ref().map(ToString::to_string)
    }
}

fn slice(raw: &[u8], start: usize, end: usize) -> &[u8] {
    raw.get(start..end).unwrap_or_default()
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
    fn test_parse_untyped_message_keeps_body_verbatim() {
        let part = MimePart::parse(b"Subject: Hi\r\n\r\nHello\r\n").unwrap();
        assert!(part.content_type.is_none());
        assert_eq!(part.headers.get("subject"), Some("Hi"));
        assert_eq!(part.body, PartBody::Leaf(b"Hello\r\n".to_vec()));
    }

    #[test]
    fn test_parse_multipart_children_in_order() {
        let raw = concat!(
            "Subject: parts\r\n",
            "Content-Type: multipart/mixed; boundary=\"XX\"\r\n",
            "\r\n",
            "--XX\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "first\r\n",
            "--XX\r\n",
            "Content-Type: application/octet-stream\r\n",
            "Content-Disposition: attachment; filename=\"a.bin\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "AAEC\r\n",
            "--XX--\r\n"
        );

        let part = MimePart::parse(raw.as_bytes()).unwrap();
        assert_eq!(part.content_type.as_ref().unwrap().main_type, "multipart");

        let PartBody::Multipart(children) = &part.body else {
            panic!("Expected multipart body");
        };
        assert_eq!(children.len(), 2);
        assert!(children[0].content_type.as_ref().unwrap().is_text());
        assert!(!children[0].has_disposition());
        assert!(children[1].has_disposition());
        assert_eq!(children[1].body, PartBody::Leaf(vec![0, 1, 2]));
    }

    #[test]
    fn test_text_attachment_keeps_non_utf8_bytes() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"XX\"\r\n",
            "\r\n",
            "--XX\r\n",
            "Content-Type: text/csv\r\n",
            "Content-Disposition: attachment; filename=\"data.csv\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "/+4A\r\n",
            "--XX\r\n",
            "Content-Type: text/plain; charset=iso-8859-1\r\n",
            "Content-Disposition: attachment; filename=\"notes.txt\"\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "caf=E9\r\n",
            "--XX--\r\n"
        );

        let part = MimePart::parse(raw.as_bytes()).unwrap();
        let PartBody::Multipart(children) = &part.body else {
            panic!("Expected multipart body");
        };
        assert_eq!(children[0].body, PartBody::Leaf(vec![0xff, 0xee, 0x00]));
        assert_eq!(children[1].body, PartBody::Leaf(b"caf\xe9".to_vec()));
    }

    #[test]
    fn test_content_type_label() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "image/png; name=x.png");
        let part = MimePart::leaf(headers, Vec::new());
        assert_eq!(part.content_type_label().as_deref(), Some("image/png"));
        assert_eq!(MimePart::leaf(Headers::new(), Vec::new()).content_type_label(), None);
    }
}
