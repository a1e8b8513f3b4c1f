//! Whole-message entry point: raw submission bytes to [`StructuredEmail`].

use crate::assemble::{assemble, recognized_headers};
use crate::decompose::decompose;
use crate::email::StructuredEmail;
use crate::error::{Error, Result};
use crate::part::MimePart;

/// Decomposes one raw message into a structured email.
///
/// Input that the MIME parser cannot make a message of at all is not an
/// error: the whole submission becomes the plain-text body and every
/// header field stays empty.
///
/// # Errors
///
/// Returns [`Error::UnhandledPart`] when the part tree contains a shape the
/// decomposition walk rejects, such as nested multipart or an untyped child.
pub fn parse_message(raw: &[u8]) -> Result<StructuredEmail> {
    let root = match MimePart::parse(raw) {
        Ok(root) => root,
        Err(Error::Unparseable) => {
            tracing::warn!(bytes = raw.len(), "Unparseable message, keeping raw text");
            return Ok(StructuredEmail {
                text: Some(String::from_utf8_lossy(raw).into_owned()),
                ..StructuredEmail::default()
            });
        }
        Err(e) => return Err(e),
    };

    let headers = root.headers.select(recognized_headers());
    let body = decompose(&root)?;
    let email = assemble(&headers, body);
    tracing::debug!(
        recipients = email.to.len(),
        attachments = email.attachments.len(),
        has_text = email.text.is_some(),
        has_html = email.html.is_some(),
        "Message decomposed"
    );
    Ok(email)
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
    use crate::email::EmailAddress;

    #[test]
    fn test_plain_message_without_content_type() {
        let email = parse_message(b"Subject: Hi\r\n\r\nHello\r\n").unwrap();
        assert_eq!(email.subject.as_deref(), Some("Hi"));
        assert_eq!(email.text.as_deref(), Some("Hello\r\n"));
        assert!(email.html.is_none());
        assert!(email.attachments.is_empty());
        assert!(email.to.is_empty());
    }

    #[test]
    fn test_multipart_with_text_html_and_attachment() {
        let raw = concat!(
            "From: Sender <sender@example.com>\r\n",
            "To: Jane <jane@example.com>, bob@example.com\r\n",
            "Subject: =?utf-8?Q?R=C3=A9sum=C3=A9?=\r\n",
            "Message-Id: <m1@example.com>\r\n",
            "References: <a@example.com>\r\n",
            " <b@example.com>\r\n",
            "Content-Type: multipart/mixed; boundary=\"XX\"\r\n",
            "\r\n",
            "--XX\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "plain body\r\n",
            "--XX\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<p>html body</p>\r\n",
            "--XX\r\n",
            "Content-Type: application/octet-stream\r\n",
            "Content-Disposition: attachment; filename=\"data.bin\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "AAECAw==\r\n",
            "--XX--\r\n"
        );

        let email = parse_message(raw.as_bytes()).unwrap();
        assert_eq!(email.from.as_ref().unwrap().name.as_deref(), Some("Sender "));
        assert_eq!(email.to.len(), 2);
        assert_eq!(email.to[1], EmailAddress::new("bob@example.com"));
        assert_eq!(email.subject.as_deref(), Some("Résumé"));
        assert_eq!(email.message_id.as_deref(), Some("<m1@example.com>"));
        assert_eq!(email.references, vec!["<a@example.com>", "<b@example.com>"]);

        assert!(email.text.as_deref().unwrap().starts_with("plain body"));
        assert!(email.html.as_deref().unwrap().starts_with("<p>html body</p>"));
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].content, vec![0, 1, 2, 3]);
        assert_eq!(
            email.attachments[0].content_disposition.as_deref(),
            Some("attachment; filename=\"data.bin\"")
        );
    }

    #[test]
    fn test_text_attachment_bytes_are_not_charset_decoded() {
        let raw = concat!(
            "Subject: Export\r\n",
            "Content-Type: multipart/mixed; boundary=\"XX\"\r\n",
            "\r\n",
            "--XX\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "see attached\r\n",
            "--XX\r\n",
            "Content-Type: text/csv; charset=utf-8\r\n",
            "Content-Disposition: attachment; filename=\"export.csv\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "/+4A\r\n",
            "--XX--\r\n"
        );

        let email = parse_message(raw.as_bytes()).unwrap();
        assert!(email.text.as_deref().unwrap().starts_with("see attached"));
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].content, vec![0xff, 0xee, 0x00]);
        assert_eq!(
            email.attachments[0].content_type.as_deref(),
            Some("text/csv; charset=utf-8")
        );
    }

    #[test]
    fn test_encoded_recipient_names() {
        let raw = concat!(
            "To: =?utf-8?Q?Doe,_Jane?= <jane@example.com>, bob@example.com\r\n",
            "Cc: =?utf-8?B?Sm9zw6k=?= <jose@example.com>\r\n",
            "\r\n",
            "hi\r\n"
        );

        let email = parse_message(raw.as_bytes()).unwrap();
        assert_eq!(email.to.len(), 2);
        assert_eq!(email.to[0].name.as_deref(), Some("Doe, Jane "));
        assert_eq!(email.to[0].address, "jane@example.com");
        assert_eq!(email.to[1], EmailAddress::new("bob@example.com"));
        assert_eq!(email.cc[0].name.as_deref(), Some("José "));
    }

    #[test]
    fn test_nested_multipart_is_rejected() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=\"inner\"\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "deep\r\n",
            "--inner--\r\n",
            "--outer--\r\n"
        );

        let err = parse_message(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::UnhandledPart { .. }));
    }

    #[test]
    fn test_empty_input_falls_back_to_raw_text() {
        let email = parse_message(b"").unwrap();
        assert_eq!(email.text.as_deref().unwrap_or_default(), "");
        assert!(email.subject.is_none());
    }
}
