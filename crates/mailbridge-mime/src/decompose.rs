//! Body walk that classifies MIME parts.
//!
//! Rules, applied to each part in order:
//!
//! 1. No content type: the top-level part becomes the plain-text body
//!    verbatim; anywhere else it is an error.
//! 2. A non-blank `Content-Disposition` makes the part an attachment,
//!    whatever its content type.
//! 3. `text/html` becomes the HTML body, any other `text/*` the plain-text
//!    body. A later part of the same kind replaces an earlier one.
//! 4. A structurally multipart top-level part is walked child by child.
//! 5. Anything else is an error naming the content type.
//!
//! Only the top-level part may be a container, so a multipart nested
//! inside another fails at rule 5.

use crate::email::Attachment;
use crate::encoding::decode_rfc2047;
use crate::error::{Error, Result};
use crate::part::{MimePart, PartBody};

/// Body content classified by [`decompose`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecomposedBody {
    /// Plain text body.
    pub text: Option<String>,
    /// HTML body.
    pub html: Option<String>,
    /// Attachments in document order.
    pub attachments: Vec<Attachment>,
}

/// Walks a part tree from its root and classifies every part.
///
/// # Errors
///
/// Returns [`Error::UnhandledPart`] for a part shape the walk does not
/// accept. No partial result is returned.
pub fn decompose(root: &MimePart) -> Result<DecomposedBody> {
    let mut body = DecomposedBody::default();
    walk(root, true, &mut body)?;
    Ok(body)
}

fn walk(part: &MimePart, is_top_level: bool, body: &mut DecomposedBody) -> Result<()> {
    let Some(content_type) = &part.content_type else {
        if is_top_level {
            body.text = Some(leaf_text(part)?);
            return Ok(());
        }
        return Err(Error::unhandled(None));
    };

    if part.has_disposition() {
        let attachment = attachment(part)?;
        tracing::debug!(
            content_type = %content_type,
            bytes = attachment.content.len(),
            index = body.attachments.len(),
            "Attachment"
        );
        body.attachments.push(attachment);
        return Ok(());
    }

    if content_type.is_text() {
        let text = leaf_text(part)?;
        if content_type.is_html() {
            body.html = Some(text);
        } else {
            body.text = Some(text);
        }
        return Ok(());
    }

    if let (true, PartBody::Multipart(children)) = (is_top_level, &part.body) {
        let attachments = children.iter().filter(|c| c.has_disposition()).count();
        body.attachments.reserve(attachments);
        for child in children {
            walk(child, false, body)?;
        }
        return Ok(());
    }

    Err(Error::unhandled(Some(&content_type.to_string())))
}

fn leaf_content(part: &MimePart) -> Result<&[u8]> {
    match &part.body {
        PartBody::Leaf(content) => Ok(content),
        PartBody::Multipart(_) => Err(Error::unhandled(part.content_type_label().as_deref())),
    }
}

fn leaf_text(part: &MimePart) -> Result<String> {
    Ok(String::from_utf8_lossy(leaf_content(part)?).into_owned())
}

fn attachment(part: &MimePart) -> Result<Attachment> {
    let header = |name: &str| part.headers.get(name).map(decode_rfc2047);
    Ok(Attachment {
        content: leaf_content(part)?.to_vec(),
        content_type: header("content-type"),
        content_disposition: header("content-disposition"),
        content_id: header("content-id"),
    })
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
    use crate::header::Headers;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        let mut headers = Headers::new();
        for (name, value) in pairs {
            headers.add(*name, *value);
        }
        headers
    }

    fn leaf(pairs: &[(&str, &str)], content: &str) -> MimePart {
        MimePart::leaf(headers(pairs), content.as_bytes().to_vec())
    }

    fn mixed(children: Vec<MimePart>) -> MimePart {
        MimePart::multipart(
            headers(&[("Content-Type", "multipart/mixed; boundary=b")]),
            children,
        )
    }

    #[test]
    fn test_untyped_top_level_is_text() {
        let body = decompose(&leaf(&[("Subject", "Hi")], "Hello\r\n")).unwrap();
        assert_eq!(body.text.as_deref(), Some("Hello\r\n"));
        assert!(body.html.is_none());
        assert!(body.attachments.is_empty());
    }

    #[test]
    fn test_single_html_part() {
        let body = decompose(&leaf(&[("Content-Type", "text/html")], "<p>hi</p>")).unwrap();
        assert_eq!(body.html.as_deref(), Some("<p>hi</p>"));
        assert!(body.text.is_none());
    }

    #[test]
    fn test_other_text_subtype_is_plain_text() {
        let body = decompose(&leaf(&[("Content-Type", "text/calendar")], "BEGIN")).unwrap();
        assert_eq!(body.text.as_deref(), Some("BEGIN"));
    }

    #[test]
    fn test_text_html_and_attachment() {
        let root = mixed(vec![
            leaf(&[("Content-Type", "text/plain")], "plain"),
            leaf(&[("Content-Type", "text/html")], "<b>html</b>"),
            MimePart::leaf(
                headers(&[
                    ("Content-Type", "application/pdf; name=\"a.pdf\""),
                    ("Content-Disposition", "attachment; filename=\"a.pdf\""),
                    ("Content-Id", "<part1@example.com>"),
                ]),
                vec![0x25, 0x50, 0x44, 0x46],
            ),
        ]);

        let body = decompose(&root).unwrap();
        assert_eq!(body.text.as_deref(), Some("plain"));
        assert_eq!(body.html.as_deref(), Some("<b>html</b>"));
        assert_eq!(body.attachments.len(), 1);

        let attachment = &body.attachments[0];
        assert_eq!(attachment.content, b"%PDF");
        assert_eq!(
            attachment.content_type.as_deref(),
            Some("application/pdf; name=\"a.pdf\"")
        );
        assert_eq!(
            attachment.content_disposition.as_deref(),
            Some("attachment; filename=\"a.pdf\"")
        );
        assert_eq!(attachment.content_id.as_deref(), Some("<part1@example.com>"));
    }

    #[test]
    fn test_disposition_beats_content_type() {
        let root = mixed(vec![
            leaf(&[("Content-Type", "text/html")], "<p>body</p>"),
            leaf(
                &[
                    ("Content-Type", "text/html"),
                    ("Content-Disposition", "attachment; filename=page.html"),
                ],
                "<p>file</p>",
            ),
        ]);

        let body = decompose(&root).unwrap();
        assert_eq!(body.html.as_deref(), Some("<p>body</p>"));
        assert_eq!(body.attachments.len(), 1);
        assert_eq!(body.attachments[0].content, b"<p>file</p>");
    }

    #[test]
    fn test_blank_disposition_is_not_attachment() {
        let root = mixed(vec![leaf(
            &[("Content-Type", "text/plain"), ("Content-Disposition", "")],
            "inline text",
        )]);
        let body = decompose(&root).unwrap();
        assert_eq!(body.text.as_deref(), Some("inline text"));
        assert!(body.attachments.is_empty());
    }

    #[test]
    fn test_attachments_keep_document_order() {
        let attached = |name: &str| {
            leaf(
                &[
                    ("Content-Type", "application/octet-stream"),
                    ("Content-Disposition", &format!("attachment; filename={name}")),
                ],
                name,
            )
        };
        let root = mixed(vec![
            attached("one"),
            leaf(&[("Content-Type", "text/plain")], "text"),
            attached("two"),
            attached("three"),
        ]);

        let body = decompose(&root).unwrap();
        let names: Vec<_> = body.attachments.iter().map(|a| a.content.clone()).collect();
        assert_eq!(names, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
    }

    #[test]
    fn test_last_text_part_wins() {
        let root = mixed(vec![
            leaf(&[("Content-Type", "text/plain")], "first"),
            leaf(&[("Content-Type", "text/plain")], "second"),
        ]);
        assert_eq!(decompose(&root).unwrap().text.as_deref(), Some("second"));
    }

    #[test]
    fn test_encoded_attachment_headers_are_decoded() {
        let root = mixed(vec![leaf(
            &[
                ("Content-Type", "application/octet-stream"),
                ("Content-Disposition", "attachment; filename=\"=?utf-8?Q?caf=C3=A9?=\""),
            ],
            "x",
        )]);
        let body = decompose(&root).unwrap();
        assert_eq!(
            body.attachments[0].content_disposition.as_deref(),
            Some("attachment; filename=\"café\"")
        );
    }

    #[test]
    fn test_nested_multipart_fails() {
        let root = mixed(vec![MimePart::multipart(
            headers(&[("Content-Type", "multipart/alternative; boundary=c")]),
            vec![leaf(&[("Content-Type", "text/plain")], "deep")],
        )]);

        let err = decompose(&root).unwrap_err();
        assert!(matches!(
            err,
            Error::UnhandledPart { ref content_type } if content_type == "multipart/alternative"
        ));
    }

    #[test]
    fn test_untyped_child_fails() {
        let root = mixed(vec![leaf(&[], "no type")]);
        let err = decompose(&root).unwrap_err();
        assert!(err.to_string().contains("(none)"));
    }

    #[test]
    fn test_unknown_top_level_type_fails() {
        let err = decompose(&leaf(&[("Content-Type", "image/png")], "png")).unwrap_err();
        assert!(err.to_string().contains("image/png"));
    }

    #[test]
    fn test_multipart_type_without_children_structure_fails() {
        let err = decompose(&leaf(&[("Content-Type", "multipart/mixed")], "flat")).unwrap_err();
        assert!(err.to_string().contains("multipart/mixed"));
    }
}
