//! Mapping from decoded headers and body content to [`StructuredEmail`].

use crate::decompose::DecomposedBody;
use crate::email::{EmailAddress, StructuredEmail};
use crate::encoding::decode_rfc2047;
use crate::header::Headers;

/// Target field of a recognised header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    To,
    From,
    ReplyTo,
    Cc,
    Bcc,
    Subject,
    MessageId,
    References,
    InReplyTo,
}

/// How a header value is turned into field content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// One mailbox. The first occurrence wins.
    Address,
    /// Comma-separated mailboxes. Every occurrence contributes.
    AddressList,
    /// Free text. The first occurrence wins.
    Text,
    /// Whitespace-separated message ids. Every occurrence contributes.
    IdList,
}

/// Headers copied into the structured email.
const HEADER_TABLE: &[(&str, Shape, Field)] = &[
    ("To", Shape::AddressList, Field::To),
    ("From", Shape::Address, Field::From),
    ("Reply-To", Shape::Address, Field::ReplyTo),
    ("Cc", Shape::AddressList, Field::Cc),
    ("Bcc", Shape::AddressList, Field::Bcc),
    ("Subject", Shape::Text, Field::Subject),
    ("Message-Id", Shape::Text, Field::MessageId),
    ("References", Shape::IdList, Field::References),
    ("In-Reply-To", Shape::IdList, Field::InReplyTo),
];

/// Names of the headers the assembler reads.
pub fn recognized_headers() -> impl Iterator<Item = &'static str> {
    HEADER_TABLE.iter().map(|&(name, _, _)| name)
}

/// Builds a structured email from decoded headers and classified body
/// content.
///
/// `headers` holds raw values. RFC 2047 encoded words are decoded after an
/// address list has been split into mailboxes, and within a mailbox the
/// name and address are decoded separately. Headers outside the recognised
/// set are ignored.
#[must_use]
pub fn assemble(headers: &Headers, body: DecomposedBody) -> StructuredEmail {
    let mut email = StructuredEmail {
        text: body.text,
        html: body.html,
        attachments: body.attachments,
        ..StructuredEmail::default()
    };

    for &(name, shape, field) in HEADER_TABLE {
        for value in headers.get_all(name) {
            apply(&mut email, shape, field, value);
        }
    }

    email
}

fn apply(email: &mut StructuredEmail, shape: Shape, field: Field, value: &str) {
    match shape {
        Shape::Address => {
            if let Some(slot) = address_slot(email, field) {
                slot.get_or_insert_with(|| decode_address(EmailAddress::parse(value)));
            }
        }
        Shape::AddressList => {
            if let Some(list) = address_list(email, field) {
                list.extend(EmailAddress::parse_list(value).into_iter().map(decode_address));
            }
        }
        Shape::Text => {
            if let Some(slot) = text_slot(email, field) {
                slot.get_or_insert_with(|| decode_rfc2047(value));
            }
        }
        Shape::IdList => {
            if let Some(list) = id_list(email, field) {
                list.extend(value.split_whitespace().map(str::to_string));
            }
        }
    }
}

fn decode_address(address: EmailAddress) -> EmailAddress {
    EmailAddress {
        name: address.name.as_deref().map(decode_rfc2047),
        address: decode_rfc2047(&address.address),
    }
}

const fn address_slot(email: &mut StructuredEmail, field: Field) -> Option<&mut Option<EmailAddress>> {
    match field {
        Field::From => Some(&mut email.from),
        Field::ReplyTo => Some(&mut email.reply_to),
        _ => None,
    }
}

const fn address_list(email: &mut StructuredEmail, field: Field) -> Option<&mut Vec<EmailAddress>> {
    match field {
        Field::To => Some(&mut email.to),
        Field::Cc => Some(&mut email.cc),
        Field::Bcc => Some(&mut email.bcc),
        _ => None,
    }
}

const fn text_slot(email: &mut StructuredEmail, field: Field) -> Option<&mut Option<String>> {
    match field {
        Field::Subject => Some(&mut email.subject),
        Field::MessageId => Some(&mut email.message_id),
        _ => None,
    }
}

const fn id_list(email: &mut StructuredEmail, field: Field) -> Option<&mut Vec<String>> {
    match field {
        Field::References => Some(&mut email.references),
        Field::InReplyTo => Some(&mut email.in_reply_to),
        _ => None,
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
    use crate::email::Attachment;

    #[test]
    fn test_table_shapes_match_fields() {
        // Every entry must land somewhere, otherwise the header is dropped.
        let mut email = StructuredEmail::default();
        for &(_, shape, field) in HEADER_TABLE {
            let lands = match shape {
                Shape::Address => address_slot(&mut email, field).is_some(),
                Shape::AddressList => address_list(&mut email, field).is_some(),
                Shape::Text => text_slot(&mut email, field).is_some(),
                Shape::IdList => id_list(&mut email, field).is_some(),
            };
            assert!(lands, "{field:?} has the wrong shape");
        }
    }

    #[test]
    fn test_recognized_headers() {
        let names: Vec<_> = recognized_headers().collect();
        assert_eq!(names.len(), 9);
        assert!(names.contains(&"Reply-To"));
        assert!(names.contains(&"In-Reply-To"));
    }

    #[test]
    fn test_assemble_headers() {
        let mut headers = Headers::new();
        headers.add("To", "Jane <jane@example.com>, bob@example.com");
        headers.add("To", "carol@example.com");
        headers.add("From", "Sender <sender@example.com>");
        headers.add("Reply-To", "replies@example.com");
        headers.add("Cc", "cc@example.com");
        headers.add("Bcc", "bcc@example.com");
        headers.add("Subject", "Hi");
        headers.add("Message-Id", "<m1@example.com>");
        headers.add("References", "<a@example.com> <b@example.com>");
        headers.add("In-Reply-To", "<b@example.com>");

        let email = assemble(&headers, DecomposedBody::default());

        assert_eq!(email.to.len(), 3);
        assert_eq!(email.to[0].name.as_deref(), Some("Jane "));
        assert_eq!(email.to[0].address, "jane@example.com");
        assert_eq!(email.to[2].address, "carol@example.com");
        assert_eq!(email.from.as_ref().unwrap().address, "sender@example.com");
        assert_eq!(email.reply_to, Some(EmailAddress::new("replies@example.com")));
        assert_eq!(email.cc, vec![EmailAddress::new("cc@example.com")]);
        assert_eq!(email.bcc, vec![EmailAddress::new("bcc@example.com")]);
        assert_eq!(email.subject.as_deref(), Some("Hi"));
        assert_eq!(email.message_id.as_deref(), Some("<m1@example.com>"));
        assert_eq!(email.references, vec!["<a@example.com>", "<b@example.com>"]);
        assert_eq!(email.in_reply_to, vec!["<b@example.com>"]);
    }

    #[test]
    fn test_encoded_comma_in_name_does_not_split() {
        let mut headers = Headers::new();
        headers.add(
            "To",
            "=?utf-8?Q?Doe,_Jane?= <jane@example.com>, =?utf-8?B?Qm9i?= <bob@example.com>",
        );
        headers.add("Cc", "=?iso-8859-1?Q?Jos=E9?= <jose@example.com>");

        let email = assemble(&headers, DecomposedBody::default());

        assert_eq!(email.to.len(), 2);
        assert_eq!(email.to[0].name.as_deref(), Some("Doe, Jane "));
        assert_eq!(email.to[0].address, "jane@example.com");
        assert_eq!(email.to[1].name.as_deref(), Some("Bob "));
        assert_eq!(email.to[1].address, "bob@example.com");
        assert_eq!(email.cc[0].name.as_deref(), Some("José "));
    }

    #[test]
    fn test_encoded_bracket_in_name_stays_in_name() {
        let mut headers = Headers::new();
        headers.add("From", "=?utf-8?Q?a=3Cb?= <sender@example.com>");
        headers.add("Subject", "=?utf-8?B?SMOpbGxv?= world");

        let email = assemble(&headers, DecomposedBody::default());

        let from = email.from.unwrap();
        assert_eq!(from.name.as_deref(), Some("a<b "));
        assert_eq!(from.address, "sender@example.com");
        assert_eq!(email.subject.as_deref(), Some("Héllo world"));
    }

    #[test]
    fn test_single_valued_keeps_first() {
        let mut headers = Headers::new();
        headers.add("Subject", "first");
        headers.add("Subject", "second");
        headers.add("From", "a@example.com");
        headers.add("From", "b@example.com");

        let email = assemble(&headers, DecomposedBody::default());
        assert_eq!(email.subject.as_deref(), Some("first"));
        assert_eq!(email.from, Some(EmailAddress::new("a@example.com")));
    }

    #[test]
    fn test_missing_headers_stay_empty() {
        let email = assemble(&Headers::new(), DecomposedBody::default());
        assert_eq!(email, StructuredEmail::default());
    }

    #[test]
    fn test_body_is_moved_in() {
        let body = DecomposedBody {
            text: Some("plain".to_string()),
            html: Some("<p>html</p>".to_string()),
            attachments: vec![Attachment {
                content: vec![1, 2, 3],
                ..Attachment::default()
            }],
        };

        let email = assemble(&Headers::new(), body.clone());
        assert_eq!(email.text, body.text);
        assert_eq!(email.html, body.html);
        assert_eq!(email.attachments, body.attachments);
    }
}
