//! Structured email produced by decomposition.

use crate::encoding::encoded_word_len;

/// Mailbox from an address-bearing header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EmailAddress {
    /// Display name (optional).
    pub name: Option<String>,
    /// Email address.
    pub address: String,
}

impl EmailAddress {
    /// Creates a new address without a display name.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    /// Parses a single `Name <addr>` value.
    ///
    /// The name is the text before `<`, kept exactly as written (including
    /// any trailing space). The address is the text inside the angle
    /// brackets. Without angle brackets the whole value is the address.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let Some((name, rest)) = value.split_once('<') else {
            return Self::new(value);
        };
        let address = rest.split_once('>').map_or(rest, |(inner, _)| inner);
        Self {
            name: Some(name.to_string()),
            address: address.to_string(),
        }
    }

    /// Parses a comma-separated address list.
    ///
    /// Commas inside quoted strings or angle brackets do not split. Pieces
    /// are trimmed and blank pieces are dropped.
    #[must_use]
    pub fn parse_list(value: &str) -> Vec<Self> {
        split_address_list(value)
            .into_iter()
            .map(Self::parse)
            .collect()
    }
}

fn split_address_list(value: &str) -> Vec<&str> {
    let bytes = value.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_quotes => i += 1,
            b'"' => in_quotes = !in_quotes,
            b'<' if !in_quotes => in_angle = true,
            b'>' if !in_quotes => in_angle = false,
            b',' if !in_quotes && !in_angle => {
                pieces.push(&value[start..i]);
                start = i + 1;
            }
            // Encoded words are opaque until decoded.
            b'=' if !in_quotes => {
                if let Some(len) = encoded_word_len(&value[i..]) {
                    i += len;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    pieces.push(&value[start..]);

    pieces
        .into_iter()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// File attached to an email.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Attachment {
    /// Transfer-decoded content.
    #[cfg_attr(feature = "serde", serde(serialize_with = "base64_content"))]
    pub content: Vec<u8>,
    /// Decoded `Content-Type` header value.
    pub content_type: Option<String>,
    /// Decoded `Content-Disposition` header value.
    pub content_disposition: Option<String>,
    /// Decoded `Content-Id` header value.
    pub content_id: Option<String>,
}

/// Email assembled from one submitted message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct StructuredEmail {
    /// Recipients from `To`.
    pub to: Vec<EmailAddress>,
    /// Sender from `From`.
    pub from: Option<EmailAddress>,
    /// `Reply-To` mailbox.
    pub reply_to: Option<EmailAddress>,
    /// Recipients from `Cc`.
    pub cc: Vec<EmailAddress>,
    /// Recipients from `Bcc`.
    pub bcc: Vec<EmailAddress>,
    /// Subject line.
    pub subject: Option<String>,
    /// `Message-Id` header.
    pub message_id: Option<String>,
    /// Message ids from `References`.
    pub references: Vec<String>,
    /// Message ids from `In-Reply-To`.
    pub in_reply_to: Vec<String>,
    /// Plain text body.
    pub text: Option<String>,
    /// HTML body.
    pub html: Option<String>,
    /// Attachments in document order.
    pub attachments: Vec<Attachment>,
}

#[cfg(feature = "serde")]
fn base64_content<T, S>(content: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: serde::Serializer,
{
    use base64::Engine;
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(content.as_ref()))
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
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("Jane Doe <jane@example.com>");
        assert_eq!(addr.name.as_deref(), Some("Jane Doe "));
        assert_eq!(addr.address, "jane@example.com");
    }

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("jane@example.com");
        assert!(addr.name.is_none());
        assert_eq!(addr.address, "jane@example.com");
    }

    #[test]
    fn test_parse_brackets_only() {
        let addr = EmailAddress::parse("<jane@example.com>");
        assert_eq!(addr.name.as_deref(), Some(""));
        assert_eq!(addr.address, "jane@example.com");
    }

    #[test]
    fn test_parse_unterminated_bracket() {
        let addr = EmailAddress::parse("Jane <jane@example.com");
        assert_eq!(addr.address, "jane@example.com");
    }

    #[test]
    fn test_parse_list() {
        let list = EmailAddress::parse_list(
            "\"Doe, Jane\" <jane@example.com>, bob@example.com,, Carol <c@example.com>",
        );
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].name.as_deref(), Some("\"Doe, Jane\" "));
        assert_eq!(list[0].address, "jane@example.com");
        assert_eq!(list[1], EmailAddress::new("bob@example.com"));
        assert_eq!(list[2].name.as_deref(), Some("Carol "));
    }

    #[test]
    fn test_parse_list_keeps_encoded_words_whole() {
        let list = EmailAddress::parse_list(
            "=?utf-8?Q?Doe,_Jane?= <jane@example.com>, =?utf-8?Q?=22x,y=22?= <x@example.com>",
        );
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name.as_deref(), Some("=?utf-8?Q?Doe,_Jane?= "));
        assert_eq!(list[0].address, "jane@example.com");
        assert_eq!(list[1].address, "x@example.com");
    }

    #[test]
    fn test_parse_list_single() {
        assert_eq!(
            EmailAddress::parse_list("Jane Doe <jane@example.com>"),
            vec![EmailAddress::parse("Jane Doe <jane@example.com>")]
        );
        assert!(EmailAddress::parse_list("  ").is_empty());
    }

    mod prop {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_list_never_splits_more_than_commas(value in "[a-z@. <>,\"]{0,64}") {
                let commas = value.matches(',').count();
                prop_assert!(EmailAddress::parse_list(&value).len() <= commas + 1);
            }

            #[test]
            fn plain_addresses_survive_listing(
                addrs in proptest::collection::vec("[a-z]{1,8}@[a-z]{1,8}\\.com", 1..6)
            ) {
                let joined = addrs.join(", ");
                let parsed: Vec<_> = EmailAddress::parse_list(&joined)
                    .into_iter()
                    .map(|a| a.address)
                    .collect();
                prop_assert_eq!(parsed, addrs);
            }
        }
    }
}
