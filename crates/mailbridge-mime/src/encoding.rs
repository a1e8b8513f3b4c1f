//! RFC 2047 header decoding and body transfer decoding.
//!
//! Recognised header values are decoded from their raw, unfolded text.
//! Encoded words (`=?charset?encoding?encoded-text?=`) are replaced by their
//! decoded text; anything that does not decode cleanly is kept verbatim so a
//! single bad word never costs the whole header.
//!
//! Attachment bodies only undo their `Content-Transfer-Encoding`. No charset
//! conversion is applied to them.

use crate::error::{Error, Result};
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;

/// Base64 engine that accepts encoded words with or without padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes Base64 data. ASCII whitespace (line breaks of a body) is ignored.
fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64.decode(compact).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045) into raw bytes.
fn decode_quoted_printable(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break
        let tail = &bytes[i + 1..];
        if tail.starts_with(b"\r\n") {
            i += 3;
            continue;
        }
        if tail.starts_with(b"\n") {
            i += 2;
            continue;
        }

        let byte = match tail {
            [hi, lo, ..] => hex_value(*hi)
                .zip(hex_value(*lo))
                .map(|(hi, lo)| (hi << 4) | lo)
                .ok_or_else(|| {
                    Error::InvalidQuotedPrintable(format!("invalid escape at byte {i}"))
                })?,
            _ => {
                return Err(Error::InvalidQuotedPrintable(
                    "incomplete escape sequence".to_string(),
                ));
            }
        };
        result.push(byte);
        i += 3;
    }

    Ok(result)
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Undoes a body's `Content-Transfer-Encoding`.
///
/// `base64` and `quoted-printable` are decoded; `7bit`, `8bit`, `binary`,
/// unknown labels and a missing header leave the bytes as they are.
///
/// # Errors
///
/// Returns an error if the body is not valid for its declared encoding.
pub fn decode_transfer(encoding: Option<&str>, body: &[u8]) -> Result<Vec<u8>> {
    match encoding.map(str::trim) {
        Some(label) if label.eq_ignore_ascii_case("base64") => decode_base64(body),
        Some(label) if label.eq_ignore_ascii_case("quoted-printable") => {
            decode_quoted_printable(body)
        }
        _ => Ok(body.to_vec()),
    }
}

/// Converts bytes in the named charset to a `String`.
///
/// RFC 2231 language suffixes (`utf-8*en`) are ignored.
fn decode_charset(label: &str, bytes: &[u8]) -> Result<String> {
    let label = label.split('*').next().unwrap_or(label).trim();
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| Error::UnknownCharset(label.to_string()))?;
    let (text, _, _) = encoding.decode(bytes);
    Ok(text.into_owned())
}

/// Decodes a single encoded word given its three fields.
fn decode_word(charset: &str, encoding: &str, payload: &str) -> Result<String> {
    let bytes = match encoding {
        "B" | "b" => decode_base64(payload.as_bytes())?,
        // Q encoding is quoted-printable with underscore for space
        "Q" | "q" => decode_quoted_printable(payload.replace('_', " ").as_bytes())?,
        other => {
            return Err(Error::InvalidEncodedWord(format!(
                "unknown encoding {other}"
            )));
        }
    };
    decode_charset(charset, &bytes)
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Whitespace that only separates two adjacent encoded words is dropped, as
/// RFC 2047 section 6.2 requires. Words that fail to decode are copied
/// through unchanged.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);

        if let Some(word) = split_encoded_word(candidate) {
            match decode_word(word.charset, word.encoding, word.payload) {
                Ok(decoded) => {
                    if !(after_word && before.trim().is_empty()) {
                        out.push_str(before);
                    }
                    out.push_str(&decoded);
                    rest = &candidate[word.len..];
                    after_word = true;
                    continue;
                }
                Err(e) => {
                    tracing::debug!(error = %e, word = &candidate[..word.len], "Keeping undecodable encoded word");
                }
            }
        }

        out.push_str(before);
        out.push_str("=?");
        rest = &candidate[2..];
        after_word = false;
    }

    out.push_str(rest);
    out
}

/// Returns the length of the encoded word at the start of `s`, if any.
#[must_use]
pub fn encoded_word_len(s: &str) -> Option<usize> {
    split_encoded_word(s).map(|word| word.len)
}

/// Borrowed fields of one `=?charset?encoding?payload?=` word.
struct EncodedWord<'a> {
    charset: &'a str,
    encoding: &'a str,
    payload: &'a str,
    /// Length of the whole word including the `=?` and `?=` markers.
    len: usize,
}

fn split_encoded_word(s: &str) -> Option<EncodedWord<'_>> {
    let inner = s.strip_prefix("=?")?;
    let (charset, rest) = inner.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let payload = &rest[..end];

    if charset.is_empty()
        || encoding.len() != 1
        || charset.contains(char::is_whitespace)
        || payload.contains(char::is_whitespace)
    {
        return None;
    }

    Some(EncodedWord {
        charset,
        encoding,
        payload,
        len: 2 + charset.len() + 1 + encoding.len() + 1 + end + 2,
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

    #[test]
    fn test_base64_decode() {
        assert_eq!(decode_base64(b"SGVsbG8sIFdvcmxkIQ==").unwrap(), b"Hello, World!");
        assert_eq!(decode_base64(b"SGVsbG8sIFdvcmxkIQ").unwrap(), b"Hello, World!");
        assert_eq!(decode_base64(b"SGVsbG8s\r\nIFdvcmxkIQ==\r\n").unwrap(), b"Hello, World!");
        assert!(decode_base64(b"not base64!").is_err());
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello, World!").unwrap(), b"Hello, World!");
        assert_eq!(
            decode_quoted_printable(b"H=C3=A9llo").unwrap(),
            "Héllo".as_bytes()
        );
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld").unwrap(), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\nWorld").unwrap(), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_bad_escape() {
        assert!(decode_quoted_printable(b"abc=").is_err());
        assert!(decode_quoted_printable(b"abc=4").is_err());
        assert!(decode_quoted_printable(b"abc=ZZ").is_err());
    }

    #[test]
    fn test_transfer_decoding_keeps_raw_bytes() {
        assert_eq!(
            decode_transfer(Some("base64"), b"/+4A\r\n").unwrap(),
            vec![0xff, 0xee, 0x00]
        );
        assert_eq!(
            decode_transfer(Some(" Quoted-Printable "), b"caf=E9=\r\n!").unwrap(),
            b"caf\xe9!"
        );
        assert_eq!(decode_transfer(Some("8bit"), b"\xff\r\n").unwrap(), b"\xff\r\n");
        assert_eq!(decode_transfer(None, b"as is").unwrap(), b"as is");
        assert!(decode_transfer(Some("base64"), b"!!!!").is_err());
    }

    #[test]
    fn test_encoded_word_len() {
        assert_eq!(encoded_word_len("=?utf-8?Q?a,b?= <x@y>"), Some(15));
        assert_eq!(encoded_word_len("=?utf-8?Q?=C3=A9?="), Some(18));
        assert_eq!(encoded_word_len("=oops"), None);
    }

    #[test]
    fn test_rfc2047_plain_text_untouched() {
        assert_eq!(decode_rfc2047("Hello"), "Hello");
        assert_eq!(decode_rfc2047("a = b ? c"), "a = b ? c");
    }

    #[test]
    fn test_rfc2047_base64_word() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_rfc2047_q_word() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_world?="), "Héllo world");
    }

    #[test]
    fn test_rfc2047_latin1() {
        assert_eq!(decode_rfc2047("=?iso-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_rfc2047_embedded_in_text() {
        assert_eq!(
            decode_rfc2047("=?utf-8?Q?Jos=C3=A9?= <jose@example.com>"),
            "José <jose@example.com>"
        );
        assert_eq!(decode_rfc2047("Re: =?utf-8?B?SMOpbGxv?= again"), "Re: Héllo again");
    }

    #[test]
    fn test_rfc2047_adjacent_words_join() {
        assert_eq!(
            decode_rfc2047("=?utf-8?Q?Hello_?= \r\n =?utf-8?Q?World?="),
            "Hello World"
        );
    }

    #[test]
    fn test_rfc2047_invalid_word_kept() {
        assert_eq!(decode_rfc2047("=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
        assert_eq!(decode_rfc2047("=?no-such-charset?Q?abc?="), "=?no-such-charset?Q?abc?=");
        assert_eq!(decode_rfc2047("broken =?utf-8?Q?abc"), "broken =?utf-8?Q?abc");
    }

    #[test]
    fn test_charset_language_suffix() {
        assert_eq!(decode_charset("utf-8*en", b"abc").unwrap(), "abc");
        assert!(decode_charset("x-unknown", b"abc").is_err());
    }
}
