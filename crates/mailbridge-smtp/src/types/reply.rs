//! SMTP reply types.

use std::fmt;

/// Reply sent to a client.
///
/// Every reply the server sends is a fixed single line, so the text is
/// `'static`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Text after the code.
    pub text: &'static str,
}

impl Reply {
    /// Greeting sent on connect.
    pub const GREETING: Self = Self::new(ReplyCode::SERVICE_READY, "Sandstorm SMTP Bridge");
    /// Reply to `HELO`.
    pub const HELO: Self = Self::new(ReplyCode::OK, "Sandstorm at your service");
    /// Generic acceptance.
    pub const OK: Self = Self::new(ReplyCode::OK, "OK");
    /// Reply to `DATA` before the body is read.
    pub const START_DATA: Self = Self::new(
        ReplyCode::START_DATA,
        "Start mail input; end with <CRLF>.<CRLF>",
    );
    /// Reply to `QUIT`.
    pub const GOODBYE: Self = Self::new(ReplyCode::CLOSING, "2.0.0 Goodbye!");
    /// Reply to any verb outside the supported set.
    pub const NOT_RECOGNIZED: Self = Self::new(
        ReplyCode::NOT_IMPLEMENTED,
        "5.5.2 Error: command not recognized",
    );

    /// Creates a new reply.
    #[must_use]
    pub const fn new(code: ReplyCode, text: &'static str) -> Self {
        Self { code, text }
    }

    /// Serializes the reply as a `CRLF`-terminated line.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{self}\r\n").into_bytes()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Reply codes the server sends
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
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

    mod reply_code_tests {
        use super::*;

        #[test]
        fn display() {
            assert_eq!(ReplyCode::SERVICE_READY.to_string(), "220");
            assert_eq!(ReplyCode::START_DATA.to_string(), "354");
            assert!(ReplyCode::OK < ReplyCode::NOT_IMPLEMENTED);
        }
    }

    mod reply_tests {
        use super::*;

        #[test]
        fn wire_format() {
            assert_eq!(Reply::GREETING.to_bytes(), b"220 Sandstorm SMTP Bridge\r\n");
            assert_eq!(Reply::HELO.to_bytes(), b"250 Sandstorm at your service\r\n");
            assert_eq!(Reply::OK.to_bytes(), b"250 OK\r\n");
            assert_eq!(
                Reply::START_DATA.to_bytes(),
                b"354 Start mail input; end with <CRLF>.<CRLF>\r\n"
            );
            assert_eq!(Reply::GOODBYE.to_bytes(), b"221 2.0.0 Goodbye!\r\n");
            assert_eq!(
                Reply::NOT_RECOGNIZED.to_bytes(),
                b"502 5.5.2 Error: command not recognized\r\n"
            );
        }
    }
}
