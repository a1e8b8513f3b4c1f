//! SMTP command recognition.

/// Command received from a client.
///
/// Only the verb is interpreted. Arguments to `MAIL` and `RCPT` are accepted
/// without validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname, as sent
        hostname: String,
    },
    /// MAIL - Start mail transaction
    Mail,
    /// RCPT - Add recipient
    Rcpt,
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// NOOP - No operation
    Noop,
    /// QUIT - Close connection
    Quit,
    /// Any other verb
    Unrecognized {
        /// Verb as sent
        verb: String,
    },
}

impl Command {
    /// Parses one command line without its `CRLF`.
    ///
    /// The verb is the text before the first space, or the whole line when
    /// there is none, and is matched case-insensitively.
    #[must_use]
    pub fn parse(line: &[u8]) -> Self {
        let line = String::from_utf8_lossy(line);
        let (verb, argument) = line.split_once(' ').unwrap_or((&line, ""));

        match verb.to_ascii_uppercase().as_str() {
            "HELO" => Self::Helo {
                hostname: argument.trim().to_string(),
            },
            "MAIL" => Self::Mail,
            "RCPT" => Self::Rcpt,
            "DATA" => Self::Data,
            "RSET" => Self::Rset,
            "NOOP" => Self::Noop,
            "QUIT" => Self::Quit,
            _ => Self::Unrecognized {
                verb: verb.to_string(),
            },
        }
    }

    /// Returns the verb for logging.
    #[must_use]
    pub fn verb(&self) -> &str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Mail => "MAIL",
            Self::Rcpt => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Noop => "NOOP",
            Self::Quit => "QUIT",
            Self::Unrecognized { verb } => verb,
        }
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

    #[test]
    fn test_parse_helo() {
        assert_eq!(
            Command::parse(b"HELO foo"),
            Command::Helo {
                hostname: "foo".to_string()
            }
        );
        assert_eq!(
            Command::parse(b"HELO"),
            Command::Helo {
                hostname: String::new()
            }
        );
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(Command::parse(b"quit"), Command::Quit);
        assert_eq!(Command::parse(b"Data"), Command::Data);
        assert_eq!(Command::parse(b"nOoP"), Command::Noop);
    }

    #[test]
    fn test_parse_arguments_ignored() {
        assert_eq!(Command::parse(b"MAIL FROM:<a@b.com>"), Command::Mail);
        assert_eq!(Command::parse(b"RCPT TO:<c@d.com>"), Command::Rcpt);
        assert_eq!(Command::parse(b"RSET now"), Command::Rset);
    }

    #[test]
    fn test_verb_needs_space_boundary() {
        // Only a space ends the verb.
        assert!(matches!(
            Command::parse(b"MAIL:FROM"),
            Command::Unrecognized { .. }
        ));
        assert!(matches!(
            Command::parse(b"QUIT\tnow"),
            Command::Unrecognized { .. }
        ));
    }

    #[test]
    fn test_parse_unrecognized() {
        let cmd = Command::parse(b"FOOBAR");
        assert_eq!(
            cmd,
            Command::Unrecognized {
                verb: "FOOBAR".to_string()
            }
        );
        assert_eq!(cmd.verb(), "FOOBAR");
        assert!(matches!(Command::parse(b"EHLO foo"), Command::Unrecognized { .. }));
        assert!(matches!(Command::parse(b""), Command::Unrecognized { .. }));
    }

    #[test]
    fn test_verb() {
        assert_eq!(Command::parse(b"helo x").verb(), "HELO");
        assert_eq!(Command::Quit.verb(), "QUIT");
    }
}
