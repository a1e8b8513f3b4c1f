//! Error types for MIME decomposition.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
///
/// Every variant is fatal to the message being decomposed: no partial
/// structured email is produced once one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The decoding collaborator could not make a message out of the input.
    #[error("Message could not be parsed as MIME")]
    Unparseable,

    /// A part whose shape the decomposition walk does not handle.
    #[error("Unhandled MIME part: {content_type}")]
    UnhandledPart {
        /// Content type of the offending part, or `(none)` when it had none.
        content_type: String,
    },

    /// A multipart node refers to a child the parser never produced.
    #[error("Missing content for MIME part {0}")]
    MissingContent(usize),

    /// Malformed RFC 2047 encoded word.
    #[error("Invalid encoded word: {0}")]
    InvalidEncodedWord(String),

    /// Malformed quoted-printable escape.
    #[error("Invalid quoted-printable data: {0}")]
    InvalidQuotedPrintable(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Charset label not known to the charset converter.
    #[error("Unknown charset: {0}")]
    UnknownCharset(String),
}

impl Error {
    /// Creates an [`Error::UnhandledPart`] for the given content type.
    #[must_use]
    pub fn unhandled(content_type: Option<&str>) -> Self {
        Self::UnhandledPart {
            content_type: content_type.unwrap_or("(none)").to_string(),
        }
    }
}
