//! # mailbridge-mime
//!
//! Decomposition of submitted email messages into a structured form.
//!
//! ## Features
//!
//! - **Part tree**: Raw bytes are parsed once into an owned [`MimePart`] tree
//! - **Classification**: Text, HTML and attachment parts are sorted out of a
//!   single-level multipart message
//! - **Header table**: Address, subject and threading headers are mapped onto
//!   [`StructuredEmail`] fields
//! - **Encoded words**: RFC 2047 header values are decoded with the declared
//!   charset
//!
//! ## Quick Start
//!
//! ```
//! use mailbridge_mime::parse_message;
//!
//! let raw = b"From: Jane <jane@example.com>\r\n\
//!             To: bob@example.com\r\n\
//!             Subject: Hi\r\n\
//!             \r\n\
//!             Hello\r\n";
//!
//! let email = parse_message(raw)?;
//! assert_eq!(email.subject.as_deref(), Some("Hi"));
//! assert_eq!(email.to[0].address, "bob@example.com");
//! assert_eq!(email.text.as_deref(), Some("Hello\r\n"));
//! # Ok::<(), mailbridge_mime::Error>(())
//! ```
//!
//! ## Limits
//!
//! Only the top-level part may be multipart. A multipart nested inside
//! another, or a child part without a content type, fails the whole
//! message with [`Error::UnhandledPart`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod assemble;
mod content_type;
mod decompose;
mod email;
mod encoding;
mod error;
mod header;
mod message;
mod part;

pub use assemble::{assemble, recognized_headers};
pub use content_type::ContentType;
pub use decompose::{DecomposedBody, decompose};
pub use email::{Attachment, EmailAddress, StructuredEmail};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::parse_message;
pub use part::{MimePart, PartBody};
