//! # mailbridge-smtp
//!
//! A minimal SMTP listener that turns every submitted message into a
//! [`StructuredEmail`](mailbridge_mime::StructuredEmail) and hands it to a
//! [`Sink`].
//!
//! ## Features
//!
//! - **Fixed command set**: HELO, MAIL, RCPT, DATA, RSET, NOOP, QUIT with
//!   literal replies; anything else gets `502`
//! - **Residual-safe framing**: delimiters may straddle any number of
//!   socket reads
//! - **Isolated sessions**: one task per connection, failures close only
//!   that connection
//! - **Idle timeout**: every socket read is bounded
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use mailbridge_smtp::{ChannelSink, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> mailbridge_smtp::Result<()> {
//!     let config = ServerConfig::builder().port(2525).build();
//!     let (sink, mut emails) = ChannelSink::new(16);
//!
//!     tokio::spawn(async move {
//!         while let Some(email) = emails.recv().await {
//!             println!("{:?}", email.subject);
//!         }
//!     });
//!
//!     Server::bind(config).await?.run(Arc::new(sink)).await
//! }
//! ```
//!
//! ## Session Flow
//!
//! ```text
//! connect ─→ 220 greeting ─→ READY ─┬─ HELO/MAIL/RCPT/RSET/NOOP ─→ 250 ─→ READY
//!                                   ├─ DATA ─→ 354 ─→ body ─→ sink ─→ 250 ─→ READY
//!                                   ├─ other ─→ 502 ─→ READY
//!                                   └─ QUIT ─→ 221 ─→ closed
//! ```
//!
//! ## Modules
//!
//! - [`command`]: Command verb recognition
//! - [`connection`]: Delimiter reader and session state machine
//! - [`types`]: Reply codes and the fixed replies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod config;
pub mod connection;
mod error;
mod server;
mod sink;
pub mod types;

pub use config::{
    DEFAULT_HOST, DEFAULT_IDLE_TIMEOUT, DEFAULT_PORT, DEFAULT_READ_CHUNK_SIZE, ServerConfig,
    ServerConfigBuilder,
};
pub use connection::{DelimiterReader, Flow, ReadOutcome, Session};
pub use error::{Error, Result};
pub use server::Server;
pub use sink::{ChannelSink, Sink, SinkError};
pub use types::{Reply, ReplyCode};
