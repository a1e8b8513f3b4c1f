//! Connection handling: framed reads and the per-connection session.

mod reader;
mod session;

pub use reader::{DelimiterReader, ReadOutcome};
pub use session::{Flow, Session};
