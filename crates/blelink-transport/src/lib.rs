//! Transport layer for blelink.
//!
//! The helper speaks newline-terminated text over a pair of byte streams.
//! [`LineTransport`] abstracts over where those streams come from:
//!
//! - [`PipeTransport`] wraps any `AsyncRead`/`AsyncWrite` pair (an
//!   in-memory duplex in tests);
//! - [`HelperProcess`] spawns the helper binary and talks to its
//!   stdin/stdout.

mod error;
mod pipe;
mod process;

pub use error::TransportError;
pub use pipe::PipeTransport;
pub use process::{HelperConfig, HelperProcess};

use std::future::Future;

/// A reliable, ordered, line-oriented channel to one helper.
///
/// Writes and reads may happen concurrently from different tasks: the
/// client writes from callers' tasks while its reader task waits on
/// [`read_line`](LineTransport::read_line).
pub trait LineTransport: Send + Sync + 'static {
    /// Writes one line. `line` already ends with `\n`.
    fn write_line(&self, line: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Reads the next line, without its terminator.
    ///
    /// Returns `Ok(None)` at end of stream.
    fn read_line(&self) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    /// Returns `true` while the other end can still be written to.
    fn is_alive(&self) -> bool;
}
