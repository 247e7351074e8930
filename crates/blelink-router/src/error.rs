//! Error types for the routing layer.

/// Errors that can occur while routing records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// The record can't be routed: no `rsp` tag and no comment, or an
    /// `rsp` value that isn't text. The helper and the client are out of
    /// step.
    #[error("communication error: {0}")]
    Communication(String),

    /// A single-value subscriber was offered as a default handler, which
    /// is notified on every record of its type.
    #[error("default handler for {0} must accept repeated values")]
    OneShotDefault(String),

    /// The router task has stopped.
    #[error("router is closed")]
    Closed,
}
