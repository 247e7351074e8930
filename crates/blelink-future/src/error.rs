//! Error types for continuations.

use std::time::Duration;

/// Errors returned by [`Continuation`](crate::Continuation) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContinuationError {
    /// A one-shot continuation was resolved a second time, or cancelled
    /// after it had already resolved. The first value is kept.
    #[error("continuation already resolved")]
    AlreadyResolved,

    /// The continuation was cancelled before it resolved.
    #[error("continuation cancelled")]
    Cancelled,

    /// A transform was attached after [`seal`](crate::Continuation::seal).
    #[error("continuation sealed, no further transforms accepted")]
    Sealed,

    /// A chained transform panicked. The pipeline is stopped; the primary
    /// value is unaffected.
    #[error("chained transform panicked: {0}")]
    TransformPanicked(String),

    /// A wait expired before the continuation reached the awaited state.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
