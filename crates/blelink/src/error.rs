//! Unified error type for blelink.

use std::fmt;

use blelink_future::ContinuationError;
use blelink_protocol::ProtocolError;
use blelink_router::RouterError;
use blelink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` conversions let `?` lift sub-crate errors; use
/// [`kind`](Self::kind) to decide what to do about one.
#[derive(Debug, thiserror::Error)]
pub enum BlelinkError {
    /// The channel to the helper is down; nothing was sent.
    #[error("not connected to helper")]
    Disconnected,

    /// A transport-level error (spawn, read, write).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (decode, encode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A continuation error (timeout, cancellation, double resolution).
    #[error(transparent)]
    Continuation(#[from] ContinuationError),

    /// A routing error.
    #[error(transparent)]
    Router(#[from] RouterError),
}

/// Coarse classification of a [`BlelinkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The helper is gone or was never reachable.
    Disconnected,
    /// The helper sent something the client can't route.
    Communication,
    /// A bug on one side or the other: bad encoding, misuse of a
    /// continuation, an unknown value prefix.
    Internal,
    /// A wait ran out of time.
    Timeout,
}

impl BlelinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Disconnected => ErrorKind::Disconnected,
            Self::Transport(e) if e.is_disconnect() => ErrorKind::Disconnected,
            Self::Transport(_) | Self::Protocol(_) => ErrorKind::Internal,
            Self::Continuation(ContinuationError::Timeout(_)) => ErrorKind::Timeout,
            Self::Continuation(_) => ErrorKind::Internal,
            Self::Router(RouterError::Communication(_)) => ErrorKind::Communication,
            Self::Router(RouterError::Closed) => ErrorKind::Disconnected,
            Self::Router(RouterError::OneShotDefault(_)) => ErrorKind::Internal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Communication => write!(f, "communication error"),
            Self::Internal => write!(f, "internal error"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}
