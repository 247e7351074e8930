/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The helper process has exited.
    #[error("helper exited")]
    Exited,

    /// The line channel was closed on our side or by the peer.
    #[error("channel closed")]
    Closed,

    /// A pipe the transport needs was never set up.
    #[error("helper not started: no {0} pipe")]
    NotStarted(&'static str),

    /// Starting the helper failed.
    #[error("spawn failed: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// Writing a line failed.
    #[error("write failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// Reading a line failed.
    #[error("read failed: {0}")]
    ReadFailed(#[source] std::io::Error),
}

impl TransportError {
    /// Returns `true` if the other end is gone for good.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::Exited | Self::Closed | Self::WriteFailed(_) | Self::ReadFailed(_)
        )
    }
}
