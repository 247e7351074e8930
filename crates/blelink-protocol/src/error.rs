//! Error types for the protocol layer.
//!
//! Every variant here is a structural violation of the line format. None of
//! them is retried: the caller that triggered the decode or encode gets the
//! error back synchronously.

/// Errors that can occur while decoding a helper line or encoding a command.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A value carried a type prefix outside `$`, `'`, `h` and `b`.
    ///
    /// This is never coerced into a string or a null: a prefix we don't
    /// know means the helper speaks a dialect we can't follow.
    #[error("cannot understand value {text:?} for tag {tag:?}")]
    UnknownPrefix { tag: String, text: String },

    /// An `h` value whose remainder is not a base-16 integer.
    #[error("invalid hex integer {text:?} for tag {tag:?}: {source}")]
    InvalidInteger {
        tag: String,
        text: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// A `b` value whose remainder is not an even-length hex string.
    #[error("invalid hex bytes for tag {tag:?}: {source}")]
    InvalidBytes {
        tag: String,
        #[source]
        source: hex::FromHexError,
    },

    /// A token that is neither `tag=value` nor the start of a comment.
    #[error("malformed token {0:?}")]
    MalformedToken(String),

    /// A command name or argument contains a line delimiter.
    ///
    /// Writing it would split one command into two on the wire, so this is
    /// a caller bug rather than something to recover from.
    #[error("embedded line delimiter in {0:?}")]
    EmbeddedDelimiter(String),

    /// A command with an empty name.
    #[error("command name is empty")]
    EmptyCommand,
}
