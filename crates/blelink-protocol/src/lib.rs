//! Wire protocol for the BLE helper.
//!
//! This crate defines the "language" the client and the helper speak:
//!
//! - **Types** ([`Record`], [`Value`]) — one decoded helper line and the
//!   typed values inside it.
//! - **Commands** ([`Command`], [`Arg`]) — what the client writes.
//! - **Codec** ([`Record::decode`], [`Record::encode`],
//!   [`Command::encode`]) — how both are converted to and from text.
//! - **Errors** ([`ProtocolError`]) — what can go wrong doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (lines of text) and the
//! router (response types). It doesn't know about subscribers or
//! continuations; it only knows the line format.
//!
//! ```text
//! Transport (lines) → Protocol (Record) → Router (subscribers)
//! ```

mod codec;
mod command;
mod error;
mod types;

pub use codec::LINE_DELIMITER;
pub use command::{Arg, Command};
pub use error::ProtocolError;
pub use types::{Record, RecordKind, Value, RESPONSE_TAG};
