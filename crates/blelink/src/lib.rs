//! # blelink
//!
//! Asynchronous request/response client for a line-oriented BLE helper
//! daemon.
//!
//! The helper is a long-lived process that takes one-line commands on
//! stdin and answers with `tag=value` lines on stdout. blelink turns that
//! single shared channel into independent, awaitable results:
//!
//! - [`Client::send`] writes a command and hands back a
//!   [`Continuation`](blelink_future::Continuation) for the response type
//!   it expects;
//! - the reader task decodes every line and the router resolves waiters in
//!   FIFO order per response type;
//! - default handlers (link state tracking among them) see every record
//!   of their type before any waiter does.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blelink::prelude::*;
//!
//! # async fn run() -> Result<(), BlelinkError> {
//! let helper = HelperProcess::spawn(HelperConfig::new("bluepy-helper"))?;
//! let client = Client::start(helper, ClientConfig::default()).await?;
//!
//! let stat = client.request(&Command::new("stat"), "stat").await?;
//! println!("link: {}", client.link_state());
//! println!("{stat:?}");
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod link;
mod reader;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{BlelinkError, ErrorKind};
pub use link::LinkState;

pub use blelink_future as future;
pub use blelink_protocol as protocol;
pub use blelink_router as router;
pub use blelink_transport as transport;

pub mod prelude {
    pub use crate::{BlelinkError, Client, ClientConfig, ErrorKind, LinkState};
    pub use blelink_future::{Callback, Continuation, ContinuationError, Subscriber};
    pub use blelink_protocol::{Command, Record, Value};
    pub use blelink_router::{DisconnectRule, DispatchConfig};
    pub use blelink_transport::{HelperConfig, HelperProcess, LineTransport, PipeTransport};
}
