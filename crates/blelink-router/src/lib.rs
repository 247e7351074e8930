//! Response routing for blelink.
//!
//! Every record the helper sends carries a response type (`rsp=$stat`).
//! The router hands each record to the subscribers of its type:
//!
//! - one-shot **waiters**, queued by whoever sent a command and expects a
//!   reply of that type;
//! - persistent **defaults**, which see every record of their type (link
//!   state tracking, notifications).
//!
//! # Key types
//!
//! - [`Router`]: the routing tables and ordering rules
//! - [`RouterHandle`]: talk to a router running in its own task
//! - [`DispatchConfig`] / [`DisconnectRule`]: notification ordering
//! - [`Dispatch`]: what happened to a record

mod actor;
mod config;
mod error;
mod router;

pub use actor::{spawn_router, RouterHandle};
pub use config::{DisconnectRule, DispatchConfig};
pub use error::RouterError;
pub use router::{Dispatch, Router, SharedSubscriber, SubscriberCounts};
