//! Single-resolution results with a chained transform pipeline.
//!
//! The router resolves a [`Continuation`] with a decoded record; whoever
//! issued the command awaits it, and may attach transforms that turn the
//! record into something more useful without losing the raw value.
//!
//! [`Subscriber`] is the seam the router delivers through. Continuations
//! implement it, and so does [`Callback`] for plain functions.

mod continuation;
mod error;
mod subscriber;

pub use continuation::{Continuation, Phase};
pub use error::ContinuationError;
pub use subscriber::{Callback, Subscriber};
