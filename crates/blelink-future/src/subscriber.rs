//! Anything the router can deliver a value to.

use std::fmt;

use crate::{Continuation, ContinuationError, Phase};

/// A recipient of dispatched values.
///
/// The router holds subscribers behind `Arc<dyn Subscriber<T>>` and calls
/// [`accept`](Subscriber::accept) from its own task, so implementations
/// must be cheap and must not block.
pub trait Subscriber<T>: Send + Sync {
    /// Delivers one value.
    ///
    /// # Errors
    /// Whatever the subscriber refuses the value with. The router logs the
    /// failure and moves on to the next subscriber.
    fn accept(&self, value: &T) -> Result<(), ContinuationError>;

    /// Whether the subscriber can take no more values and should be
    /// dropped from the router's registries.
    fn is_retired(&self) -> bool {
        false
    }

    /// Whether the subscriber accepts more than one value. The router only
    /// takes reusable subscribers as default handlers.
    fn is_reusable(&self) -> bool {
        true
    }
}

impl<T: Clone + Send + 'static> Subscriber<T> for Continuation<T> {
    fn accept(&self, value: &T) -> Result<(), ContinuationError> {
        self.resolve(value.clone())
    }

    fn is_retired(&self) -> bool {
        match self.phase() {
            Phase::Cancelled => true,
            Phase::Resolved => !self.is_persistent(),
            Phase::Pending => false,
        }
    }

    fn is_reusable(&self) -> bool {
        self.is_persistent()
    }
}

/// A plain function used as a subscriber.
///
/// ```rust
/// use blelink_future::{Callback, Subscriber};
///
/// let cb = Callback::new(|n: &u32| println!("got {n}"));
/// cb.accept(&7).unwrap();
/// ```
pub struct Callback<F> {
    f: F,
}

impl<F> Callback<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F> Subscriber<T> for Callback<F>
where
    F: Fn(&T) + Send + Sync,
{
    fn accept(&self, value: &T) -> Result<(), ContinuationError> {
        (self.f)(value);
        Ok(())
    }
}

impl<F> fmt::Debug for Callback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}
