//! The chainable continuation.
//!
//! A [`Continuation`] has two slots:
//!
//! - the **primary** slot holds the raw result (for the client: the decoded
//!   record). A one-shot continuation sets it exactly once.
//! - the **chained** slot is a pipeline accumulator. Every chained
//!   transform reads it (the primary value on the first run), and its
//!   return value overwrites it.
//!
//! Keeping the two apart lets the code that created a continuation append
//! a transform (raw record → domain value) and hand the continuation on,
//! while anyone holding a clone can still read the untouched primary value.
//!
//! ```text
//!   resolve(v) ──→ primary = v
//!                    │
//!                    ▼
//!   chained = f(v) ──→ chained = g(f(v)) ──→ ... (attachment order)
//! ```
//!
//! # Concurrency
//!
//! All state sits behind one mutex, so `resolve` and `cancel` are mutually
//! exclusive: exactly one of them wins. Transforms run *outside* that lock,
//! one pipeline runner at a time; a transform attached while a pass is in
//! flight (even from inside another transform) is picked up by the running
//! pass rather than run concurrently.
//!
//! A transform that panics stops its own pipeline only: the panic is
//! caught, later transforms are dropped, and
//! [`chained_result`](Continuation::chained_result) reports
//! [`ContinuationError::TransformPanicked`]. The primary value stays
//! readable.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

use crate::ContinuationError;

type Transform<T> = Box<dyn FnMut(T) -> T + Send>;
type CancelHook = Box<dyn FnOnce() + Send>;
type Batch<T> = (Vec<Transform<T>>, T);

/// Lifecycle phase of a continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for its value.
    Pending,
    /// The primary slot holds a value.
    Resolved,
    /// Cancelled; will never resolve again.
    Cancelled,
}

struct State<T> {
    phase: Phase,
    primary: Option<T>,
    chained: Option<T>,
    /// Attached transforms that haven't seen the current value yet.
    pending: Vec<Transform<T>>,
    /// Transforms already applied to the current value. Only persistent
    /// continuations keep them, to re-run them on the next resolution.
    applied: Vec<Transform<T>>,
    /// A pipeline runner is active.
    running: bool,
    /// A persistent continuation was re-resolved while a pass was running.
    rerun: bool,
    /// A pass over the current value has completed.
    pass_done: bool,
    sealed: bool,
    /// Message of a transform panic; the pipeline is dead once set.
    failed: Option<String>,
    resolutions: u64,
    on_cancel: Vec<CancelHook>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    changed: Notify,
    persistent: bool,
}

/// A single-resolution result cell with a chained pipeline slot.
///
/// Cloning is cheap and every clone refers to the same cell.
///
/// ## One-shot vs persistent
///
/// [`Continuation::new`] creates a one-shot continuation: the router hands
/// it exactly one record. [`Continuation::persistent`] creates one meant
/// for default handlers: each [`resolve`](Self::resolve) overwrites the
/// primary slot, resets the chained slot and re-runs every attached
/// transform in attachment order.
///
/// ## Example
///
/// ```rust
/// use blelink_future::Continuation;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let c = Continuation::new();
/// c.add_chained_transform(|v: u32| v + 1).unwrap();
/// c.add_chained_transform(|v: u32| v * 10).unwrap();
/// c.resolve(4).unwrap();
///
/// assert_eq!(c.result(None).await.unwrap(), 4);
/// assert_eq!(c.chained_result(None).await.unwrap(), 50);
/// # }
/// ```
pub struct Continuation<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Continuation<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Continuation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Continuation<T> {
    /// Creates a pending one-shot continuation.
    pub fn new() -> Self {
        Self::with_kind(false)
    }

    /// Creates a pending persistent continuation (for default handlers).
    pub fn persistent() -> Self {
        Self::with_kind(true)
    }

    /// Creates a one-shot continuation that is already resolved.
    pub fn resolved(value: T) -> Self {
        let c = Self::new();
        // Fresh cell: nothing can have resolved or cancelled it yet.
        let _ = c.resolve(value);
        c
    }

    fn with_kind(persistent: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    phase: Phase::Pending,
                    primary: None,
                    chained: None,
                    pending: Vec::new(),
                    applied: Vec::new(),
                    running: false,
                    rerun: false,
                    pass_done: false,
                    sealed: false,
                    failed: None,
                    resolutions: 0,
                    on_cancel: Vec::new(),
                }),
                changed: Notify::new(),
                persistent,
            }),
        }
    }

    /// Whether this continuation re-arms on every resolution.
    pub fn is_persistent(&self) -> bool {
        self.shared.persistent
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// `true` once the primary slot holds a value (and not cancelled).
    pub fn is_resolved(&self) -> bool {
        self.phase() == Phase::Resolved
    }

    /// `true` once cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.phase() == Phase::Cancelled
    }

    /// How many times the primary slot has been set.
    pub fn resolutions(&self) -> u64 {
        self.lock().resolutions
    }

    /// Sets the primary value and runs queued transforms.
    ///
    /// Never blocks: waiters are woken, and transforms run on the calling
    /// thread unless a pass is already running elsewhere, in which case that
    /// pass picks them up.
    ///
    /// # Errors
    /// - [`ContinuationError::Cancelled`] if cancelled
    /// - [`ContinuationError::AlreadyResolved`] if this one-shot
    ///   continuation already holds a value (that value is kept)
    pub fn resolve(&self, value: T) -> Result<(), ContinuationError> {
        let run = {
            let mut st = self.lock();
            match st.phase {
                Phase::Cancelled => return Err(ContinuationError::Cancelled),
                Phase::Resolved if !self.shared.persistent => {
                    return Err(ContinuationError::AlreadyResolved);
                }
                _ => {}
            }

            st.phase = Phase::Resolved;
            st.primary = Some(value);
            st.resolutions += 1;
            st.pass_done = false;

            if self.shared.persistent {
                st.chained = None;
                if st.running {
                    // The active runner restarts from the new value once
                    // its current batch is done.
                    st.rerun = true;
                } else {
                    let mut order = std::mem::take(&mut st.applied);
                    order.append(&mut st.pending);
                    st.pending = order;
                }
            }

            if st.running {
                false
            } else if st.pending.is_empty() {
                // Nothing attached: the chained value is the primary one.
                st.pass_done = true;
                false
            } else {
                st.running = true;
                true
            }
        };

        tracing::trace!(
            persistent = self.shared.persistent,
            "continuation resolved"
        );
        self.shared.changed.notify_waiters();

        if run {
            self.run_pipeline();
        }
        Ok(())
    }

    /// Attaches a transform over the chained slot.
    ///
    /// Before resolution the transform is queued and runs exactly once,
    /// right after resolution, in attachment order. After resolution it runs
    /// immediately against the current chained value (the primary value if
    /// no transform has produced one yet) and overwrites the slot.
    ///
    /// # Errors
    /// - [`ContinuationError::Cancelled`] if cancelled
    /// - [`ContinuationError::Sealed`] after [`seal`](Self::seal)
    /// - [`ContinuationError::TransformPanicked`] once an earlier transform
    ///   has panicked
    pub fn add_chained_transform<F>(&self, f: F) -> Result<(), ContinuationError>
    where
        F: FnMut(T) -> T + Send + 'static,
    {
        self.attach(Box::new(f), None)
    }

    /// Queues `transform`, and `hook` with it, in one critical section.
    fn attach(
        &self,
        transform: Transform<T>,
        hook: Option<CancelHook>,
    ) -> Result<(), ContinuationError> {
        let run = {
            let mut st = self.lock();
            if st.phase == Phase::Cancelled {
                return Err(ContinuationError::Cancelled);
            }
            if st.sealed {
                return Err(ContinuationError::Sealed);
            }
            if let Some(msg) = &st.failed {
                return Err(ContinuationError::TransformPanicked(msg.clone()));
            }
            st.pending.push(transform);
            st.on_cancel.extend(hook);
            if st.phase == Phase::Resolved && !st.running {
                st.running = true;
                st.pass_done = false;
                true
            } else {
                false
            }
        };

        if run {
            self.run_pipeline();
        }
        Ok(())
    }

    /// Appends a typed pipeline stage.
    ///
    /// The returned continuation is resolved with `f` applied to the chained
    /// value at this point of the pipeline; the value itself passes through
    /// unchanged, so transforms attached later still see it. The new
    /// continuation is persistent when `self` is, and is cancelled when
    /// `self` is cancelled or its pipeline panics.
    ///
    /// # Errors
    /// Same as [`add_chained_transform`](Self::add_chained_transform).
    pub fn then<U, F>(&self, mut f: F) -> Result<Continuation<U>, ContinuationError>
    where
        U: Clone + Send + 'static,
        F: FnMut(&T) -> U + Send + 'static,
    {
        let next = Continuation::<U>::with_kind(self.is_persistent());

        let downstream = next.clone();
        let transform: Transform<T> = Box::new(move |value: T| {
            if let Err(e) = downstream.resolve(f(&value)) {
                tracing::debug!(error = %e, "downstream continuation refused value");
            }
            value
        });
        let downstream = next.clone();
        let hook: CancelHook = Box::new(move || {
            let _ = downstream.cancel();
        });
        self.attach(transform, Some(hook))?;

        Ok(next)
    }

    /// Cancels the continuation.
    ///
    /// Queued transforms are dropped and every waiter wakes with
    /// [`ContinuationError::Cancelled`]. Cancelling twice is a no-op.
    /// A persistent continuation can be cancelled at any time; that retires
    /// it from the router's default registry.
    ///
    /// # Errors
    /// [`ContinuationError::AlreadyResolved`] if this one-shot continuation
    /// already resolved: the in-flight resolution wins.
    pub fn cancel(&self) -> Result<(), ContinuationError> {
        let hooks = {
            let mut st = self.lock();
            match st.phase {
                Phase::Cancelled => return Ok(()),
                Phase::Resolved if !self.shared.persistent => {
                    return Err(ContinuationError::AlreadyResolved);
                }
                _ => {}
            }
            st.phase = Phase::Cancelled;
            st.pending.clear();
            st.applied.clear();
            std::mem::take(&mut st.on_cancel)
        };

        tracing::trace!(
            persistent = self.shared.persistent,
            "continuation cancelled"
        );
        for hook in hooks {
            hook();
        }
        self.shared.changed.notify_waiters();
        Ok(())
    }

    /// Refuses further transforms. Transforms already attached still run.
    pub fn seal(&self) {
        self.lock().sealed = true;
    }

    /// The primary value, if resolved. Never waits.
    pub fn try_result(&self) -> Option<T> {
        let st = self.lock();
        match st.phase {
            Phase::Resolved => st.primary.clone(),
            _ => None,
        }
    }

    /// Waits for the primary value.
    ///
    /// `None` waits without limit.
    ///
    /// # Errors
    /// - [`ContinuationError::Cancelled`] if cancelled before or while
    ///   waiting
    /// - [`ContinuationError::Timeout`] when `timeout` expires first
    pub async fn result(&self, timeout: Option<Duration>) -> Result<T, ContinuationError> {
        self.wait_until(timeout, |st| match st.phase {
            Phase::Cancelled => Some(Err(ContinuationError::Cancelled)),
            Phase::Resolved => st.primary.clone().map(Ok),
            Phase::Pending => None,
        })
        .await
    }

    /// Waits for the output of the chained pipeline.
    ///
    /// Returns once the primary value is set and a pass over it has
    /// completed with no pass still running. A continuation with no
    /// transforms completes its pass at resolution, with the primary value
    /// as output.
    ///
    /// # Errors
    /// Same as [`result`](Self::result), plus
    /// [`ContinuationError::TransformPanicked`] if a transform panicked.
    pub async fn chained_result(
        &self,
        timeout: Option<Duration>,
    ) -> Result<T, ContinuationError> {
        self.wait_until(timeout, |st| match st.phase {
            Phase::Cancelled => Some(Err(ContinuationError::Cancelled)),
            Phase::Resolved if st.failed.is_some() => st
                .failed
                .clone()
                .map(|msg| Err(ContinuationError::TransformPanicked(msg))),
            Phase::Resolved if st.pass_done && !st.running => {
                st.chained.clone().or_else(|| st.primary.clone()).map(Ok)
            }
            _ => None,
        })
        .await
    }

    async fn wait_until<R>(
        &self,
        timeout: Option<Duration>,
        check: impl Fn(&State<T>) -> Option<Result<R, ContinuationError>>,
    ) -> Result<R, ContinuationError> {
        let wait = async {
            loop {
                // Register interest before checking, so a notification sent
                // between the check and the await isn't lost.
                let notified = self.shared.changed.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                let outcome = {
                    let st = self.lock();
                    check(&st)
                };
                if let Some(outcome) = outcome {
                    return outcome;
                }
                notified.await;
            }
        };

        match timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ContinuationError::Timeout(limit)),
            },
            None => wait.await,
        }
    }

    /// Runs batches of pending transforms until none are left.
    ///
    /// The caller must have set `running`.
    fn run_pipeline(&self) {
        let mut next = self.finish_batch(None);
        while let Some((mut batch, seed)) = next {
            let pass = panic::catch_unwind(AssertUnwindSafe(|| {
                batch
                    .iter_mut()
                    .fold(seed, |acc, transform| transform(acc))
            }));
            next = match pass {
                Ok(acc) => self.finish_batch(Some((batch, acc))),
                Err(payload) => {
                    self.fail_pipeline(panic_message(payload.as_ref()));
                    None
                }
            };
        }
        self.shared.changed.notify_waiters();
    }

    /// Stops the pipeline after a transform panicked.
    ///
    /// Remaining transforms are dropped and continuations created by
    /// [`then`](Self::then) are cancelled, since they can't be fed any more.
    fn fail_pipeline(&self, msg: String) {
        let hooks = {
            let mut st = self.lock();
            st.failed = Some(msg.clone());
            st.pending.clear();
            st.applied.clear();
            st.chained = None;
            st.rerun = false;
            st.running = false;
            st.pass_done = true;
            std::mem::take(&mut st.on_cancel)
        };
        tracing::warn!(
            persistent = self.shared.persistent,
            panic = %msg,
            "chained transform panicked, pipeline stopped"
        );
        for hook in hooks {
            hook();
        }
    }

    /// Stores the output of a finished batch and takes the next one.
    ///
    /// Clears `running` when nothing is left.
    fn finish_batch(&self, done: Option<Batch<T>>) -> Option<Batch<T>> {
        let mut st = self.lock();

        if let Some((mut batch, acc)) = done {
            if st.rerun {
                // Re-resolved mid-pass: discard the output and replay the
                // whole pipeline, in attachment order, over the new value.
                st.rerun = false;
                let mut order = std::mem::take(&mut st.applied);
                order.append(&mut batch);
                order.append(&mut st.pending);
                st.pending = order;
                st.chained = None;
            } else {
                st.chained = Some(acc);
                if self.shared.persistent {
                    st.applied.append(&mut batch);
                }
            }
        }

        let next = Self::next_batch(&mut st);
        if next.is_none() {
            st.running = false;
            st.pass_done = true;
        }
        next
    }

    fn next_batch(st: &mut State<T>) -> Option<Batch<T>> {
        if st.pending.is_empty() || st.phase == Phase::Cancelled {
            return None;
        }
        let seed = match st.chained.take() {
            Some(v) => v,
            None => st.primary.clone()?,
        };
        Some((std::mem::take(&mut st.pending), seed))
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // A panic inside a transform never happens under this lock, so a
        // poisoned state is still consistent.
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<T> fmt::Debug for Continuation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Continuation");
        d.field("persistent", &self.shared.persistent);
        match self.shared.state.try_lock() {
            Ok(st) => {
                d.field("phase", &st.phase)
                    .field("resolutions", &st.resolutions)
                    .field("pending_transforms", &st.pending.len());
            }
            Err(_) => {
                d.field("phase", &"<locked>");
            }
        }
        d.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SHORT: Option<Duration> = Some(Duration::from_millis(50));

    #[tokio::test]
    async fn test_resolve_then_result() {
        let c = Continuation::new();
        c.resolve("v".to_string()).unwrap();
        assert_eq!(c.result(SHORT).await.unwrap(), "v");
        assert!(c.is_resolved());
    }

    #[tokio::test]
    async fn test_double_resolve_fails_and_keeps_first_value() {
        let c = Continuation::new();
        c.resolve(1).unwrap();
        assert_eq!(c.resolve(2), Err(ContinuationError::AlreadyResolved));
        assert_eq!(c.result(SHORT).await.unwrap(), 1);
        assert_eq!(c.resolutions(), 1);
    }

    #[tokio::test]
    async fn test_transforms_attached_before_resolution_compose_in_order() {
        let f_calls = Arc::new(AtomicUsize::new(0));
        let g_calls = Arc::new(AtomicUsize::new(0));

        let c = Continuation::new();
        let fc = Arc::clone(&f_calls);
        c.add_chained_transform(move |v: i64| {
            fc.fetch_add(1, Ordering::SeqCst);
            v + 3
        })
        .unwrap();
        let gc = Arc::clone(&g_calls);
        c.add_chained_transform(move |v: i64| {
            gc.fetch_add(1, Ordering::SeqCst);
            v * 2
        })
        .unwrap();

        assert_eq!(f_calls.load(Ordering::SeqCst), 0);
        c.resolve(5).unwrap();

        // g(f(5)) = (5 + 3) * 2
        assert_eq!(c.chained_result(SHORT).await.unwrap(), 16);
        assert_eq!(c.result(SHORT).await.unwrap(), 5);
        assert_eq!(f_calls.load(Ordering::SeqCst), 1);
        assert_eq!(g_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_late_transform_runs_immediately_on_current_chained_value() {
        let c = Continuation::new();
        c.add_chained_transform(|v: i64| v + 1).unwrap();
        c.resolve(1).unwrap();
        assert_eq!(c.chained_result(SHORT).await.unwrap(), 2);

        // Runs synchronously inside the call.
        c.add_chained_transform(|v: i64| v * 100).unwrap();
        assert_eq!(c.chained_result(SHORT).await.unwrap(), 200);
        assert_eq!(c.try_result(), Some(1));
    }

    #[tokio::test]
    async fn test_chained_result_without_transforms_is_primary() {
        let c = Continuation::resolved(9u8);
        assert_eq!(c.chained_result(SHORT).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_transform_attached_from_inside_a_transform_runs_after_it() {
        let c = Continuation::new();
        let inner = c.clone();
        c.add_chained_transform(move |v: Vec<&'static str>| {
            inner
                .add_chained_transform(|mut v: Vec<&'static str>| {
                    v.push("nested");
                    v
                })
                .unwrap();
            let mut v = v;
            v.push("outer");
            v
        })
        .unwrap();
        c.resolve(vec![]).unwrap();
        assert_eq!(
            c.chained_result(SHORT).await.unwrap(),
            vec!["outer", "nested"]
        );
    }

    #[tokio::test]
    async fn test_cancel_then_resolve_fails() {
        let c = Continuation::<u8>::new();
        c.cancel().unwrap();
        assert_eq!(c.resolve(1), Err(ContinuationError::Cancelled));
        assert_eq!(
            c.add_chained_transform(|v| v),
            Err(ContinuationError::Cancelled)
        );
        assert_eq!(c.result(SHORT).await, Err(ContinuationError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_after_resolve_fails_and_keeps_value() {
        let c = Continuation::new();
        c.resolve(3).unwrap();
        assert_eq!(c.cancel(), Err(ContinuationError::AlreadyResolved));
        assert_eq!(c.result(SHORT).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let c = Continuation::<u8>::new();
        c.cancel().unwrap();
        c.cancel().unwrap();
        assert!(c.is_cancelled());
    }

    #[tokio::test]
    async fn test_seal_rejects_new_transforms_but_runs_queued_ones() {
        let c = Continuation::new();
        c.add_chained_transform(|v: u8| v + 1).unwrap();
        c.seal();
        assert_eq!(
            c.add_chained_transform(|v| v),
            Err(ContinuationError::Sealed)
        );
        c.resolve(1).unwrap();
        assert_eq!(c.chained_result(SHORT).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_persistent_overwrites_and_reruns_transforms() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Continuation::persistent();
        let counter = Arc::clone(&calls);
        c.add_chained_transform(move |v: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            v * 2
        })
        .unwrap();

        c.resolve(1).unwrap();
        assert_eq!(c.chained_result(SHORT).await.unwrap(), 2);
        c.resolve(5).unwrap();
        assert_eq!(c.result(SHORT).await.unwrap(), 5);
        assert_eq!(c.chained_result(SHORT).await.unwrap(), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(c.resolutions(), 2);
    }

    #[tokio::test]
    async fn test_persistent_can_be_cancelled_after_resolution() {
        let c = Continuation::persistent();
        c.resolve(1u8).unwrap();
        c.cancel().unwrap();
        assert_eq!(c.resolve(2), Err(ContinuationError::Cancelled));
    }

    #[tokio::test]
    async fn test_then_produces_typed_continuation() {
        let c = Continuation::new();
        c.add_chained_transform(|v: u32| v + 1).unwrap();
        let text = c.then(|v: &u32| format!("value={v}")).unwrap();
        c.add_chained_transform(|v: u32| v * 3).unwrap();

        c.resolve(1).unwrap();
        assert_eq!(text.result(SHORT).await.unwrap(), "value=2");
        // The stage passes its input through.
        assert_eq!(c.chained_result(SHORT).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_then_is_cancelled_with_its_source() {
        let c = Continuation::<u8>::new();
        let next = c.then(|v| *v as u16).unwrap();
        c.cancel().unwrap();
        assert_eq!(next.result(SHORT).await, Err(ContinuationError::Cancelled));
    }

    #[tokio::test]
    async fn test_then_hook_is_registered_with_its_transform() {
        let c = Continuation::<u8>::new();
        let next = c.then(|v| *v as u16).unwrap();
        assert_eq!(c.lock().on_cancel.len(), 1);
        assert_eq!(c.lock().pending.len(), 1);
        c.cancel().unwrap();
        assert!(next.is_cancelled());
    }

    #[tokio::test]
    async fn test_panicking_transform_stops_only_its_pipeline() {
        let after = Arc::new(AtomicUsize::new(0));
        let c = Continuation::new();
        c.add_chained_transform(|v: u32| v + 1).unwrap();
        c.add_chained_transform(|_: u32| -> u32 { panic!("bad value") })
            .unwrap();
        let counter = Arc::clone(&after);
        c.add_chained_transform(move |v: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            v
        })
        .unwrap();

        // The panic doesn't escape to the resolver.
        c.resolve(1).unwrap();

        assert_eq!(c.result(SHORT).await.unwrap(), 1);
        assert_eq!(
            c.chained_result(SHORT).await,
            Err(ContinuationError::TransformPanicked("bad value".into()))
        );
        assert_eq!(after.load(Ordering::SeqCst), 0);
        assert!(matches!(
            c.add_chained_transform(|v| v),
            Err(ContinuationError::TransformPanicked(_))
        ));
    }

    #[tokio::test]
    async fn test_panicking_stage_cancels_its_typed_continuation() {
        let c = Continuation::<u8>::new();
        let next = c
            .then(|v: &u8| -> u16 { panic!("stage failed on {v}") })
            .unwrap();
        c.resolve(7).unwrap();
        assert_eq!(next.result(SHORT).await, Err(ContinuationError::Cancelled));
    }

    #[tokio::test]
    async fn test_persistent_keeps_resolving_after_a_transform_panic() {
        let c = Continuation::persistent();
        c.add_chained_transform(|_: u8| -> u8 { panic!("boom") })
            .unwrap();
        c.resolve(1).unwrap();
        c.resolve(2).unwrap();
        assert_eq!(c.result(SHORT).await.unwrap(), 2);
        assert!(matches!(
            c.chained_result(SHORT).await,
            Err(ContinuationError::TransformPanicked(_))
        ));
        assert!(!c.lock().running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_times_out() {
        let c = Continuation::<u8>::new();
        let limit = Duration::from_secs(5);
        assert_eq!(
            c.result(Some(limit)).await,
            Err(ContinuationError::Timeout(limit))
        );
        assert_eq!(
            c.chained_result(Some(limit)).await,
            Err(ContinuationError::Timeout(limit))
        );
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_resolution_from_another_task() {
        let c = Continuation::new();
        let resolver = c.clone();
        let handle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            resolver.resolve(42u16).unwrap();
        });
        assert_eq!(c.result(Some(Duration::from_secs(5))).await.unwrap(), 42);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_cancellation() {
        let c = Continuation::<u16>::new();
        let canceller = c.clone();
        let handle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            canceller.cancel().unwrap();
        });
        assert_eq!(
            c.chained_result(Some(Duration::from_secs(5))).await,
            Err(ContinuationError::Cancelled)
        );
        handle.await.unwrap();
    }

    #[test]
    fn test_debug_output_names_phase() {
        let c = Continuation::<u8>::new();
        let s = format!("{c:?}");
        assert!(s.contains("Pending"));
        assert!(s.contains("persistent: false"));
    }
}
