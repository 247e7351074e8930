//! The response router: matches decoded records to subscribers.
//!
//! Two registries, both keyed by response type:
//!
//! - **waiters**: one-shot subscribers in FIFO order. A dispatch drains
//!   the whole queue for its type, and every waiter gets the same record.
//! - **defaults**: persistent subscribers, notified on every dispatch of
//!   their type until they retire.
//!
//! # Concurrency note
//!
//! `Router` is NOT thread-safe by itself. It is owned by a single task
//! (see [`spawn_router`](crate::spawn_router)) and reached through a
//! channel, which also fixes the order of registrations relative to
//! dispatches.

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use blelink_future::{ContinuationError, Subscriber};
use blelink_protocol::{Record, RecordKind, RESPONSE_TAG};

use crate::{DispatchConfig, RouterError};

/// A subscriber as the router stores it.
pub type SharedSubscriber = Arc<dyn Subscriber<Record>>;

/// What a dispatch did with a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Blank line.
    Ignored,

    /// A comment-only line; the text is logged, never routed.
    Comment(String),

    /// A response nobody subscribed to. Dropped silently.
    Unrouted { response_type: String },

    /// Delivered to at least one subscriber.
    Delivered {
        response_type: String,
        /// One-shot waiters notified (and removed).
        waiters: usize,
        /// Default handlers notified.
        defaults: usize,
        /// Subscribers that refused the record.
        failed: usize,
        /// Whether the disconnect ordering was used.
        disconnect: bool,
    },
}

/// Subscriber counts for one response type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriberCounts {
    pub waiters: usize,
    pub defaults: usize,
}

/// Response-type router.
///
/// ## Ordering
///
/// ```text
/// normal:      defaults[0] → defaults[1] → ... → waiters[0] → waiters[1] → ...
/// disconnect:  waiters[0] → waiters[1] → ... → defaults[n-1] → ... → defaults[0]
/// ```
///
/// Defaults run first so that bookkeeping (connection state, caches) is
/// up to date by the time a waiter sees the record.
pub struct Router {
    waiters: HashMap<String, VecDeque<SharedSubscriber>>,
    defaults: HashMap<String, Vec<SharedSubscriber>>,
    config: DispatchConfig,
}

impl Router {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            waiters: HashMap::new(),
            defaults: HashMap::new(),
            config,
        }
    }

    /// The dispatch configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Queues a one-shot subscriber for the next record of `response_type`.
    ///
    /// Waiters already retired (cancelled by their owner) are dropped from
    /// the queue first, so a type that never gets a reply doesn't pile them
    /// up.
    pub fn register_waiter(&mut self, response_type: &str, subscriber: SharedSubscriber) {
        let queue = self.waiters.entry(response_type.to_string()).or_default();
        let before = queue.len();
        queue.retain(|s| !s.is_retired());
        let pruned = before - queue.len();
        queue.push_back(subscriber);
        tracing::trace!(response_type, pruned, "waiter registered");
    }

    /// Adds a persistent subscriber for every record of `response_type`.
    ///
    /// # Errors
    /// [`RouterError::OneShotDefault`] if the subscriber takes a single
    /// value only (a one-shot continuation); register it as a waiter
    /// instead.
    pub fn register_default(
        &mut self,
        response_type: &str,
        subscriber: SharedSubscriber,
    ) -> Result<(), RouterError> {
        if !subscriber.is_reusable() {
            return Err(RouterError::OneShotDefault(response_type.to_string()));
        }
        self.defaults
            .entry(response_type.to_string())
            .or_default()
            .push(subscriber);
        tracing::debug!(response_type, "default handler registered");
        Ok(())
    }

    /// Number of live one-shot waiters queued for `response_type`.
    ///
    /// Waiters cancelled by their owner aren't counted, even before the
    /// next registration or dispatch drops them.
    pub fn waiting(&self, response_type: &str) -> usize {
        self.waiters
            .get(response_type)
            .map_or(0, |q| q.iter().filter(|s| !s.is_retired()).count())
    }

    /// Number of default handlers for `response_type`.
    pub fn defaults(&self, response_type: &str) -> usize {
        self.defaults.get(response_type).map_or(0, Vec::len)
    }

    /// Both counts at once.
    pub fn counts(&self, response_type: &str) -> SubscriberCounts {
        SubscriberCounts {
            waiters: self.waiting(response_type),
            defaults: self.defaults(response_type),
        }
    }

    /// Routes one record.
    ///
    /// Subscriber failures (a cancelled waiter, say) are logged and counted
    /// in the result; they never stop the remaining subscribers.
    ///
    /// # Errors
    /// [`RouterError::Communication`] for a record with tags but no `rsp`,
    /// or with an `rsp` value that isn't text.
    pub fn dispatch(&mut self, record: &Record) -> Result<Dispatch, RouterError> {
        let response_type = match record.kind() {
            RecordKind::Empty => return Ok(Dispatch::Ignored),
            RecordKind::Comment => {
                let text = record.comment().unwrap_or_default().to_string();
                tracing::debug!(comment = %text, "helper comment");
                return Ok(Dispatch::Comment(text));
            }
            RecordKind::Malformed => {
                return Err(RouterError::Communication(format!(
                    "record without {RESPONSE_TAG} tag: {}",
                    record.encode().trim_end()
                )));
            }
            RecordKind::Response => match record.response_type() {
                Some(t) => t.to_string(),
                None => {
                    return Err(RouterError::Communication(format!(
                        "{RESPONSE_TAG} is not text: {}",
                        record.encode().trim_end()
                    )));
                }
            },
        };

        if let Some(comment) = record.comment() {
            tracing::debug!(%response_type, comment, "helper comment");
        }

        let waiters = self.waiters.remove(&response_type).unwrap_or_default();
        let defaults = self
            .defaults
            .get(&response_type)
            .map(Vec::as_slice)
            .unwrap_or_default();

        if waiters.is_empty() && defaults.is_empty() {
            tracing::debug!(%response_type, "no subscribers, record dropped");
            return Ok(Dispatch::Unrouted { response_type });
        }

        let disconnect = self.config.is_disconnect(&response_type, record);
        let failed = if disconnect {
            deliver(waiters.iter(), record, &response_type, "waiter")
                + deliver(defaults.iter().rev(), record, &response_type, "default")
        } else {
            deliver(defaults.iter(), record, &response_type, "default")
                + deliver(waiters.iter(), record, &response_type, "waiter")
        };

        let (waiter_count, default_count) = (waiters.len(), defaults.len());
        self.prune_defaults(&response_type);

        let outcome = Dispatch::Delivered {
            response_type,
            waiters: waiter_count,
            defaults: default_count,
            failed,
            disconnect,
        };
        tracing::debug!(?outcome, "record dispatched");
        Ok(outcome)
    }

    /// Drops retired default handlers for `response_type`.
    fn prune_defaults(&mut self, response_type: &str) {
        let Some(list) = self.defaults.get_mut(response_type) else {
            return;
        };
        let before = list.len();
        list.retain(|s| !s.is_retired());
        let removed = before - list.len();
        if removed > 0 {
            tracing::debug!(response_type, removed, "retired default handlers removed");
        }
        if list.is_empty() {
            self.defaults.remove(response_type);
        }
    }
}

/// Hands `record` to each subscriber in turn. Returns the failure count.
///
/// A panicking subscriber counts as a failure; the rest still run.
fn deliver<'a>(
    subscribers: impl Iterator<Item = &'a SharedSubscriber>,
    record: &Record,
    response_type: &str,
    role: &str,
) -> usize {
    let mut failed = 0;
    for subscriber in subscribers {
        match panic::catch_unwind(AssertUnwindSafe(|| subscriber.accept(record))) {
            Ok(Ok(())) => {}
            Ok(Err(ContinuationError::Cancelled)) => {
                failed += 1;
                tracing::debug!(response_type, role, "subscriber cancelled, record skipped");
            }
            Ok(Err(e)) => {
                failed += 1;
                tracing::warn!(response_type, role, error = %e, "subscriber refused record");
            }
            Err(_) => {
                failed += 1;
                tracing::warn!(response_type, role, "subscriber panicked, record skipped");
            }
        }
    }
    failed
}
