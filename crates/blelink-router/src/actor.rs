//! Router actor: one Tokio task that owns the [`Router`].
//!
//! Everything that touches routing state (registrations, dispatches,
//! queries) travels over one channel, so the task sees them in the order
//! they were sent. A waiter registered before its command is written is
//! therefore always in place before the reader dispatches the response.

use blelink_protocol::Record;
use tokio::sync::{mpsc, oneshot};

use crate::{Dispatch, DispatchConfig, Router, RouterError, SharedSubscriber, SubscriberCounts};

/// Commands sent to the router actor through its channel.
pub(crate) enum RouterCommand {
    /// Queue a one-shot subscriber.
    Wait {
        response_type: String,
        subscriber: SharedSubscriber,
    },

    /// Add a persistent subscriber.
    AddDefault {
        response_type: String,
        subscriber: SharedSubscriber,
        reply: oneshot::Sender<Result<(), RouterError>>,
    },

    /// Route a decoded record.
    Dispatch {
        record: Record,
        reply: oneshot::Sender<Result<Dispatch, RouterError>>,
    },

    /// Request subscriber counts for a response type.
    Counts {
        response_type: String,
        reply: oneshot::Sender<SubscriberCounts>,
    },

    /// Stop the actor.
    Shutdown,
}

/// Handle to a running router actor.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper. The client keeps
/// one, the reader task keeps another.
#[derive(Clone)]
pub struct RouterHandle {
    sender: mpsc::Sender<RouterCommand>,
}

impl RouterHandle {
    /// Queues a one-shot subscriber for the next record of `response_type`.
    ///
    /// Returns once the registration is queued ahead of any later dispatch.
    pub async fn wait(
        &self,
        response_type: &str,
        subscriber: SharedSubscriber,
    ) -> Result<(), RouterError> {
        self.send(RouterCommand::Wait {
            response_type: response_type.to_string(),
            subscriber,
        })
        .await
    }

    /// Adds a persistent subscriber for `response_type`.
    ///
    /// # Errors
    /// [`RouterError::OneShotDefault`] for a single-value subscriber,
    /// [`RouterError::Closed`] if the actor has stopped.
    pub async fn add_default(
        &self,
        response_type: &str,
        subscriber: SharedSubscriber,
    ) -> Result<(), RouterError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RouterCommand::AddDefault {
            response_type: response_type.to_string(),
            subscriber,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RouterError::Closed)?
    }

    /// Routes `record` and waits for the outcome.
    pub async fn dispatch(&self, record: Record) -> Result<Dispatch, RouterError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RouterCommand::Dispatch {
            record,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RouterError::Closed)?
    }

    /// Subscriber counts for `response_type`.
    pub async fn counts(&self, response_type: &str) -> Result<SubscriberCounts, RouterError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RouterCommand::Counts {
            response_type: response_type.to_string(),
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RouterError::Closed)
    }

    /// Number of one-shot waiters queued for `response_type`.
    pub async fn waiting(&self, response_type: &str) -> Result<usize, RouterError> {
        Ok(self.counts(response_type).await?.waiters)
    }

    /// Tells the actor to stop. Queued commands ahead of this one still run.
    pub async fn shutdown(&self) -> Result<(), RouterError> {
        self.send(RouterCommand::Shutdown).await
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, cmd: RouterCommand) -> Result<(), RouterError> {
        self.sender.send(cmd).await.map_err(|_| RouterError::Closed)
    }
}

/// Spawns a router actor on the current runtime.
///
/// `capacity` bounds the command channel (at least 1).
pub fn spawn_router(config: DispatchConfig, capacity: usize) -> RouterHandle {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let actor = RouterActor {
        router: Router::new(config),
        receiver,
    };
    tokio::spawn(actor.run());
    RouterHandle { sender }
}

struct RouterActor {
    router: Router,
    receiver: mpsc::Receiver<RouterCommand>,
}

impl RouterActor {
    async fn run(mut self) {
        tracing::info!("router actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RouterCommand::Wait {
                    response_type,
                    subscriber,
                } => {
                    self.router.register_waiter(&response_type, subscriber);
                }
                RouterCommand::AddDefault {
                    response_type,
                    subscriber,
                    reply,
                } => {
                    let result = self.router.register_default(&response_type, subscriber);
                    if let Err(e) = &result {
                        tracing::warn!(%response_type, error = %e, "default handler refused");
                    }
                    let _ = reply.send(result);
                }
                RouterCommand::Dispatch { record, reply } => {
                    let result = self.router.dispatch(&record);
                    let _ = reply.send(result);
                }
                RouterCommand::Counts {
                    response_type,
                    reply,
                } => {
                    let _ = reply.send(self.router.counts(&response_type));
                }
                RouterCommand::Shutdown => {
                    tracing::info!("router shutting down");
                    break;
                }
            }
        }

        tracing::info!("router actor stopped");
    }
}
