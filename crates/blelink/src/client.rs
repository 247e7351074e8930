//! The correlation layer: commands out, continuations back.
//!
//! ```text
//!  caller ──send()──→ register waiter ──→ write line ──→ helper
//!    ▲                     (router)                        │
//!    │                                                     ▼
//!  Continuation ◀── dispatch ◀── decode ◀── reader task ◀── line
//! ```
//!
//! The waiter is queued with the router *before* the line is written, and
//! both happen under one write lock. Responses of a given type therefore
//! resolve waiters in the order their commands hit the wire.

use std::sync::Arc;
use std::time::Duration;

use blelink_future::Continuation;
use blelink_protocol::{Command, ProtocolError, Record, LINE_DELIMITER};
use blelink_router::{spawn_router, RouterHandle, SharedSubscriber};
use blelink_transport::LineTransport;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::link::{self, LinkState, LinkTracker};
use crate::{reader, BlelinkError, ClientConfig};

/// A client bound to one helper.
///
/// # Example
///
/// ```rust,ignore
/// use blelink::prelude::*;
///
/// let helper = HelperProcess::spawn(HelperConfig::new("bluepy-helper"))?;
/// let client = Client::start(helper, ClientConfig::default()).await?;
///
/// let stat = client.send(&Command::new("stat"), "stat").await?;
/// let record = stat.result(Some(Duration::from_secs(5))).await?;
/// ```
pub struct Client<T: LineTransport> {
    transport: Arc<T>,
    router: RouterHandle,
    /// Held across waiter registration and the write.
    write_lock: Mutex<()>,
    link_tx: Arc<watch::Sender<LinkState>>,
    link_rx: watch::Receiver<LinkState>,
    reader: JoinHandle<()>,
    config: ClientConfig,
}

impl<T: LineTransport> Client<T> {
    /// Starts the router and reader tasks over `transport`.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(transport: T, config: ClientConfig) -> Result<Self, BlelinkError> {
        let transport = Arc::new(transport);
        let router = spawn_router(config.dispatch.clone(), config.command_capacity);

        let (link_tx, link_rx) = watch::channel(LinkState::Disconnected);
        let link_tx = Arc::new(link_tx);
        if let Some(link_type) = &config.link_type {
            let tracker = LinkTracker::new(Arc::clone(&link_tx));
            router.add_default(link_type, Arc::new(tracker)).await?;
        }

        let reader = tokio::spawn(reader::run(
            Arc::clone(&transport),
            router.clone(),
            Arc::clone(&link_tx),
        ));

        tracing::info!("client started");
        Ok(Self {
            transport,
            router,
            write_lock: Mutex::new(()),
            link_tx,
            link_rx,
            reader,
            config,
        })
    }

    /// Sends `command` and returns a continuation for the next record of
    /// type `expected`.
    ///
    /// # Errors
    /// - [`BlelinkError::Disconnected`] if the helper is gone; nothing is
    ///   registered or written
    /// - [`BlelinkError::Protocol`] if the command can't be encoded
    /// - [`BlelinkError::Transport`] if the write fails; the waiter is
    ///   cancelled
    pub async fn send(
        &self,
        command: &Command,
        expected: &str,
    ) -> Result<Continuation<Record>, BlelinkError> {
        if !self.transport.is_alive() {
            return Err(BlelinkError::Disconnected);
        }
        let line = command.encode()?;
        self.submit(&line, expected).await
    }

    /// Like [`send`](Self::send), for a line encoded by the caller.
    ///
    /// A missing terminator is added; a line break anywhere else is
    /// rejected.
    pub async fn send_line(
        &self,
        line: &str,
        expected: &str,
    ) -> Result<Continuation<Record>, BlelinkError> {
        if !self.transport.is_alive() {
            return Err(BlelinkError::Disconnected);
        }
        let body = line.strip_suffix(LINE_DELIMITER).unwrap_or(line);
        if body.is_empty() {
            return Err(ProtocolError::EmptyCommand.into());
        }
        if body.contains(['\n', '\r']) {
            return Err(ProtocolError::EmbeddedDelimiter(body.to_string()).into());
        }
        self.submit(&format!("{body}{LINE_DELIMITER}"), expected)
            .await
    }

    /// Sends `command` and waits for the response, using the configured
    /// default timeout.
    pub async fn request(&self, command: &Command, expected: &str) -> Result<Record, BlelinkError> {
        self.request_within(command, expected, self.config.default_timeout)
            .await
    }

    /// Sends `command` and waits up to `timeout` for the response.
    pub async fn request_within(
        &self,
        command: &Command,
        expected: &str,
        timeout: Option<Duration>,
    ) -> Result<Record, BlelinkError> {
        let pending = self.send(command, expected).await?;
        Ok(pending.result(timeout).await?)
    }

    /// Waits for the next record of `response_type` without sending
    /// anything (unsolicited events).
    pub async fn wait_for(&self, response_type: &str) -> Result<Continuation<Record>, BlelinkError> {
        let continuation = Continuation::new();
        self.router
            .wait(response_type, Arc::new(continuation.clone()))
            .await?;
        Ok(continuation)
    }

    /// Adds a handler for every record of `response_type`.
    ///
    /// Default handlers run before waiters of the same record (reversed on
    /// disconnect, see [`DispatchConfig`](blelink_router::DispatchConfig)).
    ///
    /// # Errors
    /// A one-shot [`Continuation`] is refused with
    /// [`RouterError::OneShotDefault`](blelink_router::RouterError::OneShotDefault);
    /// use [`Continuation::persistent`] or a
    /// [`Callback`](blelink_future::Callback).
    pub async fn register_default(
        &self,
        response_type: &str,
        subscriber: SharedSubscriber,
    ) -> Result<(), BlelinkError> {
        self.router.add_default(response_type, subscriber).await?;
        Ok(())
    }

    /// Number of live waiters queued for `response_type`.
    pub async fn waiting(&self, response_type: &str) -> Result<usize, BlelinkError> {
        Ok(self.router.waiting(response_type).await?)
    }

    /// Current link state.
    pub fn link_state(&self) -> LinkState {
        self.link_rx.borrow().clone()
    }

    /// A receiver that sees every link state change.
    pub fn watch_link_state(&self) -> watch::Receiver<LinkState> {
        self.link_rx.clone()
    }

    /// Returns `true` while the helper can be written to.
    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Stops the reader and router tasks.
    ///
    /// The transport itself is left as is; stop the helper separately.
    pub async fn shutdown(&self) {
        self.reader.abort();
        if self.router.shutdown().await.is_err() {
            tracing::debug!("router already stopped");
        }
        link::update(&self.link_tx, LinkState::Disconnected);
        tracing::info!("client shut down");
    }

    async fn submit(&self, line: &str, expected: &str) -> Result<Continuation<Record>, BlelinkError> {
        let continuation = Continuation::new();

        let _write = self.write_lock.lock().await;
        // The reader may have seen end of stream while we queued for the lock.
        if !self.transport.is_alive() {
            return Err(BlelinkError::Disconnected);
        }
        self.router
            .wait(expected, Arc::new(continuation.clone()))
            .await?;

        if let Err(e) = self.transport.write_line(line).await {
            let _ = continuation.cancel();
            tracing::warn!(error = %e, expected, "write failed, waiter cancelled");
            return Err(e.into());
        }

        tracing::debug!(line = line.trim_end(), expected, "command sent");
        Ok(continuation)
    }
}

impl<T: LineTransport> Drop for Client<T> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
