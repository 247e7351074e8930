//! The reader loop: lines in, dispatches out.
//!
//! The flow for every inbound line is:
//!   1. Read a line from the transport
//!   2. Decode it into a record (undecodable lines are logged and skipped)
//!   3. Hand it to the router actor and wait for the dispatch to finish
//!
//! End of stream or a read error ends the loop and marks the link down.
//! Waiters still pending at that point are left alone; their owners'
//! timeouts cover them.

use std::sync::Arc;

use blelink_protocol::Record;
use blelink_router::{Dispatch, RouterError, RouterHandle};
use blelink_transport::LineTransport;
use tokio::sync::watch;

use crate::link::{self, LinkState};

pub(crate) async fn run<T: LineTransport>(
    transport: Arc<T>,
    router: RouterHandle,
    link_state: Arc<watch::Sender<LinkState>>,
) {
    tracing::info!("reader started");

    loop {
        let line = match transport.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("helper closed the channel");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "read failed");
                break;
            }
        };

        let record = match Record::decode(&line) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, %line, "failed to decode helper line");
                continue;
            }
        };

        match router.dispatch(record).await {
            Ok(Dispatch::Unrouted { response_type }) => {
                tracing::trace!(%response_type, "unsolicited record dropped");
            }
            Ok(_) => {}
            Err(RouterError::Communication(detail)) => {
                tracing::warn!(%detail, "helper out of step");
            }
            Err(RouterError::Closed) => {
                tracing::debug!("router stopped");
                break;
            }
        }
    }

    link::update(&link_state, LinkState::Disconnected);
    tracing::info!("reader stopped");
}
