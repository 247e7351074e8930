//! Link state bookkeeping.
//!
//! The helper reports its connection state in `stat` records:
//!
//! ```text
//! rsp=$stat state=$tryconn dst=$C4:BE:84:70:69:09
//! rsp=$stat state=$conn dst=$C4:BE:84:70:69:09 mtu=h17 sec=$low
//! rsp=$stat state=$disc
//! ```
//!
//! The client installs a [`LinkTracker`] as a default handler, so the state
//! is updated before any waiter of the same record runs.

use std::fmt;
use std::sync::Arc;

use blelink_future::{ContinuationError, Subscriber};
use blelink_protocol::Record;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Tag carrying the connection state.
const STATE_TAG: &str = "state";

/// Connection state of the helper's link to a peripheral.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "info", rename_all = "lowercase")]
pub enum LinkState {
    #[default]
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    Connected {
        /// Peer address.
        dst: String,
        /// Negotiated ATT MTU.
        mtu: u64,
        /// Security level.
        sec: String,
    },
    /// A state this client doesn't interpret (scanning, for instance).
    Other(String),
}

impl LinkState {
    /// Reads the link state out of a status record.
    ///
    /// Returns `None` when the record has no `state` tag.
    pub fn from_record(record: &Record) -> Option<Self> {
        let state = record.str(STATE_TAG)?;
        let link = if record.has_str(STATE_TAG, "conn") {
            Self::Connected {
                dst: record.str("dst").unwrap_or_default().to_string(),
                mtu: record.int("mtu").unwrap_or_default(),
                sec: record.str("sec").unwrap_or_default().to_string(),
            }
        } else if record.has_str(STATE_TAG, "disc") {
            Self::Disconnected
        } else if record.has_str(STATE_TAG, "tryconn") {
            Self::Connecting
        } else {
            Self::Other(state.to_string())
        };
        Some(link)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected { dst, mtu, sec } => {
                write!(f, "connected to {dst} (mtu {mtu}, sec {sec})")
            }
            Self::Other(state) => write!(f, "{state}"),
        }
    }
}

/// Default handler that feeds status records into a watch channel.
pub(crate) struct LinkTracker {
    state: Arc<watch::Sender<LinkState>>,
}

impl LinkTracker {
    pub(crate) fn new(state: Arc<watch::Sender<LinkState>>) -> Self {
        Self { state }
    }
}

impl Subscriber<Record> for LinkTracker {
    fn accept(&self, record: &Record) -> Result<(), ContinuationError> {
        if let Some(next) = LinkState::from_record(record) {
            update(&self.state, next);
        }
        Ok(())
    }
}

/// Publishes `next`, logging actual changes only.
pub(crate) fn update(state: &watch::Sender<LinkState>, next: LinkState) {
    state.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        tracing::info!(from = %current, to = %next, "link state changed");
        *current = next;
        true
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_record() {
        let rec = Record::decode("rsp=$stat state=$conn dst=$AA:BB:CC:DD:EE:FF mtu=h17 sec=$low")
            .unwrap();
        assert_eq!(
            LinkState::from_record(&rec),
            Some(LinkState::Connected {
                dst: "AA:BB:CC:DD:EE:FF".into(),
                mtu: 23,
                sec: "low".into(),
            })
        );
    }

    #[test]
    fn test_other_states() {
        let state = |line: &str| LinkState::from_record(&Record::decode(line).unwrap());
        assert_eq!(state("rsp=$stat state=$disc"), Some(LinkState::Disconnected));
        assert_eq!(state("rsp=$stat state=$tryconn"), Some(LinkState::Connecting));
        assert_eq!(
            state("rsp=$stat state=$scan"),
            Some(LinkState::Other("scan".into()))
        );
        assert_eq!(state("rsp=$stat"), None);
    }

    #[test]
    fn test_tracker_publishes_changes_only() {
        let (tx, mut rx) = watch::channel(LinkState::Disconnected);
        let tracker = LinkTracker::new(Arc::new(tx));

        tracker
            .accept(&Record::decode("rsp=$stat state=$disc").unwrap())
            .unwrap();
        assert!(!rx.has_changed().unwrap());

        tracker
            .accept(&Record::decode("rsp=$stat state=$tryconn").unwrap())
            .unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), LinkState::Connecting);
    }

    #[test]
    fn test_link_state_json_shape() {
        let state = LinkState::Connected {
            dst: "AA:BB:CC:DD:EE:FF".into(),
            mtu: 23,
            sec: "medium".into(),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "connected");
        assert_eq!(json["info"]["mtu"], 23);
        assert_eq!(
            serde_json::to_value(LinkState::Other("scan".into())).unwrap()["info"],
            "scan"
        );
        assert!(state.is_connected());
        assert_eq!(state.to_string(), "connected to AA:BB:CC:DD:EE:FF (mtu 23, sec medium)");
    }
}
