//! Dispatch configuration.

use blelink_protocol::Record;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DisconnectRule
// ---------------------------------------------------------------------------

/// Recognizes the records that report a disconnect transition.
///
/// For such records the usual order is reversed: one-shot waiters are
/// notified first, then default handlers in reverse registration order.
/// Whoever asked for the disconnect hears about it before the bookkeeping
/// that tears link state down.
///
/// A record matches when its response type equals `response_type` and any
/// of the `mode_tags` carries the text `marker`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectRule {
    /// Response type the rule applies to.
    pub response_type: String,

    /// Tags inspected for the marker.
    pub mode_tags: Vec<String>,

    /// Text that marks a disconnect.
    pub marker: String,
}

impl DisconnectRule {
    /// Returns `true` if `record` of type `response_type` is a disconnect.
    pub fn matches(&self, response_type: &str, record: &Record) -> bool {
        response_type == self.response_type
            && self
                .mode_tags
                .iter()
                .any(|tag| record.has_str(tag, &self.marker))
    }
}

impl Default for DisconnectRule {
    fn default() -> Self {
        Self {
            response_type: "conn".to_string(),
            mode_tags: vec!["mode".to_string(), "state".to_string()],
            marker: "disc".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchConfig
// ---------------------------------------------------------------------------

/// Configuration of a [`Router`](crate::Router).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Records that reverse the notification order. `None` disables the
    /// reversal entirely.
    pub disconnect: Option<DisconnectRule>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            disconnect: Some(DisconnectRule::default()),
        }
    }
}

impl DispatchConfig {
    /// Replaces the disconnect rule.
    pub fn disconnect_rule(mut self, rule: DisconnectRule) -> Self {
        self.disconnect = Some(rule);
        self
    }

    /// Always notifies defaults first.
    pub fn without_disconnect_rule(mut self) -> Self {
        self.disconnect = None;
        self
    }

    /// Returns `true` if `record` of type `response_type` is a disconnect.
    pub fn is_disconnect(&self, response_type: &str, record: &Record) -> bool {
        self.disconnect
            .as_ref()
            .is_some_and(|rule| rule.matches(response_type, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rule_matches_conn_with_disc_mode() {
        let rule = DisconnectRule::default();
        let rec = Record::new().with("rsp", "conn").with("mode", "disc");
        assert!(rule.matches("conn", &rec));
    }

    #[test]
    fn test_default_rule_checks_state_tag_too() {
        let rule = DisconnectRule::default();
        let rec = Record::new().with("rsp", "conn").with("state", "disc");
        assert!(rule.matches("conn", &rec));
    }

    #[test]
    fn test_rule_requires_matching_type() {
        let rule = DisconnectRule::default();
        let rec = Record::new().with("rsp", "stat").with("state", "disc");
        assert!(!rule.matches("stat", &rec));
    }

    #[test]
    fn test_rule_requires_marker() {
        let rule = DisconnectRule::default();
        let rec = Record::new().with("rsp", "conn").with("state", "conn");
        assert!(!rule.matches("conn", &rec));
    }

    #[test]
    fn test_dispatch_config_default_carries_standard_rule() {
        assert_eq!(
            DispatchConfig::default().disconnect,
            Some(DisconnectRule::default())
        );
    }

    #[test]
    fn test_custom_rule() {
        let config = DispatchConfig::default().disconnect_rule(DisconnectRule {
            response_type: "stat".into(),
            mode_tags: vec!["state".into()],
            marker: "disc".into(),
        });
        let rec = Record::new().with("rsp", "stat").with("state", "disc");
        assert!(config.is_disconnect("stat", &rec));
        assert!(!config.without_disconnect_rule().is_disconnect("stat", &rec));
    }
}
