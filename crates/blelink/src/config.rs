//! Client configuration.

use std::time::Duration;

use blelink_router::DispatchConfig;
use serde::{Deserialize, Serialize};

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout used by [`Client::request`](crate::Client::request).
    /// `None` waits forever.
    pub default_timeout: Option<Duration>,

    /// Capacity of the router's command channel.
    pub command_capacity: usize,

    /// Response type whose records drive [`LinkState`](crate::LinkState).
    /// `None` turns link tracking off.
    pub link_type: Option<String>,

    /// Notification ordering rules.
    pub dispatch: DispatchConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_timeout: Some(Duration::from_secs(10)),
            command_capacity: 64,
            link_type: Some("stat".to_string()),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    /// Tracks link state from records of `response_type`.
    pub fn link_type(mut self, response_type: impl Into<String>) -> Self {
        self.link_type = Some(response_type.into());
        self
    }

    pub fn without_link_tracking(mut self) -> Self {
        self.link_type = None;
        self
    }

    pub fn dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.default_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.command_capacity, 64);
        assert_eq!(config.link_type.as_deref(), Some("stat"));
        assert!(config.dispatch.disconnect.is_some());
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::default()
            .default_timeout(None)
            .command_capacity(4)
            .without_link_tracking();
        assert_eq!(config.default_timeout, None);
        assert_eq!(config.command_capacity, 4);
        assert_eq!(config.link_type, None);
    }
}
