//! Bridge Configuration
//!
//! Source subscriptions, target prefix, QoS and reconnect policy.

use std::time::Duration;

use serde::Deserialize;

/// Bridge configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Topic filters to subscribe to, in order
    pub source_topics: Vec<String>,

    /// Prefix of every republished topic
    #[serde(default = "default_target_topic")]
    pub target_topic: String,

    /// QoS requested for source subscriptions (0 or 1)
    pub subscribe_qos: u8,

    /// QoS of republished messages (0 or 1)
    pub publish_qos: u8,

    /// Reconnect after connection loss instead of exiting
    pub reconnect: bool,

    /// Initial reconnect delay in seconds
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval: u64,

    /// Upper bound of the reconnect delay in seconds
    #[serde(default = "default_max_reconnect_interval")]
    pub max_reconnect_interval: u64,
}

fn default_target_topic() -> String {
    "timestamp-enriched".to_string()
}

fn default_reconnect_interval() -> u64 {
    5
}

fn default_max_reconnect_interval() -> u64 {
    60
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            source_topics: Vec::new(),
            target_topic: default_target_topic(),
            subscribe_qos: 0,
            publish_qos: 0,
            reconnect: false,
            reconnect_interval: default_reconnect_interval(),
            max_reconnect_interval: default_max_reconnect_interval(),
        }
    }
}

impl BridgeConfig {
    /// Get reconnect interval as Duration
    pub fn reconnect_interval_duration(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval)
    }

    /// Get max reconnect interval as Duration
    pub fn max_reconnect_interval_duration(&self) -> Duration {
        Duration::from_secs(self.max_reconnect_interval)
    }
}
