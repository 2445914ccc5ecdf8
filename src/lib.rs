//! timestamp-enricher - MQTT bridge adding timestamps to JSON messages
//!
//! Subscribes to a set of source topics, injects a Unix `timestamp` into
//! every JSON payload and republishes it to `<target prefix>/<last level>`.

pub mod bridge;
pub mod client;
pub mod codec;
pub mod config;
pub mod protocol;
pub mod topic;

pub use bridge::{run_bridge, BridgeError, BridgeSession, ShutdownHandle};
pub use client::{ClientOptions, MqttClient, Transport};
pub use config::Config;
pub use protocol::QoS;
