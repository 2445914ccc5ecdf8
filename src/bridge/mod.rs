//! Timestamp Bridge Module
//!
//! Subscribes to the configured source topics, adds a `timestamp` to every
//! JSON message and republishes it under the target prefix.
//!
//! # Example Configuration
//!
//! ```toml
//! [broker]
//! host = "mqtt.local"
//! username = "app"
//! password = "${MQTT_PASSWORD}"
//!
//! [bridge]
//! source_topics = ["sensors/+/temp", "devices/#"]
//! target_topic = "timestamp-enriched"
//! ```
//!
//! A message on `sensors/room1/temp` is republished to
//! `timestamp-enriched/temp`.

mod enricher;
mod error;
mod session;
mod shutdown;
mod signals;
mod topic_mapper;
mod tracker;


pub use enricher::{enrich, unix_timestamp, EnrichError, TIMESTAMP_KEY, VALUE_KEY};
pub use error::{
    BridgeError, EXIT_CONFIG, EXIT_CONNECTION_FAILURE, EXIT_OK, EXIT_TRANSPORT_TERMINATION,
};
pub use session::{run_bridge, BridgeSession};
pub use shutdown::{ConnectionState, ShutdownHandle};
pub use signals::spawn_signal_listener;
pub use topic_mapper::{map_topic, TopicMapper};
pub use tracker::SubscriptionTracker;
