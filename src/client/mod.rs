//! Broker Client
//!
//! The [`Transport`] trait is the seam between the bridge session and the
//! broker connection. [`MqttClient`] implements it with MQTT v3.1.1 over
//! TCP; tests substitute scripted transports.

mod error;
mod mqtt;

pub use error::ClientError;
pub use mqtt::{ClientOptions, MqttClient};

use async_trait::async_trait;
use bytes::Bytes;

use crate::protocol::{ConnAck, Publish, QoS, SubAck};

/// Inbound event yielded by [`Transport::poll`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Message delivered on a subscribed topic
    Message(Publish),
    /// Subscribe request acknowledged
    SubAck(SubAck),
    /// Outbound QoS 1 publish acknowledged
    PubAck(u16),
    /// Keep-alive answered
    PingResp,
}

/// Connection to a publish/subscribe broker
#[async_trait]
pub trait Transport: Send {
    /// Broker address for log messages
    fn broker_address(&self) -> String;

    /// Credentials used by the next [`connect`](Transport::connect)
    fn set_credentials(&mut self, username: Option<String>, password: Option<String>);

    /// Open the connection and complete the protocol handshake
    async fn connect(&mut self) -> Result<ConnAck, ClientError>;

    /// Send a subscribe request, returning its packet identifier
    async fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<u16, ClientError>;

    /// Publish a message. Does not wait for broker acknowledgment.
    async fn publish(&mut self, topic: &str, payload: Bytes, qos: QoS) -> Result<(), ClientError>;

    /// Acknowledge an inbound message once it has been handled
    async fn acknowledge(&mut self, message: &Publish) -> Result<(), ClientError>;

    /// Wait for the next inbound event.
    ///
    /// Must be cancel-safe: dropping the future before it completes may not
    /// lose inbound data, so callers can race it against shutdown.
    async fn poll(&mut self) -> Result<Event, ClientError>;

    /// Close the connection. Calling it without a connection is a no-op.
    async fn disconnect(&mut self) -> Result<(), ClientError>;
}
