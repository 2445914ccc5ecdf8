//! Bridge Session
//!
//! Owns the broker transport and drives the subscribe, enrich and
//! republish loop until shutdown is requested or the connection fails.

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, error, info, trace, warn};

use crate::client::{ClientOptions, Event, MqttClient, Transport};
use crate::config::Config;
use crate::protocol::{Publish, QoS, SubAck, SubscribeReturnCode};

use super::enricher::{enrich, unix_timestamp};
use super::error::EXIT_OK;
use super::signals::spawn_signal_listener;
use super::{BridgeError, ConnectionState, ShutdownHandle, SubscriptionTracker, TopicMapper};

/// Subscribes to the source topics and republishes enriched messages
pub struct BridgeSession<T: Transport> {
    transport: T,
    mapper: TopicMapper,
    tracker: SubscriptionTracker,
    source_topics: Vec<String>,
    subscribe_qos: QoS,
    publish_qos: QoS,
    username: Option<String>,
    password: Option<String>,
    reconnect: bool,
    reconnect_interval: Duration,
    max_reconnect_interval: Duration,
    shutdown: ShutdownHandle,
    clock: fn() -> i64,
    /// Set once the current connection attempt got its CONNACK
    established: bool,
}

impl<T: Transport> BridgeSession<T> {
    /// Create a session from a normalized, validated configuration
    pub fn new(transport: T, config: &Config) -> Self {
        Self {
            transport,
            mapper: TopicMapper::new(config.bridge.target_topic.as_str()),
            tracker: SubscriptionTracker::new(),
            source_topics: config.bridge.source_topics.clone(),
            subscribe_qos: config.subscribe_qos(),
            publish_qos: config.publish_qos(),
            username: config.broker.username.clone(),
            password: config.broker.password.clone(),
            reconnect: config.bridge.reconnect,
            reconnect_interval: config.bridge.reconnect_interval_duration(),
            max_reconnect_interval: config.bridge.max_reconnect_interval_duration(),
            shutdown: ShutdownHandle::new(),
            clock: unix_timestamp,
            established: false,
        }
    }

    /// Replace the time source used for enrichment
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Handle for requesting shutdown from another task
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.shutdown.state()
    }

    /// Subscriptions still waiting for their SUBACK
    pub fn pending_subscriptions(&self) -> usize {
        self.tracker.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Run until shutdown is requested or the connection fails.
    ///
    /// With reconnect enabled, connection failures are retried with
    /// exponential backoff and only a shutdown request ends the run.
    pub async fn run(&mut self) -> Result<(), BridgeError> {
        let mut retry_interval = self.reconnect_interval;

        loop {
            match self.connect_and_run().await {
                Ok(()) => {
                    self.shutdown.set_state(ConnectionState::Terminated);
                    return Ok(());
                }
                Err(e) => {
                    error!("{}", e);

                    if !self.reconnect || !e.is_connection_error() || self.shutdown.is_requested()
                    {
                        self.shutdown.set_state(ConnectionState::Terminated);
                        return Err(e);
                    }

                    if self.established {
                        retry_interval = self.reconnect_interval;
                    }
                    self.shutdown.set_state(ConnectionState::Disconnected);
                    info!("Reconnecting in {:?}", retry_interval);

                    let shutdown = self.shutdown.clone();
                    tokio::select! {
                        _ = tokio::time::sleep(retry_interval) => {}
                        _ = shutdown.wait() => {
                            info!("Shutdown requested while waiting to reconnect");
                            self.shutdown.set_state(ConnectionState::Terminated);
                            return Ok(());
                        }
                    }

                    // Exponential backoff
                    retry_interval = std::cmp::min(retry_interval * 2, self.max_reconnect_interval);
                }
            }
        }
    }

    /// Connect, subscribe and process events for a single connection
    async fn connect_and_run(&mut self) -> Result<(), BridgeError> {
        self.established = false;

        if self.shutdown.is_requested() {
            info!("Shutdown requested before connecting");
            return Ok(());
        }

        self.shutdown.set_state(ConnectionState::Connecting);
        self.transport
            .set_credentials(self.username.clone(), self.password.clone());

        let address = self.transport.broker_address();
        debug!("Connecting to {}", address);

        let shutdown = self.shutdown.clone();
        let connected = tokio::select! {
            result = self.transport.connect() => Some(result),
            _ = shutdown.wait() => None,
        };

        let connack = match connected {
            Some(Ok(connack)) => connack,
            Some(Err(e)) => return Err(BridgeError::ConnectionFailure(e)),
            None => {
                info!("Shutdown requested while connecting");
                self.disconnect().await;
                return Ok(());
            }
        };

        self.established = true;
        if !self.shutdown.is_requested() {
            self.shutdown.set_state(ConnectionState::Connected);
        }
        info!("Connected to MQTT broker at {}", address);
        debug!("Session present: {}", connack.session_present);

        self.tracker.clear();
        for topic in &self.source_topics {
            let packet_id = self
                .transport
                .subscribe(topic, self.subscribe_qos)
                .await
                .map_err(BridgeError::TransportTermination)?;
            self.tracker.record(packet_id, topic.as_str());
            debug!("Subscribing to {} (packet_id={})", topic, packet_id);
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.wait() => None,
                event = self.transport.poll() => Some(event),
            };

            match next {
                Some(Ok(event)) => self.dispatch(event).await,
                Some(Err(e)) => return Err(BridgeError::TransportTermination(e)),
                None => break,
            }
        }

        self.disconnect().await;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.shutdown.set_state(ConnectionState::ShuttingDown);
        match self.transport.disconnect().await {
            Ok(()) => info!("Disconnected from MQTT broker"),
            Err(e) => warn!("Error while disconnecting from MQTT broker: {}", e),
        }
    }

    /// Handle one inbound event
    pub async fn dispatch(&mut self, event: Event) {
        match event {
            Event::Message(message) => match self.on_message(&message).await {
                Ok(_) => self.acknowledge(&message).await,
                Err(BridgeError::MalformedPayload(e)) => {
                    warn!("Dropping message on {}: {}", message.topic, e);
                    self.acknowledge(&message).await;
                }
                // Left unacknowledged so the broker redelivers QoS 1 messages
                Err(e) => error!("{}", e),
            },
            Event::SubAck(suback) => self.on_subscribe_ack(&suback),
            Event::PubAck(packet_id) => {
                debug!("Publish acknowledged (packet_id={})", packet_id)
            }
            Event::PingResp => trace!("PINGRESP received"),
        }
    }

    /// Enrich and republish an inbound message, returning the output topic
    pub async fn on_message(&mut self, message: &Publish) -> Result<String, BridgeError> {
        let enriched = enrich(&message.payload, (self.clock)())?;
        let topic = self.mapper.map(&message.topic);
        debug!("Formatted message: {}, topic: {}", enriched, message.topic);

        let payload = Bytes::from(enriched.to_string());
        if let Err(source) = self
            .transport
            .publish(&topic, payload, self.publish_qos)
            .await
        {
            return Err(BridgeError::PublishFailure { topic, source });
        }

        info!("Published message to topic: {}", topic);
        Ok(topic)
    }

    /// Log the outcome of a subscribe request
    pub fn on_subscribe_ack(&mut self, suback: &SubAck) {
        let Some(topic) = self.tracker.resolve(suback.packet_id) else {
            warn!("SUBACK for unknown packet id {}", suback.packet_id);
            return;
        };

        match suback.return_codes.first() {
            Some(SubscribeReturnCode::Granted(qos)) => {
                info!("Subscribed to topic {} (granted QoS {})", topic, *qos as u8)
            }
            Some(SubscribeReturnCode::Failure) => {
                warn!("Subscription to topic {} rejected by broker", topic)
            }
            None => warn!("Empty SUBACK for topic {}", topic),
        }
    }

    async fn acknowledge(&mut self, message: &Publish) {
        if let Err(e) = self.transport.acknowledge(message).await {
            warn!("Failed to acknowledge message on {}: {}", message.topic, e);
        }
    }
}

/// Run the bridge against the configured broker until a termination
/// signal arrives or the connection fails. Returns the process exit code.
pub async fn run_bridge(config: &Config) -> i32 {
    let client = MqttClient::new(ClientOptions::from(&config.broker));
    let mut session = BridgeSession::new(client, config);
    let listener = spawn_signal_listener(session.shutdown_handle());

    let code = match session.run().await {
        Ok(()) => EXIT_OK,
        Err(e) => e.exit_code(),
    };

    listener.abort();
    code
}
