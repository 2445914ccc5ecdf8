//! MQTT v3.1.1 Client
//!
//! Minimal client connecting the bridge to a broker: one TCP connection,
//! strictly sequential use, QoS 0/1 only.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{interval_at, timeout, Instant, Interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::codec::{Decoder, Encoder, DEFAULT_MAX_PACKET_SIZE};
use crate::config::BrokerConfig;
use crate::protocol::{
    ConnAck, Connect, ConnectReturnCode, Packet, PubAck, Publish, QoS, Subscribe, Subscription,
};

use super::{ClientError, Event, Transport};

/// Bytes reserved in the read buffer before each socket read
const READ_CHUNK: usize = 4096;

/// Connection parameters for [`MqttClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Broker host name or IP address
    pub host: String,
    /// Broker TCP port
    pub port: u16,
    /// Client identifier
    pub client_id: String,
    /// Username for authentication
    pub username: Option<String>,
    /// Password for authentication
    pub password: Option<String>,
    /// Keep-alive interval in seconds (0 disables keep-alive)
    pub keep_alive: u16,
    /// Request a clean session
    pub clean_session: bool,
    /// Timeout for TCP connect and for the CONNACK
    pub connect_timeout: Duration,
    /// Largest inbound packet accepted
    pub max_packet_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: String::new(),
            username: None,
            password: None,
            keep_alive: 60,
            clean_session: true,
            connect_timeout: Duration::from_secs(30),
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

impl From<&BrokerConfig> for ClientOptions {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            client_id: config.client_id.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            keep_alive: config.keep_alive,
            clean_session: config.clean_session,
            connect_timeout: config.connect_timeout_duration(),
            max_packet_size: config.max_packet_size,
        }
    }
}

/// MQTT client implementing [`Transport`]
pub struct MqttClient {
    options: ClientOptions,
    connection: Option<Connection>,
    next_packet_id: u16,
}

impl MqttClient {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            connection: None,
            next_packet_id: 1,
        }
    }

    /// Whether a connection is currently established
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Allocate the next packet identifier, skipping 0
    fn next_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = if id == u16::MAX { 1 } else { id + 1 };
        id
    }

    /// Send a packet, dropping the connection if the socket failed
    async fn send(&mut self, packet: &Packet) -> Result<(), ClientError> {
        let connection = self.connection.as_mut().ok_or(ClientError::NotConnected)?;
        let result = connection.send(packet).await;
        if let Err(ClientError::ConnectionLost(_)) = result {
            self.connection = None;
        }
        result
    }
}

#[async_trait]
impl Transport for MqttClient {
    fn broker_address(&self) -> String {
        format!("{}:{}", self.options.host, self.options.port)
    }

    fn set_credentials(&mut self, username: Option<String>, password: Option<String>) {
        self.options.username = username;
        self.options.password = password;
    }

    async fn connect(&mut self) -> Result<ConnAck, ClientError> {
        self.connection = None;

        let address = self.broker_address();
        let connect_timeout = self.options.connect_timeout;
        debug!(
            "MQTT client '{}': Connecting to {}",
            self.options.client_id, address
        );

        let stream = timeout(
            connect_timeout,
            TcpStream::connect((self.options.host.as_str(), self.options.port)),
        )
        .await
        .map_err(|_| ClientError::Timeout)?
        .map_err(|e| ClientError::ConnectionFailed(format!("{}: {}", address, e)))?;

        // Small JSON publishes should leave immediately
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let mut connection = Connection::new(stream, &self.options);

        let connect = Packet::Connect(Box::new(Connect {
            client_id: self.options.client_id.clone(),
            clean_session: self.options.clean_session,
            keep_alive: self.options.keep_alive,
            username: self.options.username.clone(),
            password: self.options.password.clone().map(Bytes::from),
        }));
        connection.send(&connect).await?;
        debug!("MQTT client '{}': CONNECT sent", self.options.client_id);

        let packet = timeout(connect_timeout, connection.read_packet())
            .await
            .map_err(|_| ClientError::Timeout)??;

        let connack = match packet {
            Packet::ConnAck(connack) => connack,
            other => {
                return Err(ClientError::Protocol(format!(
                    "expected CONNACK, got {}",
                    other.name()
                )))
            }
        };

        if connack.return_code != ConnectReturnCode::Accepted {
            return Err(ClientError::Rejected(connack.return_code));
        }

        debug!(
            "MQTT client '{}': Connected (session_present={})",
            self.options.client_id, connack.session_present
        );

        self.connection = Some(connection);
        Ok(connack)
    }

    async fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<u16, ClientError> {
        if self.connection.is_none() {
            return Err(ClientError::NotConnected);
        }

        let packet_id = self.next_packet_id();
        let subscribe = Packet::Subscribe(Subscribe {
            packet_id,
            subscriptions: vec![Subscription {
                filter: filter.to_string(),
                qos,
            }],
        });
        self.send(&subscribe).await?;

        debug!(
            "MQTT client '{}': SUBSCRIBE {} sent (packet_id={})",
            self.options.client_id, filter, packet_id
        );
        Ok(packet_id)
    }

    async fn publish(&mut self, topic: &str, payload: Bytes, qos: QoS) -> Result<(), ClientError> {
        if self.connection.is_none() {
            return Err(ClientError::NotConnected);
        }

        let packet_id = match qos {
            QoS::AtMostOnce => None,
            _ => Some(self.next_packet_id()),
        };
        let publish = Packet::Publish(Publish {
            dup: false,
            qos,
            retain: false,
            topic: topic.to_string(),
            packet_id,
            payload,
        });
        self.send(&publish).await
    }

    async fn acknowledge(&mut self, message: &Publish) -> Result<(), ClientError> {
        match (message.qos, message.packet_id) {
            (QoS::AtLeastOnce, Some(packet_id)) => {
                self.send(&Packet::PubAck(PubAck::new(packet_id))).await
            }
            _ => Ok(()),
        }
    }

    async fn poll(&mut self) -> Result<Event, ClientError> {
        let connection = self.connection.as_mut().ok_or(ClientError::NotConnected)?;
        let result = connection.next_event().await;
        if result.is_err() {
            self.connection = None;
        }
        result
    }

    async fn disconnect(&mut self) -> Result<(), ClientError> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };

        let result = connection.send(&Packet::Disconnect).await;
        if let Err(e) = connection.stream.shutdown().await {
            debug!("Socket shutdown failed: {}", e);
        }
        debug!("MQTT client '{}': DISCONNECT sent", self.options.client_id);
        result
    }
}

/// Wake-up reason while waiting for inbound data
enum Wake {
    Read(std::io::Result<usize>),
    KeepAlive,
}

/// An established broker connection
struct Connection {
    stream: TcpStream,
    encoder: Encoder,
    decoder: Decoder,
    read_buf: BytesMut,
    write_buf: BytesMut,
    keep_alive: Option<Interval>,
    awaiting_pingresp: bool,
}

impl Connection {
    fn new(stream: TcpStream, options: &ClientOptions) -> Self {
        let keep_alive = (options.keep_alive > 0).then(|| {
            let period = Duration::from_secs(options.keep_alive as u64);
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        Self {
            stream,
            encoder: Encoder::new(),
            decoder: Decoder::new().with_max_packet_size(options.max_packet_size),
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            write_buf: BytesMut::with_capacity(READ_CHUNK),
            keep_alive,
            awaiting_pingresp: false,
        }
    }

    async fn send(&mut self, packet: &Packet) -> Result<(), ClientError> {
        self.write_buf.clear();
        self.encoder.encode(packet, &mut self.write_buf)?;
        self.stream
            .write_all(&self.write_buf)
            .await
            .map_err(|e| ClientError::ConnectionLost(e.to_string()))
    }

    /// Take one complete packet off the front of the read buffer
    fn try_decode(&mut self) -> Result<Option<Packet>, ClientError> {
        match self.decoder.decode(&self.read_buf)? {
            Some((packet, consumed)) => {
                self.read_buf.advance(consumed);
                trace!("Received {}", packet.name());
                Ok(Some(packet))
            }
            None => Ok(None),
        }
    }

    fn on_read(result: std::io::Result<usize>) -> Result<(), ClientError> {
        match result {
            Ok(0) => Err(ClientError::ConnectionLost(
                "connection closed by broker".to_string(),
            )),
            Ok(_) => Ok(()),
            Err(e) => Err(ClientError::ConnectionLost(e.to_string())),
        }
    }

    /// Read the next packet without keep-alive handling (handshake only)
    async fn read_packet(&mut self) -> Result<Packet, ClientError> {
        loop {
            if let Some(packet) = self.try_decode()? {
                return Ok(packet);
            }
            self.read_buf.reserve(READ_CHUNK);
            let result = self.stream.read_buf(&mut self.read_buf).await;
            Self::on_read(result)?;
        }
    }

    /// Read the next event, sending PINGREQ whenever the keep-alive fires.
    ///
    /// Bytes are only consumed from `read_buf` once a complete packet has
    /// been decoded, and `read_buf` is cancel-safe, so dropping this future
    /// never loses inbound data.
    async fn next_event(&mut self) -> Result<Event, ClientError> {
        loop {
            if let Some(packet) = self.try_decode()? {
                return match packet {
                    Packet::Publish(publish) => Ok(Event::Message(publish)),
                    Packet::SubAck(suback) => Ok(Event::SubAck(suback)),
                    Packet::PubAck(puback) => Ok(Event::PubAck(puback.packet_id)),
                    Packet::PingResp => {
                        self.awaiting_pingresp = false;
                        Ok(Event::PingResp)
                    }
                    Packet::Disconnect => Err(ClientError::ConnectionLost(
                        "broker sent DISCONNECT".to_string(),
                    )),
                    other => Err(ClientError::Protocol(format!(
                        "unexpected {} from broker",
                        other.name()
                    ))),
                };
            }

            self.read_buf.reserve(READ_CHUNK);
            let wake = tokio::select! {
                result = self.stream.read_buf(&mut self.read_buf) => Wake::Read(result),
                _ = tick(&mut self.keep_alive) => Wake::KeepAlive,
            };

            match wake {
                Wake::Read(result) => Self::on_read(result)?,
                Wake::KeepAlive => {
                    if self.awaiting_pingresp {
                        return Err(ClientError::ConnectionLost(
                            "keep alive timeout".to_string(),
                        ));
                    }
                    self.send(&Packet::PingReq).await?;
                    self.awaiting_pingresp = true;
                    trace!("PINGREQ sent");
                }
            }
        }
    }
}

/// Wait for the next keep-alive tick, forever if keep-alive is disabled
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
