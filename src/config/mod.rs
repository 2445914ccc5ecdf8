//! Configuration Module
//!
//! Provides TOML-based configuration for the enricher with support for:
//! - Broker connection settings (host, port, credentials, keep-alive)
//! - Bridge settings (source topics, target prefix, QoS, reconnect)
//! - Log level
//! - Environment variable overrides (ENRICHER__* prefix)
//!
//! Command line values are layered on top by the binary, after which
//! [`Config::normalize`] and [`Config::validate`] must be called.

use std::path::Path;
use std::time::Duration;

use config::{Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use tracing::Level;

use crate::protocol::QoS;
use crate::topic::{validate_topic_filter, validate_topic_name, TOPIC_SEPARATOR};

pub use bridge::BridgeConfig;

mod bridge;

/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> String {
    let Ok(re) = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}") else {
        return content.to_string();
    };
    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

/// Parse a log level name.
///
/// Case-insensitive; `warning` is accepted for `warn` and `critical` or
/// `fatal` for `error`.
pub fn parse_log_level(level: &str) -> Option<Level> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" | "critical" | "fatal" => Some(Level::ERROR),
        _ => None,
    }
}

#[cfg(test)]
mod tests;

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Config crate error
    Config(config::ConfigError),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Config(e) => write!(f, "Config error: {}", e),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Config(e)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,
    /// Broker connection
    pub broker: BrokerConfig,
    /// Subscription and republish settings
    pub bridge: BridgeConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LogConfig {
    /// Resolved tracing level, falling back to INFO for unknown names
    pub fn tracing_level(&self) -> Level {
        parse_log_level(&self.level).unwrap_or(Level::INFO)
    }
}

/// Broker connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker host name or IP
    #[serde(default = "default_host")]
    pub host: String,

    /// Broker TCP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username (an empty string disables authentication)
    #[serde(default = "default_username")]
    pub username: Option<String>,

    /// Password
    pub password: Option<String>,

    /// MQTT client identifier
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Keep alive interval in seconds (0 disables keep-alive)
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u16,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Clean session flag
    #[serde(default = "default_true")]
    pub clean_session: bool,

    /// Largest packet accepted from the broker in bytes
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_username() -> Option<String> {
    Some("app".to_string())
}

fn default_client_id() -> String {
    "timestamp-message-enricher".to_string()
}

fn default_keep_alive() -> u16 {
    60
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_max_packet_size() -> usize {
    crate::codec::DEFAULT_MAX_PACKET_SIZE
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: default_username(),
            password: None,
            client_id: default_client_id(),
            keep_alive: default_keep_alive(),
            connect_timeout: default_connect_timeout(),
            clean_session: true,
            max_packet_size: default_max_packet_size(),
        }
    }
}

impl BrokerConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Broker address for log messages
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// Supports two forms of environment variable usage:
    /// 1. In-file substitution: `${VAR}` or `${VAR:-default}` syntax in the TOML file
    /// 2. Override via env vars: `ENRICHER__` prefix with double underscores for nesting:
    ///    - `ENRICHER__BROKER__HOST=mqtt.local` overrides `broker.host`
    ///    - `ENRICHER__BRIDGE__SOURCE_TOPICS=a/b,c/#` overrides `bridge.source_topics`
    ///    - `ENRICHER__BRIDGE__RECONNECT=true` overrides `bridge.reconnect`
    ///
    /// The result is neither normalized nor validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            // Start with defaults
            .set_default("log.level", "info")?
            .set_default("broker.host", "localhost")?
            .set_default("broker.port", 1883)?
            .set_default("broker.username", "app")?
            .set_default("broker.client_id", "timestamp-message-enricher")?
            .set_default("broker.keep_alive", 60)?
            .set_default("broker.connect_timeout", 30)?
            .set_default("broker.clean_session", true)?
            .set_default("bridge.target_topic", "timestamp-enriched")?
            .set_default("bridge.subscribe_qos", 0)?
            .set_default("bridge.publish_qos", 0)?
            .set_default("bridge.reconnect", false)?
            .set_default("bridge.reconnect_interval", 5)?
            .set_default("bridge.max_reconnect_interval", 60)?;

        // Load from file with env var substitution
        let path = path.as_ref();
        if !path.as_os_str().is_empty() {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    let substituted = substitute_env_vars(&content);
                    builder = builder.add_source(File::from_str(&substituted, FileFormat::Toml));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // File doesn't exist, use defaults
                }
                Err(e) => return Err(ConfigError::Io(e)),
            }
        }

        // Double underscore separates nested keys, single underscore preserved in field names
        let cfg = builder
            .add_source(
                Environment::with_prefix("ENRICHER")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("bridge.source_topics"),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    /// Load configuration with environment variable overrides only (no file).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Path::new(""))
    }

    /// Parse, normalize and validate configuration from a string (no env var support)
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Trim source topics, drop empty ones and strip trailing separators
    /// from the target prefix. An empty username means anonymous.
    pub fn normalize(&mut self) {
        self.bridge.source_topics = self
            .bridge
            .source_topics
            .iter()
            .map(|topic| topic.trim())
            .filter(|topic| !topic.is_empty())
            .map(str::to_string)
            .collect();

        self.bridge.target_topic = self
            .bridge
            .target_topic
            .trim()
            .trim_end_matches(TOPIC_SEPARATOR)
            .to_string();

        if self.broker.username.as_deref().is_some_and(str::is_empty) {
            self.broker.username = None;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if parse_log_level(&self.log.level).is_none() {
            return Err(ConfigError::Validation(format!(
                "unknown log level '{}'",
                self.log.level
            )));
        }

        if self.broker.host.is_empty() {
            return Err(ConfigError::Validation(
                "broker host cannot be empty".to_string(),
            ));
        }
        if self.broker.port == 0 {
            return Err(ConfigError::Validation(
                "broker port cannot be 0".to_string(),
            ));
        }
        if self.broker.password.is_some() && self.broker.username.is_none() {
            return Err(ConfigError::Validation(
                "password requires a username".to_string(),
            ));
        }

        if self.bridge.source_topics.is_empty() {
            return Err(ConfigError::Validation(
                "at least one source topic is required".to_string(),
            ));
        }
        for topic in &self.bridge.source_topics {
            validate_topic_filter(topic).map_err(|e| {
                ConfigError::Validation(format!("invalid source topic '{}': {}", topic, e))
            })?;
        }

        if self.bridge.target_topic.is_empty() {
            return Err(ConfigError::Validation(
                "target topic cannot be empty".to_string(),
            ));
        }
        if self.bridge.target_topic.ends_with(TOPIC_SEPARATOR) {
            return Err(ConfigError::Validation(
                "target topic cannot end with '/'".to_string(),
            ));
        }
        validate_topic_name(&self.bridge.target_topic).map_err(|e| {
            ConfigError::Validation(format!(
                "invalid target topic '{}': {}",
                self.bridge.target_topic, e
            ))
        })?;

        if self.bridge.subscribe_qos > 1 || self.bridge.publish_qos > 1 {
            return Err(ConfigError::Validation(
                "qos must be 0 or 1".to_string(),
            ));
        }

        if self.bridge.reconnect_interval == 0 {
            return Err(ConfigError::Validation(
                "reconnect_interval must be at least 1 second".to_string(),
            ));
        }
        if self.bridge.max_reconnect_interval < self.bridge.reconnect_interval {
            return Err(ConfigError::Validation(
                "max_reconnect_interval cannot be less than reconnect_interval".to_string(),
            ));
        }

        Ok(())
    }

    /// QoS requested for source subscriptions
    pub fn subscribe_qos(&self) -> QoS {
        QoS::from_u8(self.bridge.subscribe_qos).unwrap_or_default()
    }

    /// QoS of republished messages
    pub fn publish_qos(&self) -> QoS {
        QoS::from_u8(self.bridge.publish_qos).unwrap_or_default()
    }
}
