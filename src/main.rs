//! timestamp-enricher - MQTT timestamp bridge
//!
//! Usage:
//!   timestamp-enricher [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>           Configuration file path
//!   --host <HOST>                 Broker host [env: MQTT_HOST] (default: localhost)
//!   --port <PORT>                 Broker port [env: MQTT_PORT] (default: 1883)
//!   --source-topics <TOPIC>...    Topics to enrich [env: SOURCE_TOPICS, comma separated]
//!   --target-topic <PREFIX>       Republish prefix [env: TARGET_TOPIC] (default: timestamp-enriched)
//!   --username <USER>             Broker username [env: MQTT_USERNAME] (default: app)
//!   --password <PASS>             Broker password [env: MQTT_PASSWORD]
//!   -l, --debug-level <LEVEL>     Log level [env: DEBUG_LEVEL] (default: info)
//!   -h, --help                    Print help

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use timestamp_enricher::bridge::{run_bridge, EXIT_CONFIG};
use timestamp_enricher::config::Config;

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    /// Only errors
    #[value(alias = "critical")]
    Error,
    /// Warnings and errors
    #[value(alias = "warning")]
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Republish JSON messages with a timestamp
#[derive(Parser, Debug)]
#[command(name = "timestamp-enricher")]
#[command(version)]
#[command(about = "MQTT bridge adding a timestamp to JSON messages")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// MQTT broker host
    #[arg(long, env = "MQTT_HOST")]
    host: Option<String>,

    /// MQTT broker port
    #[arg(long, env = "MQTT_PORT")]
    port: Option<u16>,

    /// Topics to subscribe to
    #[arg(long, env = "SOURCE_TOPICS", value_delimiter = ',', num_args = 1..)]
    source_topics: Option<Vec<String>>,

    /// Target topic prefix (default: timestamp-enriched)
    #[arg(long, env = "TARGET_TOPIC")]
    target_topic: Option<String>,

    /// MQTT broker username (default: app)
    #[arg(long, env = "MQTT_USERNAME")]
    username: Option<String>,

    /// MQTT broker password
    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, env = "DEBUG_LEVEL", value_enum, ignore_case = true)]
    debug_level: Option<LogLevel>,

    /// MQTT client identifier (default: timestamp-message-enricher)
    #[arg(long)]
    client_id: Option<String>,

    /// QoS for subscriptions and republished messages (0 or 1)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    qos: Option<u8>,

    /// Reconnect with backoff instead of exiting when the connection drops
    #[arg(long)]
    reconnect: bool,
}

impl Args {
    /// CLI args override file config
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.broker.host = host.clone();
        }
        if let Some(port) = self.port {
            config.broker.port = port;
        }
        if let Some(topics) = &self.source_topics {
            config.bridge.source_topics = topics.clone();
        }
        if let Some(target) = &self.target_topic {
            config.bridge.target_topic = target.clone();
        }
        if let Some(username) = &self.username {
            config.broker.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.broker.password = Some(password.clone());
        }
        if let Some(level) = self.debug_level {
            config.log.level = level.as_str().to_string();
        }
        if let Some(client_id) = &self.client_id {
            config.broker.client_id = client_id.clone();
        }
        if let Some(qos) = self.qos {
            config.bridge.subscribe_qos = qos;
            config.bridge.publish_qos = qos;
        }
        if self.reconnect {
            config.bridge.reconnect = true;
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration file if specified, otherwise defaults plus environment
    let loaded = match &args.config {
        Some(path) if !path.exists() => {
            eprintln!("Config file not found: {}", path.display());
            return exit_code(EXIT_CONFIG);
        }
        Some(path) => Config::load(path),
        None => Config::from_env(),
    };
    let mut config = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config file: {}", e);
            return exit_code(EXIT_CONFIG);
        }
    };

    args.apply(&mut config);
    config.normalize();
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        return exit_code(EXIT_CONFIG);
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log.tracing_level())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {}", e);
        return exit_code(EXIT_CONFIG);
    }

    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    info!("Starting timestamp enricher");
    info!("  Broker: {}", config.broker.address());
    info!("  Client ID: {}", config.broker.client_id);
    info!("  Source topics: {}", config.bridge.source_topics.join(", "));
    info!("  Target prefix: {}", config.bridge.target_topic);

    exit_code(run_bridge(&config).await)
}
