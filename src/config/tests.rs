//! Config module tests

use std::io::Write;

use pretty_assertions::assert_eq;
use test_case::test_case;

use super::*;

#[test]
fn test_substitute_env_vars_simple() {
    std::env::set_var("ENRICHER_TEST_VAR_SIMPLE", "hello");
    let result = substitute_env_vars("value = \"${ENRICHER_TEST_VAR_SIMPLE}\"");
    assert_eq!(result, "value = \"hello\"");
    std::env::remove_var("ENRICHER_TEST_VAR_SIMPLE");
}

#[test]
fn test_substitute_env_vars_with_default() {
    std::env::remove_var("ENRICHER_TEST_VAR_UNSET");
    let result = substitute_env_vars("value = \"${ENRICHER_TEST_VAR_UNSET:-fallback}\"");
    assert_eq!(result, "value = \"fallback\"");

    std::env::set_var("ENRICHER_TEST_VAR_SET", "env_value");
    let result = substitute_env_vars("value = \"${ENRICHER_TEST_VAR_SET:-fallback}\"");
    assert_eq!(result, "value = \"env_value\"");
    std::env::remove_var("ENRICHER_TEST_VAR_SET");
}

#[test]
fn test_substitute_env_vars_missing_no_default() {
    std::env::remove_var("ENRICHER_TEST_VAR_MISSING");
    let result = substitute_env_vars("value = \"${ENRICHER_TEST_VAR_MISSING}\"");
    assert_eq!(result, "value = \"\"");
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.log.level, "info");
    assert_eq!(config.broker.host, "localhost");
    assert_eq!(config.broker.port, 1883);
    assert_eq!(config.broker.username.as_deref(), Some("app"));
    assert_eq!(config.broker.password, None);
    assert_eq!(config.broker.client_id, "timestamp-message-enricher");
    assert_eq!(config.broker.keep_alive, 60);
    assert!(config.broker.clean_session);
    assert!(config.bridge.source_topics.is_empty());
    assert_eq!(config.bridge.target_topic, "timestamp-enriched");
    assert!(!config.bridge.reconnect);
}

#[test]
fn test_parse_full_config() {
    let config = Config::parse(
        r#"
[log]
level = "debug"

[broker]
host = "mqtt.local"
port = 1884
username = "bridge"
password = "secret"
keep_alive = 30

[bridge]
source_topics = ["sensors/+/temp", "devices/#"]
target_topic = "enriched"
subscribe_qos = 1
publish_qos = 1
reconnect = true
"#,
    )
    .unwrap();

    assert_eq!(config.log.tracing_level(), Level::DEBUG);
    assert_eq!(config.broker.address(), "mqtt.local:1884");
    assert_eq!(config.broker.username.as_deref(), Some("bridge"));
    assert_eq!(config.broker.password.as_deref(), Some("secret"));
    assert_eq!(config.broker.keep_alive, 30);
    assert_eq!(
        config.bridge.source_topics,
        vec!["sensors/+/temp".to_string(), "devices/#".to_string()]
    );
    assert_eq!(config.bridge.target_topic, "enriched");
    assert_eq!(config.subscribe_qos(), QoS::AtLeastOnce);
    assert_eq!(config.publish_qos(), QoS::AtLeastOnce);
    assert!(config.bridge.reconnect);
    assert_eq!(config.bridge.reconnect_interval_duration(), Duration::from_secs(5));
}

#[test]
fn test_normalize_topics() {
    let mut config = Config::default();
    config.bridge.source_topics = vec![
        " sensors/temp ".to_string(),
        "".to_string(),
        "   ".to_string(),
        "devices/#".to_string(),
    ];
    config.bridge.target_topic = "out///".to_string();
    config.normalize();

    assert_eq!(
        config.bridge.source_topics,
        vec!["sensors/temp".to_string(), "devices/#".to_string()]
    );
    assert_eq!(config.bridge.target_topic, "out");
    assert!(config.validate().is_ok());
}

#[test]
fn test_normalize_empty_username() {
    let mut config = Config::default();
    config.broker.username = Some(String::new());
    config.normalize();
    assert_eq!(config.broker.username, None);
}

#[test]
fn test_validate_requires_source_topic() {
    let err = Config::parse("[bridge]\nsource_topics = [\" \", \"\"]\n").unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
    assert!(err.to_string().contains("source topic"));
}

#[test_case("[bridge]\nsource_topics = [\"a/#/b\"]" ; "misplaced multi-level wildcard")]
#[test_case("[bridge]\nsource_topics = [\"a\"]\ntarget_topic = \"/\"" ; "target only separators")]
#[test_case("[bridge]\nsource_topics = [\"a\"]\ntarget_topic = \"out/+\"" ; "wildcard target")]
#[test_case("[bridge]\nsource_topics = [\"a\"]\npublish_qos = 2" ; "exactly once publish")]
#[test_case("[bridge]\nsource_topics = [\"a\"]\nsubscribe_qos = 2" ; "exactly once subscribe")]
#[test_case("[log]\nlevel = \"loud\"\n[bridge]\nsource_topics = [\"a\"]" ; "unknown log level")]
#[test_case("[broker]\nusername = \"\"\npassword = \"x\"\n[bridge]\nsource_topics = [\"a\"]" ; "password without username")]
#[test_case("[bridge]\nsource_topics = [\"a\"]\nreconnect_interval = 10\nmax_reconnect_interval = 5" ; "backoff bounds")]
fn test_validate_rejects(content: &str) {
    assert!(matches!(
        Config::parse(content),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn test_parse_error() {
    assert!(matches!(
        Config::parse("[bridge\nsource_topics = 1"),
        Err(ConfigError::Parse(_))
    ));
}

#[test_case("info", Some(Level::INFO))]
#[test_case("DEBUG", Some(Level::DEBUG))]
#[test_case("Warning", Some(Level::WARN))]
#[test_case("warn", Some(Level::WARN))]
#[test_case("CRITICAL", Some(Level::ERROR))]
#[test_case("error", Some(Level::ERROR))]
#[test_case("trace", Some(Level::TRACE))]
#[test_case("verbose", None)]
fn test_parse_log_level(name: &str, expected: Option<Level>) {
    assert_eq!(parse_log_level(name), expected);
}

#[test]
fn test_load_config_with_env_substitution() {
    std::env::set_var("ENRICHER_TEST_BROKER_HOST", "10.0.0.5");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[broker]
host = "${{ENRICHER_TEST_BROKER_HOST}}"
port = ${{ENRICHER_TEST_BROKER_PORT:-1999}}

[bridge]
source_topics = ["a/b"]
target_topic = "out/"
"#
    )
    .unwrap();

    let mut config = Config::load(file.path()).unwrap();
    config.normalize();
    config.validate().unwrap();

    assert_eq!(config.broker.host, "10.0.0.5");
    assert_eq!(config.broker.port, 1999);
    assert_eq!(config.broker.client_id, "timestamp-message-enricher");
    assert_eq!(config.bridge.target_topic, "out");

    std::env::remove_var("ENRICHER_TEST_BROKER_HOST");
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(dir.path().join("absent.toml")).unwrap();

    assert_eq!(config.broker.host, "localhost");
    assert_eq!(config.bridge.target_topic, "timestamp-enriched");
    assert_eq!(config.broker.username.as_deref(), Some("app"));
}
