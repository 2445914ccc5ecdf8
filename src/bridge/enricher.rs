//! Payload enrichment
//!
//! Inbound payloads are UTF-8 JSON. An object gets a `timestamp` key
//! (inserted or overwritten); anything else is wrapped as
//! `{"timestamp": now, "value": <payload>}`.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};

/// Key carrying the enrichment time
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Key holding a wrapped non-object payload
pub const VALUE_KEY: &str = "value";

/// Payload could not be parsed
#[derive(Debug)]
pub enum EnrichError {
    /// Payload is not valid UTF-8
    Utf8(std::str::Utf8Error),
    /// Payload is not valid JSON
    Json(serde_json::Error),
}

impl fmt::Display for EnrichError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichError::Utf8(e) => write!(f, "payload is not valid UTF-8: {}", e),
            EnrichError::Json(e) => write!(f, "payload is not valid JSON: {}", e),
        }
    }
}

impl std::error::Error for EnrichError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EnrichError::Utf8(e) => Some(e),
            EnrichError::Json(e) => Some(e),
        }
    }
}

impl From<std::str::Utf8Error> for EnrichError {
    fn from(e: std::str::Utf8Error) -> Self {
        EnrichError::Utf8(e)
    }
}

impl From<serde_json::Error> for EnrichError {
    fn from(e: serde_json::Error) -> Self {
        EnrichError::Json(e)
    }
}

/// Parse `raw` and attach `now` (epoch seconds) as `timestamp`
pub fn enrich(raw: &[u8], now: i64) -> Result<Value, EnrichError> {
    let text = std::str::from_utf8(raw)?;
    let parsed: Value = serde_json::from_str(text)?;

    let enriched = match parsed {
        Value::Object(mut object) => {
            object.insert(TIMESTAMP_KEY.to_string(), Value::from(now));
            object
        }
        other @ (Value::Null
        | Value::Bool(_)
        | Value::Number(_)
        | Value::String(_)
        | Value::Array(_)) => {
            let mut object = Map::with_capacity(2);
            object.insert(TIMESTAMP_KEY.to_string(), Value::from(now));
            object.insert(VALUE_KEY.to_string(), other);
            object
        }
    };

    Ok(Value::Object(enriched))
}

/// Current time in whole seconds since the Unix epoch
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
