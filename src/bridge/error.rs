//! Bridge error type

use std::fmt;

use crate::client::ClientError;

use super::EnrichError;

/// Exit status of a clean run
pub const EXIT_OK: i32 = 0;
/// Exit status for configuration or startup errors
pub const EXIT_CONFIG: i32 = 1;
/// Exit status when the broker could not be reached
pub const EXIT_CONNECTION_FAILURE: i32 = 2;
/// Exit status when an established connection broke
pub const EXIT_TRANSPORT_TERMINATION: i32 = 3;

/// Error type for bridge session operations
#[derive(Debug)]
pub enum BridgeError {
    /// Connecting to the broker failed
    ConnectionFailure(ClientError),
    /// Inbound payload is not UTF-8 JSON
    MalformedPayload(EnrichError),
    /// Republishing an enriched message failed
    PublishFailure { topic: String, source: ClientError },
    /// The connection ended unexpectedly
    TransportTermination(ClientError),
}

impl BridgeError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::ConnectionFailure(_) => EXIT_CONNECTION_FAILURE,
            BridgeError::MalformedPayload(_)
            | BridgeError::PublishFailure { .. }
            | BridgeError::TransportTermination(_) => EXIT_TRANSPORT_TERMINATION,
        }
    }

    /// Whether a reconnect can recover from this error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            BridgeError::ConnectionFailure(_) | BridgeError::TransportTermination(_)
        )
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::ConnectionFailure(e) => write!(f, "Connection failure: {}", e),
            BridgeError::MalformedPayload(e) => write!(f, "Malformed payload: {}", e),
            BridgeError::PublishFailure { topic, source } => {
                write!(f, "Failed to publish to {}: {}", topic, source)
            }
            BridgeError::TransportTermination(e) => write!(f, "Transport terminated: {}", e),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::ConnectionFailure(e) | BridgeError::TransportTermination(e) => Some(e),
            BridgeError::MalformedPayload(e) => Some(e),
            BridgeError::PublishFailure { source, .. } => Some(source),
        }
    }
}

impl From<EnrichError> for BridgeError {
    fn from(e: EnrichError) -> Self {
        BridgeError::MalformedPayload(e)
    }
}
