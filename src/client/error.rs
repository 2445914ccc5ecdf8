//! Client error type

use std::fmt;

use crate::protocol::{ConnectReturnCode, DecodeError, EncodeError};

/// Error type for broker client operations
#[derive(Debug)]
pub enum ClientError {
    /// TCP connection to the broker could not be established
    ConnectionFailed(String),
    /// Broker refused the CONNECT
    Rejected(ConnectReturnCode),
    /// Operation timed out
    Timeout,
    /// Established connection was lost
    ConnectionLost(String),
    /// Operation requires an established connection
    NotConnected,
    /// Broker sent something the client does not expect
    Protocol(String),
    /// Outbound packet could not be encoded
    Encode(EncodeError),
    /// Inbound bytes could not be decoded
    Decode(DecodeError),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            ClientError::Rejected(code) => write!(f, "Connection refused: {}", code),
            ClientError::Timeout => write!(f, "Operation timed out"),
            ClientError::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            ClientError::NotConnected => write!(f, "Not connected"),
            ClientError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            ClientError::Encode(e) => write!(f, "Encode error: {}", e),
            ClientError::Decode(e) => write!(f, "Decode error: {}", e),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Encode(e) => Some(e),
            ClientError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EncodeError> for ClientError {
    fn from(e: EncodeError) -> Self {
        ClientError::Encode(e)
    }
}

impl From<DecodeError> for ClientError {
    fn from(e: DecodeError) -> Self {
        ClientError::Decode(e)
    }
}
