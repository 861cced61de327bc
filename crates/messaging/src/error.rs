//! Error types for the messaging crate.

use thiserror::Error;

/// Result type alias for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Errors reported by a broker transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    /// The connection is gone; reconnecting may help
    #[error("connection closed")]
    ConnectionClosed,

    /// The broker could not be reached
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// The broker rejected an operation on an open connection
    #[error("channel error: {0}")]
    Channel(String),
}

impl BrokerError {
    pub fn refused(message: impl Into<String>) -> Self {
        Self::ConnectionRefused(message.into())
    }

    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel(message.into())
    }

    /// True when the failure means the connection itself is unusable.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}

/// Errors that can occur while publishing through a [`crate::ResilientChannel`].
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Connecting failed on every attempt the retry policy allowed
    #[error("Maximum retries of {attempts} exceeded: {last_error}")]
    RetryExhausted { attempts: u32, last_error: BrokerError },

    /// The broker rejected a publish
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload cannot be published on the requested stream
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The channel was shut down
    #[error("Channel closed")]
    Closed,
}

impl ChannelError {
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }

    /// Attempt count if this is a retry exhaustion.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::RetryExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_closed_connections_trigger_reconnect() {
        assert!(BrokerError::ConnectionClosed.is_connection_closed());
        assert!(!BrokerError::refused("down").is_connection_closed());
        assert!(!BrokerError::channel("no exchange").is_connection_closed());
    }

    #[test]
    fn retry_exhausted_reports_attempts() {
        let err = ChannelError::RetryExhausted {
            attempts: 10,
            last_error: BrokerError::refused("down"),
        };
        assert_eq!(err.attempts(), Some(10));
        assert!(err.to_string().contains("Maximum retries of 10"));
        assert_eq!(ChannelError::Closed.attempts(), None);
    }
}
