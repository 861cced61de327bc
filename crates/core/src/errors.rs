//! Error types for the tag index core.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tag index operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied an argument the index cannot act on (e.g. an empty tag list)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing key-value store rejected or failed a command
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The audit trail could not be written after the store accepted the mutation
    #[error("Audit error: {0}")]
    Audit(String),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an audit error
    pub fn audit(message: impl Into<String>) -> Self {
        Self::Audit(message.into())
    }

    /// True when the error was caused by the caller and retrying cannot help.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

/// Errors raised by [`crate::store::KeyValueStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A command addressed a key that holds a different structure
    #[error("WRONGTYPE operation against key '{key}' holding the wrong kind of value")]
    WrongType { key: String },

    /// The store could not be reached or dropped the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A command carried a value the store cannot hold (e.g. a NaN score)
    #[error("Invalid value for key '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// The store answered with a reply shape the caller did not expect
    #[error("Unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: String, reply: String },
}

impl StoreError {
    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create an unexpected reply error
    pub fn unexpected_reply(command: impl Into<String>, reply: impl std::fmt::Debug) -> Self {
        Self::UnexpectedReply {
            command: command.into(),
            reply: format!("{:?}", reply),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_is_caller_error() {
        let err = Error::invalid_argument("At least one tag must be specified");
        assert!(err.is_caller_error());
        assert!(err.to_string().contains("At least one tag"));
    }

    #[test]
    fn store_error_converts_into_core_error() {
        let err: Error = StoreError::WrongType {
            key: "tag:rust".to_string(),
        }
        .into();
        assert!(!err.is_caller_error());
        assert!(err.to_string().contains("tag:rust"));
    }
}
