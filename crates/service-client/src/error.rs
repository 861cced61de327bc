//! Error types for the service client crate.

use thiserror::Error;

/// Result type alias for service client operations.
pub type Result<T> = std::result::Result<T, ServiceClientError>;

/// Retry policy class for request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
    /// The resource does not exist; asking again cannot change that.
    NotFound,
}

/// Errors that can occur when calling a remote service.
#[derive(Debug, Error)]
pub enum ServiceClientError {
    /// The service answered 404 for the path
    #[error("Not found: {path}")]
    NotFound { path: String },

    /// Every attempt the retry policy allowed failed
    #[error("Maximum retries of {attempts} exceeded: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    /// Non-success response from the service
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid request (bad base URL, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ServiceClientError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::NotFound { .. } => RetryClass::NotFound,
            Self::Api { status, .. } => match *status {
                408 | 429 | 500..=599 => RetryClass::Retryable,
                _ => RetryClass::Permanent,
            },
            Self::Http(err) => {
                if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
                    RetryClass::Retryable
                } else {
                    RetryClass::Permanent
                }
            }
            Self::RetryExhausted { .. } => RetryClass::Permanent,
            Self::Json(_) => RetryClass::Permanent,
            Self::InvalidRequest(_) => RetryClass::Permanent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_throttling_are_retryable() {
        for status in [408, 429, 500, 502, 503, 599] {
            assert_eq!(
                ServiceClientError::api(status, "busy").retry_class(),
                RetryClass::Retryable,
                "status {}",
                status
            );
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        for status in [400, 401, 403, 409, 422] {
            assert_eq!(
                ServiceClientError::api(status, "no").retry_class(),
                RetryClass::Permanent
            );
        }
    }

    #[test]
    fn not_found_has_its_own_class() {
        let err = ServiceClientError::NotFound {
            path: "/links/1".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.retry_class(), RetryClass::NotFound);
        assert_eq!(err.status_code(), Some(404));
    }
}
