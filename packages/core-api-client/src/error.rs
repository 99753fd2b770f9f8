//! Core API error types

use thiserror::Error;

/// Core API client errors
#[derive(Error, Debug)]
pub enum CoreApiError {
    /// Bearer token is missing
    #[error("a bearer token is required for core API access")]
    MissingToken,

    /// Invalid input provided to an API method
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("failed to parse core API response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Requested resource does not exist
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: i64 },

    /// Token rejected
    #[error("core API rejected the bearer token ({0})")]
    Unauthorized(u16),

    /// Any other non-success response
    #[error("core API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Request timeout
    #[error("request to core API timed out")]
    Timeout,
}

impl CoreApiError {
    /// Check if this error is retryable (transient failure)
    ///
    /// Retries on timeouts, transport errors and server errors (5xx).
    /// Client errors (4xx) are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreApiError::Timeout => true,
            CoreApiError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                matches!(e.status(), Some(status) if status.is_server_error())
            }
            CoreApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type for core API operations
pub type CoreApiResult<T> = Result<T, CoreApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        let err = CoreApiError::Api {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(err.is_retryable());
        assert!(CoreApiError::Timeout.is_retryable());
    }

    #[test]
    fn test_client_errors_are_final() {
        let err = CoreApiError::Api {
            status: 422,
            body: "bad".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!CoreApiError::Unauthorized(401).is_retryable());
        assert!(!CoreApiError::NotFound {
            resource: "track",
            id: 1
        }
        .is_retryable());
    }

    #[test]
    fn test_not_found_display() {
        let err = CoreApiError::NotFound {
            resource: "track quiz audio",
            id: 9,
        };
        assert_eq!(err.to_string(), "track quiz audio 9 not found");
    }
}
