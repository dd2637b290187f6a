//! API error types for the Redmine client.

use thiserror::Error;

/// Errors that can occur when talking to the Redmine REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed - invalid API key or password.
    #[error("Authentication failed: check your API key or credentials")]
    Unauthorized,

    /// Permission denied - the user lacks access to the resource.
    #[error("Permission denied: you don't have access to this resource")]
    Forbidden,

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The resource was modified concurrently.
    #[error("Conflict: the resource was modified concurrently")]
    Conflict,

    /// The server rejected the payload (HTTP 422).
    #[error("Validation failed: {0}")]
    Unprocessable(String),

    /// Rate limited by the server or a proxy in front of it.
    #[error("Rate limited: please wait before retrying")]
    RateLimited,

    /// Redmine server error.
    #[error("Redmine server error: {0}")]
    ServerError(String),

    /// Network or HTTP error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid response from the API.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Keyring error when storing/retrieving API keys.
    #[error("Keyring error: {0}")]
    Keyring(String),
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Create an error from an HTTP status code.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound(context.to_string()),
            409 => ApiError::Conflict,
            422 => ApiError::Unprocessable(context.to_string()),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(format!("HTTP {}: {}", status, context)),
            _ => ApiError::ServerError(format!("Unexpected HTTP {}: {}", status, context)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_error_from_status_401() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "test");
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn test_error_from_status_404() {
        let err = ApiError::from_status(StatusCode::NOT_FOUND, "issue 123");
        match err {
            ApiError::NotFound(msg) => assert_eq!(msg, "issue 123"),
            _ => panic!("Expected NotFound error"),
        }
    }

    #[test]
    fn test_error_from_status_422_keeps_messages() {
        let err = ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "Subject cannot be blank");
        match err {
            ApiError::Unprocessable(msg) => assert_eq!(msg, "Subject cannot be blank"),
            _ => panic!("Expected Unprocessable error"),
        }
    }

    #[test]
    fn test_error_from_status_429() {
        let err = ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, "test");
        assert!(matches!(err, ApiError::RateLimited));
    }

    #[test]
    fn test_error_from_status_500() {
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "test");
        assert!(matches!(err, ApiError::ServerError(_)));
    }

    #[test]
    fn test_error_from_status_unexpected() {
        let err = ApiError::from_status(StatusCode::IM_A_TEAPOT, "teapot");
        match err {
            ApiError::ServerError(msg) => assert!(msg.starts_with("Unexpected HTTP 418")),
            _ => panic!("Expected ServerError"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::NotFound("issue 42".to_string());
        assert_eq!(err.to_string(), "Resource not found: issue 42");
    }
}
