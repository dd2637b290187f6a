//! Centralized error types for steadymine.
//!
//! Every public operation returns [`Error`]. Transport failures are carried
//! unchanged inside [`Error::Remote`]; the other variants are raised by the
//! client itself and never reach the network.

use thiserror::Error;

use crate::api::error::ApiError;
use crate::config::ConfigError;

/// The crate-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote store failed on every allowed attempt.
    ///
    /// Holds the error from the final attempt exactly as the store raised it.
    #[error(transparent)]
    Remote(#[from] ApiError),

    /// No entity of the given type carries the requested name.
    #[error("{entity} '{name}' not found")]
    NotFound {
        /// The entity type that was searched.
        entity: &'static str,
        /// The name, login or identifier that was looked up.
        name: String,
    },

    /// A call's inputs violate its contract. Raised before any network call.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// A request payload could not be encoded.
    #[error("failed to encode request payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Configuration-related errors.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Create a precondition error.
    pub fn precondition(msg: impl Into<String>) -> Self {
        Error::Precondition(msg.into())
    }

    /// Create a not-found error for a named entity.
    pub fn not_found(entity: &'static str, name: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            name: name.into(),
        }
    }

    /// Whether the entity does not exist, either by name or remotely by id.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::Remote(ApiError::NotFound(_))
        )
    }

    /// Whether the call was rejected before reaching the network.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }

    /// Get a message suitable for showing to whoever runs the automation.
    pub fn user_message(&self) -> String {
        match self {
            Error::Remote(e) => match e {
                ApiError::Unauthorized => {
                    "Authentication failed. Please check your API key or credentials.".to_string()
                }
                ApiError::Forbidden => {
                    "Access denied. You don't have permission to access this resource.".to_string()
                }
                ApiError::NotFound(resource) => format!("'{}' was not found.", resource),
                ApiError::Unprocessable(msg) => format!("Redmine rejected the request: {}", msg),
                ApiError::Network(_) => {
                    "Connection failed. Please check the network and the Redmine URL.".to_string()
                }
                other => other.to_string(),
            },
            Error::NotFound { entity, name } => format!("No {} named '{}' exists.", entity, name),
            Error::Precondition(msg) => format!("Invalid request: {}", msg),
            Error::Payload(e) => format!("Could not encode the request: {}", e),
            Error::Config(e) => format!("Configuration error: {}", e),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_api_error() {
        let err: Error = ApiError::Unauthorized.into();
        assert!(matches!(err, Error::Remote(ApiError::Unauthorized)));
    }

    #[test]
    fn test_remote_display_is_transparent() {
        let err: Error = ApiError::NotFound("issue 7".to_string()).into();
        assert_eq!(err.to_string(), "Resource not found: issue 7");
    }

    #[test]
    fn test_is_not_found_covers_both_sources() {
        assert!(Error::not_found("issue status", "Done").is_not_found());
        assert!(Error::from(ApiError::NotFound("x".to_string())).is_not_found());
        assert!(!Error::from(ApiError::Forbidden).is_not_found());
    }

    #[test]
    fn test_not_found_names_value_and_type() {
        let err = Error::not_found("issue status", "Reopened");
        let msg = err.to_string();
        assert!(msg.contains("issue status"));
        assert!(msg.contains("Reopened"));
    }

    #[test]
    fn test_user_message_precondition() {
        let err = Error::precondition("id must be positive");
        assert!(err.is_precondition());
        assert_eq!(err.user_message(), "Invalid request: id must be positive");
    }

    #[test]
    fn test_user_message_config() {
        let err: Error = ConfigError::ProfileNotFound("home".to_string()).into();
        assert!(err.user_message().contains("home"));
    }
}
