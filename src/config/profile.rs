//! Redmine connection profiles.

use serde::{Deserialize, Serialize};

use super::{ConfigError, Result};

/// A Redmine connection profile.
///
/// Profiles store where a Redmine instance lives and who to act as.
/// API keys are stored separately in the OS keychain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    /// The name of this profile.
    ///
    /// Must be non-empty and unique across all profiles.
    pub name: String,

    /// The Redmine instance URL (e.g., "https://redmine.example.com").
    pub url: String,

    /// Login to authenticate as with HTTP Basic.
    ///
    /// When absent the keyring secret is sent as an API key header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
}

impl Profile {
    /// Create a new profile that authenticates with an API key.
    pub fn new(name: String, url: String) -> Self {
        Self {
            name,
            url,
            login: None,
        }
    }

    /// Use HTTP Basic authentication with the given login.
    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    /// Validate this profile.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::ValidationError` with details if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "profile name cannot be empty".to_string(),
            ));
        }

        if self.name.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationError(format!(
                "profile name '{}' cannot contain whitespace",
                self.name
            )));
        }

        if self.url.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "profile '{}': URL cannot be empty",
                self.name
            )));
        }

        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(ConfigError::ValidationError(format!(
                "profile '{}': URL must start with http:// or https://",
                self.name
            )));
        }

        if let Some(login) = &self.login {
            if login.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "profile '{}': login cannot be blank",
                    self.name
                )));
            }
        }

        Ok(())
    }
}
