//! Authentication handling for the Redmine API.
//!
//! Redmine accepts either an API key in the `X-Redmine-API-Key` header or
//! HTTP Basic credentials. Secrets are kept in the OS keyring.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::error::{ApiError, Result};

/// The keyring service name for steadymine secrets.
const KEYRING_SERVICE: &str = "steadymine";

/// Header carrying a Redmine API key.
pub const API_KEY_HEADER: &str = "X-Redmine-API-Key";

const AUTHORIZATION_HEADER: &str = "authorization";

/// Credentials attached to every request.
#[derive(Clone, Default)]
pub enum Auth {
    /// No credentials; only public data is reachable.
    #[default]
    Anonymous,
    /// A per-user API key.
    ApiKey(String),
    /// HTTP Basic login and password, pre-encoded.
    Basic {
        /// The login name.
        login: String,
        /// The complete "Basic ..." header value.
        header: String,
    },
}

impl Auth {
    /// Authenticate with an API key.
    pub fn api_key(key: &str) -> Self {
        Auth::ApiKey(key.to_string())
    }

    /// Authenticate with HTTP Basic credentials.
    ///
    /// The password is encoded immediately and not stored.
    pub fn basic(login: &str, password: &str) -> Self {
        Auth::Basic {
            login: login.to_string(),
            header: build_basic_header(login, password),
        }
    }

    /// Build credentials for a profile from the OS keyring.
    ///
    /// The stored secret is a password when `login` is given, otherwise an API key.
    pub fn from_keyring(profile_name: &str, login: Option<&str>) -> Result<Self> {
        let secret = get_secret(profile_name)?;
        Ok(match login {
            Some(login) => Self::basic(login, &secret),
            None => Self::api_key(&secret),
        })
    }

    /// The header to attach to requests, if any.
    pub fn header(&self) -> Option<(&'static str, &str)> {
        match self {
            Auth::Anonymous => None,
            Auth::ApiKey(key) => Some((API_KEY_HEADER, key.as_str())),
            Auth::Basic { header, .. } => Some((AUTHORIZATION_HEADER, header.as_str())),
        }
    }

    /// Whether any credentials are present.
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Auth::Anonymous)
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Anonymous => write!(f, "Anonymous"),
            Auth::ApiKey(_) => write!(f, "ApiKey(<redacted>)"),
            Auth::Basic { login, .. } => write!(f, "Basic({}, <redacted>)", login),
        }
    }
}

/// Build the Basic Auth header value.
fn build_basic_header(login: &str, password: &str) -> String {
    let credentials = format!("{}:{}", login, password);
    format!("Basic {}", BASE64.encode(credentials.as_bytes()))
}

/// Store a secret (API key or password) in the OS keyring.
pub fn store_secret(profile_name: &str, secret: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, profile_name)
        .map_err(|e| ApiError::Keyring(format!("failed to create keyring entry: {}", e)))?;

    entry
        .set_password(secret)
        .map_err(|e| ApiError::Keyring(format!("failed to store secret: {}", e)))
}

/// Retrieve a secret from the OS keyring.
pub fn get_secret(profile_name: &str) -> Result<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, profile_name)
        .map_err(|e| ApiError::Keyring(format!("failed to access keyring: {}", e)))?;

    entry
        .get_password()
        .map_err(|e| ApiError::Keyring(format!("failed to retrieve secret: {}", e)))
}

/// Delete a secret from the OS keyring.
pub fn delete_secret(profile_name: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, profile_name)
        .map_err(|e| ApiError::Keyring(format!("failed to access keyring: {}", e)))?;

    entry
        .delete_password()
        .map_err(|e| ApiError::Keyring(format!("failed to delete secret: {}", e)))
}
