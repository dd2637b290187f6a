//! Redmine REST API client implementation.
//!
//! [`RestClient`] implements [`RemoteStore`] over the Redmine JSON API using a
//! blocking HTTP client. Each method performs exactly one request; retrying is
//! left to the caller.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::auth::Auth;
use super::error::{ApiError, Result};
use super::store::{ListFilter, Page, RemoteStore, Resource};
use super::types::{UploadToken, User};
use crate::config::Profile;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The Redmine REST client.
#[derive(Debug, Clone)]
pub struct RestClient {
    /// The HTTP client.
    client: Client,
    /// The base URL for the Redmine instance.
    base_url: String,
    /// Authentication credentials.
    auth: Auth,
}

impl RestClient {
    /// Create a client with explicit credentials.
    pub fn new(base_url: &str, auth: Auth) -> Result<Self> {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self {
            client: Self::build_http_client()?,
            base_url: normalize_base_url(base_url),
            auth,
        })
    }

    /// Create a client authenticating with an API key.
    pub fn with_api_key(base_url: &str, api_key: &str) -> Result<Self> {
        Self::new(base_url, Auth::api_key(api_key))
    }

    /// Create a client authenticating with HTTP Basic credentials.
    pub fn with_basic_auth(base_url: &str, login: &str, password: &str) -> Result<Self> {
        Self::new(base_url, Auth::basic(login, password))
    }

    /// Create a client without credentials.
    pub fn anonymous(base_url: &str) -> Result<Self> {
        Self::new(base_url, Auth::Anonymous)
    }

    /// Create a client from a profile, reading the secret from the OS keyring.
    #[instrument(skip(profile), fields(profile_name = %profile.name))]
    pub fn from_profile(profile: &Profile) -> Result<Self> {
        let auth = Auth::from_keyring(&profile.name, profile.login.as_deref())?;
        Self::new(&profile.url, auth)
    }

    /// Build the HTTP client with appropriate settings.
    fn build_http_client() -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(ApiError::Network)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        match self.auth.header() {
            Some((name, value)) => builder.header(name, value),
            None => builder,
        }
    }

    fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send()?;
        let response = check_status(response)?;
        response
            .json::<T>()
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        let response = builder.send()?;
        check_status(response).map(|_| ())
    }
}

impl RemoteStore for RestClient {
    fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    #[instrument(skip(self), fields(entity = T::TYPE_NAME))]
    fn get<T: Resource>(&self, id: u32, include: &[&str]) -> Result<T> {
        let mut url = self.url(&format!("{}/{}", T::PATH, id));
        if !include.is_empty() {
            url.push_str("?include=");
            url.push_str(&urlencoding::encode(&include.join(",")));
        }
        debug!("Fetching entity");

        let body: Value = self.send_json(self.request(Method::GET, &url))?;
        unwrap_entity(body, T::TYPE_NAME)
    }

    #[instrument(skip(self, filter), fields(entity = T::TYPE_NAME, offset = filter.offset))]
    fn list<T: Resource>(&self, filter: &ListFilter) -> Result<Page<T>> {
        let path = match &filter.scope {
            Some(scope) => format!("{}/{}", scope, T::PATH),
            None => T::PATH.to_string(),
        };
        let url = format!("{}{}", self.url(&path), list_query(filter));
        debug!(url = %url, "Listing entities");

        let body: Value = self.send_json(self.request(Method::GET, &url))?;
        let page = parse_page(body, T::COLLECTION_KEY, filter)?;
        debug!(count = page.items.len(), total = ?page.total_count, "Fetched page");
        Ok(page)
    }

    #[instrument(skip(self, payload), fields(entity = T::TYPE_NAME))]
    fn create<T: Resource>(&self, scope: Option<&str>, payload: &Value) -> Result<T> {
        let path = match scope {
            Some(scope) => format!("{}/{}", scope, T::PATH),
            None => T::PATH.to_string(),
        };
        let body = wrap(T::TYPE_NAME, payload);
        let url = self.url(&path);

        let created: Value = self.send_json(self.request(Method::POST, &url).json(&body))?;
        unwrap_entity(created, T::TYPE_NAME)
    }

    #[instrument(skip(self, payload), fields(entity = T::TYPE_NAME))]
    fn update<T: Resource>(&self, id: u32, payload: &Value) -> Result<()> {
        let body = wrap(T::TYPE_NAME, payload);
        let url = self.url(&format!("{}/{}", T::PATH, id));
        self.send_empty(self.request(Method::PUT, &url).json(&body))
    }

    #[instrument(skip(self), fields(entity = T::TYPE_NAME))]
    fn delete<T: Resource>(&self, id: u32) -> Result<()> {
        let url = self.url(&format!("{}/{}", T::PATH, id));
        self.send_empty(self.request(Method::DELETE, &url))
    }

    #[instrument(skip(self, content), fields(size = content.len()))]
    fn upload(&self, filename: &str, content: &[u8]) -> Result<UploadToken> {
        let url = format!(
            "{}?filename={}",
            self.url("uploads"),
            urlencoding::encode(filename)
        );
        let builder = self
            .request(Method::POST, &url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(content.to_vec());

        let body: Value = self.send_json(builder)?;
        unwrap_entity(body, "upload")
    }

    #[instrument(skip(self))]
    fn current_user(&self) -> Result<User> {
        let url = self.url("users/current");
        let body: Value = self.send_json(self.request(Method::GET, &url))?;
        unwrap_entity(body, "user")
    }
}

/// Turn a non-success response into an error.
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let error_body = response.text().unwrap_or_default();
    debug!("Error response body: {}", error_body);
    Err(error_from_response(status, &url, &error_body))
}

/// Create an appropriate error from an HTTP response.
///
/// Redmine reports validation failures as `{"errors": ["...", ...]}`.
fn error_from_response(status: StatusCode, url: &str, body: &str) -> ApiError {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(errors) = json.get("errors").and_then(Value::as_array) {
            let messages: Vec<&str> = errors.iter().filter_map(Value::as_str).collect();
            if !messages.is_empty() {
                return ApiError::from_status(status, &messages.join(", "));
            }
        }
    }
    ApiError::from_status(status, url)
}

/// Wrap a payload under its entity key, as Redmine expects for writes.
fn wrap(key: &str, payload: &Value) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), payload.clone());
    Value::Object(body)
}

/// Extract the entity under `key` from a response body.
fn unwrap_entity<T: DeserializeOwned>(mut body: Value, key: &str) -> Result<T> {
    let entity = body
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| ApiError::InvalidResponse(format!("missing '{}' in response", key)))?;
    serde_json::from_value(entity)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", key, e)))
}

/// Build the query string for a listing.
fn list_query(filter: &ListFilter) -> String {
    let mut pairs: Vec<String> = filter
        .params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    if filter.offset > 0 {
        pairs.push(format!("offset={}", filter.offset));
    }
    if filter.limit > 0 {
        pairs.push(format!("limit={}", filter.limit));
    }

    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}

/// Parse a listing response into a page.
fn parse_page<T: DeserializeOwned>(mut body: Value, key: &str, filter: &ListFilter) -> Result<Page<T>> {
    let total_count = body
        .get("total_count")
        .and_then(Value::as_u64)
        .map(|n| n as u32);
    let offset = body
        .get("offset")
        .and_then(Value::as_u64)
        .map_or(filter.offset, |n| n as u32);
    let limit = body
        .get("limit")
        .and_then(Value::as_u64)
        .map_or(filter.limit, |n| n as u32);
    let items = body
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| ApiError::InvalidResponse(format!("missing '{}' in response", key)))?;
    let items: Vec<T> = serde_json::from_value(items)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", key, e)))?;

    Ok(Page {
        items,
        total_count,
        offset,
        limit,
    })
}

/// Normalize the base URL by removing trailing slashes.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim_end_matches('/');

    if !url.starts_with("https://") && !url.contains("localhost") {
        warn!("URL does not use HTTPS: {}. Credentials will travel in clear text.", url);
    }

    url.to_string()
}
