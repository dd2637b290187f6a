//! steadymine - a resilient client for the Redmine REST API
//!
//! Built for unattended automation such as provisioning scripts and CI jobs,
//! where the network is flaky and the backend is only eventually consistent.
//!
//! - Every remote call is retried with exponential backoff ([`retry`]).
//! - Fetched entities and full listings are cached per type with a fixed
//!   lifetime ([`cache`]).
//! - References given by name (a status called "Resolved", the user with
//!   login `jdoe`) are resolved to backend ids through the cache
//!   ([`resolver`]).
//! - [`Client`] ties these together and keeps the cache consistent with the
//!   client's own writes.
//!
//! ```no_run
//! use steadymine::{Client, ClientSettings, IssueMetadata, RestClient};
//!
//! # fn main() -> steadymine::Result<()> {
//! let store = RestClient::with_api_key("https://redmine.example.com", "0123456789abcdef")?;
//! let client = Client::new(store, &ClientSettings::default())?;
//!
//! let issue = client.create_issue(
//!     &IssueMetadata::new()
//!         .project("website")
//!         .tracker("Bug")
//!         .status("New")
//!         .subject("Login page returns 500"),
//! )?;
//! client.update_issue(issue.id, &IssueMetadata::new().status("Resolved"))?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod resolver;
pub mod retry;

#[cfg(test)]
mod testing;

pub use api::{ApiError, Auth, RemoteStore, RestClient};
pub use cache::TypeCache;
pub use client::Client;
pub use config::{ClientSettings, Config, Profile};
pub use error::{Error, Result};
pub use metadata::{
    AttachmentMetadata, Change, IssueMetadata, IssueQuery, JournalMetadata, NewProject,
    ProjectChanges,
};
pub use resolver::{NamedEntity, Reference, ReferenceField};
pub use retry::RetryPolicy;
