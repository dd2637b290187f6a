//! Redmine API client and types.
//!
//! This module provides the interface for communicating with the Redmine REST API.

pub mod auth;
mod client;
pub mod error;
pub mod store;
pub mod types;

pub use auth::Auth;
pub use client::RestClient;
pub use error::ApiError;
pub use store::{ListFilter, Page, RemoteStore, Resource};
