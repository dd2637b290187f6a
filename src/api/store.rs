//! The remote entity store seen by the client.
//!
//! [`RemoteStore`] is the seam between the resilient core and the wire.
//! Every method is one opaque unit of work: it either succeeds or raises an
//! [`ApiError`](super::error::ApiError), and the caller decides whether to
//! try again.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::Result;
use super::types::{UploadToken, User};
use crate::cache::Cacheable;

/// An entity type exposed by the REST API.
///
/// `TYPE_NAME` doubles as the JSON wrapper key of a single entity.
pub trait Resource: Cacheable + DeserializeOwned {
    /// Path of the collection relative to the base URL, without extension.
    const PATH: &'static str;

    /// JSON key holding the items of a listing.
    const COLLECTION_KEY: &'static str;
}

/// Which slice of a collection to list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Parent path the collection is nested under, e.g. `projects/website`.
    pub scope: Option<String>,
    /// Query parameters.
    pub params: Vec<(String, String)>,
    /// Index of the first item.
    pub offset: u32,
    /// Maximum number of items; `0` lets the server decide.
    pub limit: u32,
}

impl ListFilter {
    /// An unscoped, unfiltered listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Nest the listing under a parent path.
    pub fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Add a query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Select a page.
    pub fn page(mut self, offset: u32, limit: u32) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Total number of items across all pages, when the server reports it.
    pub total_count: Option<u32>,
    /// Index of the first item on this page.
    pub offset: u32,
    /// Page size the server applied.
    pub limit: u32,
}

impl<T> Page<T> {
    /// Whether no further page needs to be requested.
    ///
    /// Listings without a `total_count` (statuses, trackers, roles,
    /// priorities) are not paginated and always arrive whole.
    pub fn is_last(&self) -> bool {
        match self.total_count {
            Some(total) => self.items.is_empty() || self.next_offset() >= total,
            None => true,
        }
    }

    /// Offset of the following page.
    pub fn next_offset(&self) -> u32 {
        self.offset + self.items.len() as u32
    }
}

/// CRUD access to the remote entity store.
pub trait RemoteStore: Send + Sync {
    /// Whether requests carry credentials.
    fn is_authenticated(&self) -> bool;

    /// Fetch one entity by id, optionally with associated data.
    fn get<T: Resource>(&self, id: u32, include: &[&str]) -> Result<T>;

    /// Fetch one page of a collection.
    fn list<T: Resource>(&self, filter: &ListFilter) -> Result<Page<T>>;

    /// Create an entity and return it as stored.
    fn create<T: Resource>(&self, scope: Option<&str>, payload: &Value) -> Result<T>;

    /// Update an entity in place.
    fn update<T: Resource>(&self, id: u32, payload: &Value) -> Result<()>;

    /// Delete an entity.
    fn delete<T: Resource>(&self, id: u32) -> Result<()>;

    /// Upload file content, returning a token to reference it with.
    fn upload(&self, filename: &str, content: &[u8]) -> Result<UploadToken>;

    /// Fetch the user the credentials belong to.
    fn current_user(&self) -> Result<User>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(items: Vec<u32>, total: Option<u32>, offset: u32) -> Page<u32> {
        Page {
            items,
            total_count: total,
            offset,
            limit: 2,
        }
    }

    #[test]
    fn test_page_with_total_count() {
        assert!(!page(vec![1, 2], Some(5), 0).is_last());
        assert!(!page(vec![3, 4], Some(5), 2).is_last());
        assert!(page(vec![5], Some(5), 4).is_last());
    }

    #[test]
    fn test_unpaginated_listing_is_last() {
        assert!(page(vec![1, 2], None, 0).is_last());
    }

    #[test]
    fn test_empty_page_is_last() {
        assert!(page(vec![], Some(10), 0).is_last());
    }

    #[test]
    fn test_next_offset() {
        assert_eq!(page(vec![3, 4], Some(5), 2).next_offset(), 4);
    }

    #[test]
    fn test_list_filter_builder() {
        let filter = ListFilter::new()
            .scoped("projects/web")
            .param("status_id", "open")
            .page(100, 50);

        assert_eq!(filter.scope.as_deref(), Some("projects/web"));
        assert_eq!(filter.params, vec![("status_id".to_string(), "open".to_string())]);
        assert_eq!((filter.offset, filter.limit), (100, 50));
    }
}
