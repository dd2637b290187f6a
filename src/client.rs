//! The client facade.
//!
//! [`Client`] exposes one operation per entity action and owns the
//! consistency contract between the remote store and the [`TypeCache`]:
//!
//! - fetching by id stores an entity entry;
//! - a full, unfiltered listing replaces the type's collection entries;
//! - an update or delete removes the entity entry for that id only, so a
//!   cached listing may still show the old value until it expires;
//! - a create stores an entity entry for the new id and leaves any cached
//!   listing of the type as it was.
//!
//! Every remote call runs under the client's [`RetryPolicy`]. Input checks
//! happen first and fail with [`Error::Precondition`] before the network is
//! touched.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::api::error::Result as ApiResult;
use crate::api::store::{ListFilter, RemoteStore, Resource};
use crate::api::types::{
    Attachment, Issue, IssuePriority, IssueStatus, Journal, Membership, NewUser, Project, Role,
    Tracker, User, UserChanges,
};
use crate::api::RestClient;
use crate::cache::{CacheStats, EntryKind, TypeCache};
use crate::config::{ClientSettings, Config, Profile};
use crate::error::{Error, Result};
use crate::metadata::{
    AttachmentMetadata, IssueMetadata, IssueQuery, JournalMetadata, NewProject, ProjectChanges,
    ResolvedIssueFields,
};
use crate::retry::{Retrier, RetryPolicy};

/// A resilient, caching client over a [`RemoteStore`].
///
/// Cloning is cheap; clones share the store and the cache.
pub struct Client<S: RemoteStore = RestClient> {
    store: Arc<S>,
    cache: Arc<TypeCache>,
    retrier: Retrier,
    policy: RetryPolicy,
    page_size: u32,
}

impl<S: RemoteStore> Clone for Client<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            retrier: self.retrier.clone(),
            policy: self.policy,
            page_size: self.page_size,
        }
    }
}

impl<S: RemoteStore> fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("policy", &self.policy)
            .field("page_size", &self.page_size)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Client<RestClient> {
    /// Connect to the instance a profile describes.
    ///
    /// The API key is read from the OS keyring.
    pub fn from_profile(profile: &Profile, settings: &ClientSettings) -> Result<Self> {
        profile.validate()?;
        let store = RestClient::from_profile(profile)?;
        Self::new(store, settings)
    }

    /// Connect using a loaded configuration.
    ///
    /// Uses the named profile, or the configured default when `profile` is
    /// `None`.
    pub fn from_config(config: &Config, profile: Option<&str>) -> Result<Self> {
        let profile = match profile {
            Some(name) => config.profile(name)?,
            None => config.default_profile()?,
        };
        Self::from_profile(profile, &config.settings)
    }
}

impl<S: RemoteStore> Client<S> {
    /// Create a client with its own cache.
    pub fn new(store: S, settings: &ClientSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            store: Arc::new(store),
            cache: Arc::new(TypeCache::new(settings.cache_ttl())),
            retrier: Retrier::default(),
            policy: settings.retry_policy()?,
            page_size: settings.effective_page_size(),
        })
    }

    /// Use a cache shared with other clients.
    ///
    /// Only share a cache between clients talking to the same instance with
    /// the same credentials.
    pub fn with_cache(mut self, cache: Arc<TypeCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the retrier, e.g. to control how backoff waits.
    pub fn with_retrier(mut self, retrier: Retrier) -> Self {
        self.retrier = retrier;
        self
    }

    /// A client sharing this one's store and cache with a different policy.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            policy,
            ..self.clone()
        }
    }

    /// Like [`Client::with_policy`], from raw values.
    pub fn with_retries(&self, total_attempts: u32, base_delay_ms: u64) -> Result<Self> {
        Ok(self.with_policy(RetryPolicy::new(total_attempts, base_delay_ms)?))
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The cache this client reads and writes.
    pub fn cache(&self) -> &Arc<TypeCache> {
        &self.cache
    }

    /// The retry policy applied to every remote call.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Drop every cached entry.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Counters describing the cache contents.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn call<T>(&self, operation: &str, work: impl FnMut() -> ApiResult<T>) -> Result<T> {
        Ok(self.retrier.invoke(operation, self.policy, work)?)
    }

    fn require_auth(&self) -> Result<()> {
        if self.store.is_authenticated() {
            Ok(())
        } else {
            Err(Error::precondition("not logged in"))
        }
    }

    fn require_id(id: u32) -> Result<()> {
        if id == 0 {
            return Err(Error::precondition("id must be positive"));
        }
        Ok(())
    }

    /// Fetch by id, serving from the entity cache when no extra data is asked for.
    fn fetch<T: Resource>(&self, id: u32, include: &[&str]) -> Result<T> {
        Self::require_id(id)?;
        if include.is_empty() {
            if let Some(cached) = self.cache.get::<T>(id) {
                return Ok(cached);
            }
        }

        let value = self.call(&format!("get {} {}", T::TYPE_NAME, id), || {
            self.store.get::<T>(id, include)
        })?;
        self.cache.put(id, value.clone(), EntryKind::Entity);
        Ok(value)
    }

    /// Fetch every page of a listing. Each page is retried on its own.
    fn fetch_pages<T: Resource>(&self, filter: ListFilter) -> Result<Vec<T>> {
        let operation = format!("list {}", T::TYPE_NAME);
        let mut items = Vec::new();
        let mut offset = 0;

        loop {
            let page_filter = filter.clone().page(offset, self.page_size);
            let page = self.call(&operation, || self.store.list::<T>(&page_filter))?;
            let last = page.is_last();
            offset = page.next_offset();
            items.extend(page.items);
            if last {
                break;
            }
        }

        debug!(entity = T::TYPE_NAME, count = items.len(), "Fetched listing");
        Ok(items)
    }

    /// The complete listing of `T`, from the collection cache when present.
    pub(crate) fn list_all<T: Resource>(&self) -> Result<Vec<T>> {
        let cached = self.cache.get_collection::<T>();
        if !cached.is_empty() {
            return Ok(cached);
        }

        let items = self.fetch_pages::<T>(ListFilter::new())?;
        self.cache.put_all(&items);
        Ok(items)
    }

    fn create_entity<T: Resource>(&self, scope: Option<&str>, payload: &Value) -> Result<T> {
        let created: T = self.call(&format!("create {}", T::TYPE_NAME), || {
            self.store.create::<T>(scope, payload)
        })?;
        info!(entity = T::TYPE_NAME, id = created.id(), "Created");
        self.cache.put(created.id(), created.clone(), EntryKind::Entity);
        Ok(created)
    }

    fn update_entity<T: Resource>(&self, id: u32, payload: &Value) -> Result<()> {
        let result = self.call(&format!("update {} {}", T::TYPE_NAME, id), || {
            self.store.update::<T>(id, payload)
        });
        // The server may have applied the change even when the call failed.
        self.cache.remove::<T>(id);
        result?;
        info!(entity = T::TYPE_NAME, id, "Updated");
        Ok(())
    }

    fn delete_entity<T: Resource>(&self, id: u32) -> Result<()> {
        let result = self.call(&format!("delete {} {}", T::TYPE_NAME, id), || {
            self.store.delete::<T>(id)
        });
        self.cache.remove::<T>(id);
        result?;
        info!(entity = T::TYPE_NAME, id, "Deleted");
        Ok(())
    }

    // Projects

    /// Fetch a project by id.
    #[instrument(skip(self))]
    pub fn project(&self, id: u32) -> Result<Project> {
        self.fetch(id, &[])
    }

    /// Find a project by its URL identifier.
    pub fn project_by_identifier(&self, identifier: &str) -> Result<Project> {
        self.find_by_name(identifier)
    }

    /// Every project visible to the credentials.
    pub fn projects(&self) -> Result<Vec<Project>> {
        self.list_all()
    }

    /// Create a project. The parent is given by identifier.
    #[instrument(skip(self, project), fields(identifier = %project.identifier))]
    pub fn create_project(&self, project: &NewProject) -> Result<Project> {
        self.require_auth()?;
        let fields = self.resolve_new_project(project)?;
        self.create_entity(None, &serde_json::to_value(fields)?)
    }

    /// Update a project.
    #[instrument(skip(self, changes))]
    pub fn update_project(&self, id: u32, changes: &ProjectChanges) -> Result<()> {
        self.require_auth()?;
        Self::require_id(id)?;
        let fields = self.resolve_project_changes(changes)?;
        self.update_entity::<Project>(id, &serde_json::to_value(fields)?)
    }

    /// Delete a project and everything in it.
    #[instrument(skip(self))]
    pub fn delete_project(&self, id: u32) -> Result<()> {
        self.require_auth()?;
        Self::require_id(id)?;
        self.delete_entity::<Project>(id)
    }

    // Issues

    /// Fetch an issue by id.
    #[instrument(skip(self))]
    pub fn issue(&self, id: u32) -> Result<Issue> {
        self.fetch(id, &[])
    }

    /// Every issue matching the query, across all pages.
    ///
    /// Filtered listings are never cached as the type's collection.
    #[instrument(skip(self, query))]
    pub fn issues(&self, query: &IssueQuery) -> Result<Vec<Issue>> {
        let filter = self.resolve_issue_query(query)?;
        self.fetch_pages(filter)
    }

    /// Create an issue. Project and subject are required.
    #[instrument(skip(self, metadata))]
    pub fn create_issue(&self, metadata: &IssueMetadata) -> Result<Issue> {
        self.require_auth()?;
        if metadata.project.is_none() {
            return Err(Error::precondition("a new issue needs a project"));
        }
        if metadata.subject.is_none() {
            return Err(Error::precondition("a new issue needs a subject"));
        }
        let fields = self.resolve_issue_metadata(metadata)?;
        self.create_entity(None, &serde_json::to_value(fields)?)
    }

    /// Update an issue. Fields left unset are not touched.
    #[instrument(skip(self, metadata))]
    pub fn update_issue(&self, id: u32, metadata: &IssueMetadata) -> Result<()> {
        self.require_auth()?;
        Self::require_id(id)?;
        if metadata.is_empty() {
            return Err(Error::precondition("nothing to update"));
        }
        let fields = self.resolve_issue_metadata(metadata)?;
        self.update_entity::<Issue>(id, &serde_json::to_value(fields)?)
    }

    /// Delete an issue.
    #[instrument(skip(self))]
    pub fn delete_issue(&self, id: u32) -> Result<()> {
        self.require_auth()?;
        Self::require_id(id)?;
        self.delete_entity::<Issue>(id)
    }

    // Users

    /// Fetch a user by id.
    #[instrument(skip(self))]
    pub fn user(&self, id: u32) -> Result<User> {
        self.fetch(id, &[])
    }

    /// Find a user by login.
    pub fn user_by_login(&self, login: &str) -> Result<User> {
        self.find_by_name(login)
    }

    /// Every user. Listing users needs administrator rights.
    pub fn users(&self) -> Result<Vec<User>> {
        self.list_all()
    }

    /// The user the credentials belong to.
    #[instrument(skip(self))]
    pub fn current_user(&self) -> Result<User> {
        self.require_auth()?;
        let user = self.call("get current user", || self.store.current_user())?;
        self.cache.put(user.id, user.clone(), EntryKind::Entity);
        Ok(user)
    }

    /// Create a user.
    #[instrument(skip(self, user), fields(login = %user.login))]
    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        self.require_auth()?;
        if user.login.trim().is_empty() {
            return Err(Error::precondition("login cannot be blank"));
        }
        self.create_entity(None, &serde_json::to_value(user)?)
    }

    /// Update a user.
    #[instrument(skip(self, changes))]
    pub fn update_user(&self, id: u32, changes: &UserChanges) -> Result<()> {
        self.require_auth()?;
        Self::require_id(id)?;
        self.update_entity::<User>(id, &serde_json::to_value(changes)?)
    }

    /// Delete a user.
    #[instrument(skip(self))]
    pub fn delete_user(&self, id: u32) -> Result<()> {
        self.require_auth()?;
        Self::require_id(id)?;
        self.delete_entity::<User>(id)
    }

    // Enumerations

    /// Every issue status.
    pub fn statuses(&self) -> Result<Vec<IssueStatus>> {
        self.list_all()
    }

    /// Find an issue status by name.
    pub fn status_by_name(&self, name: &str) -> Result<IssueStatus> {
        self.find_by_name(name)
    }

    /// Every issue priority.
    pub fn priorities(&self) -> Result<Vec<IssuePriority>> {
        self.list_all()
    }

    /// Find an issue priority by name.
    pub fn priority_by_name(&self, name: &str) -> Result<IssuePriority> {
        self.find_by_name(name)
    }

    /// Every tracker.
    pub fn trackers(&self) -> Result<Vec<Tracker>> {
        self.list_all()
    }

    /// Find a tracker by name.
    pub fn tracker_by_name(&self, name: &str) -> Result<Tracker> {
        self.find_by_name(name)
    }

    /// Every membership role.
    pub fn roles(&self) -> Result<Vec<Role>> {
        self.list_all()
    }

    /// Find a role by name.
    pub fn role_by_name(&self, name: &str) -> Result<Role> {
        self.find_by_name(name)
    }

    // Memberships

    /// Memberships of one project.
    #[instrument(skip(self))]
    pub fn memberships(&self, project_identifier: &str) -> Result<Vec<Membership>> {
        if project_identifier.is_empty() {
            return Err(Error::precondition("project identifier cannot be empty"));
        }
        self.fetch_pages(ListFilter::new().scoped(format!("projects/{}", project_identifier)))
    }

    /// Give a user roles in a project.
    #[instrument(skip(self))]
    pub fn create_membership(
        &self,
        project_identifier: &str,
        login: &str,
        role_names: &[&str],
    ) -> Result<Membership> {
        self.require_auth()?;
        if project_identifier.is_empty() {
            return Err(Error::precondition("project identifier cannot be empty"));
        }
        if role_names.is_empty() {
            return Err(Error::precondition("a membership needs at least one role"));
        }

        let user = self.find_by_name::<User>(login)?;
        let role_ids = role_names
            .iter()
            .map(|name| self.find_by_name::<Role>(name).map(|role| role.id))
            .collect::<Result<Vec<u32>>>()?;

        let scope = format!("projects/{}", project_identifier);
        let payload = json!({ "user_id": user.id, "role_ids": role_ids });
        self.create_entity(Some(&scope), &payload)
    }

    /// Remove a membership.
    #[instrument(skip(self))]
    pub fn delete_membership(&self, id: u32) -> Result<()> {
        self.require_auth()?;
        Self::require_id(id)?;
        self.delete_entity::<Membership>(id)
    }

    // Attachments

    /// Fetch attachment metadata by id.
    #[instrument(skip(self))]
    pub fn attachment(&self, id: u32) -> Result<Attachment> {
        self.fetch(id, &[])
    }

    /// Upload a file and attach it to an issue.
    ///
    /// The upload and the issue update are retried separately, so a failed
    /// update never uploads the content twice.
    #[instrument(skip(self, content, metadata), fields(size = content.len(), filename = %metadata.filename))]
    pub fn attach_file(&self, issue_id: u32, content: &[u8], metadata: &AttachmentMetadata) -> Result<Attachment> {
        self.require_auth()?;
        Self::require_id(issue_id)?;
        metadata.validate()?;

        let upload = self.call("upload", || self.store.upload(&metadata.filename, content))?;
        let upload_id = upload.id;
        let filename = metadata.filename.clone();
        let fields = ResolvedIssueFields {
            uploads: vec![metadata.clone().into_reference(upload.token)],
            ..Default::default()
        };
        self.update_entity::<Issue>(issue_id, &serde_json::to_value(fields)?)?;

        let issue: Issue = self.fetch(issue_id, &["attachments"])?;
        let attachment = match upload_id {
            Some(id) => issue.attachments.into_iter().find(|a| a.id == id),
            None => issue.attachments.into_iter().rev().find(|a| a.filename == filename),
        };
        attachment.ok_or_else(|| Error::not_found("attachment", filename))
    }

    /// Delete an attachment.
    #[instrument(skip(self))]
    pub fn delete_attachment(&self, id: u32) -> Result<()> {
        self.require_auth()?;
        Self::require_id(id)?;
        self.delete_entity::<Attachment>(id)
    }

    // Journals

    /// The history of an issue, oldest first.
    #[instrument(skip(self))]
    pub fn journals(&self, issue_id: u32) -> Result<Vec<Journal>> {
        let issue: Issue = self.fetch(issue_id, &["journals"])?;
        Ok(issue.journals)
    }

    /// Add a comment to an issue.
    #[instrument(skip(self, journal))]
    pub fn add_journal(&self, issue_id: u32, journal: &JournalMetadata) -> Result<()> {
        self.require_auth()?;
        Self::require_id(issue_id)?;
        journal.validate()?;
        let fields = ResolvedIssueFields {
            notes: Some(journal.notes.clone()),
            private_notes: Some(journal.private_notes),
            ..Default::default()
        };
        self.update_entity::<Issue>(issue_id, &serde_json::to_value(fields)?)
    }
}
