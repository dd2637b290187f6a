//! Name-to-id resolution for cross-entity references.
//!
//! Redmine payloads reference other entities by numeric id, while callers
//! think in names: a status called "Resolved", the user with login `jdoe`,
//! the project identified as `website`. Resolution fetches the full listing
//! of the target type (from the cache when possible), picks the first exact,
//! case-sensitive match in listing order, and fails with
//! [`Error::NotFound`] when nothing matches.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, instrument, warn};

use crate::api::store::{ListFilter, RemoteStore, Resource};
use crate::api::types::{IssuePriority, IssueStatus, Project, Role, Tracker, User};
use crate::client::Client;
use crate::error::{Error, Result};
use crate::metadata::{
    Change, IssueMetadata, IssueQuery, NewProject, ProjectChanges, ResolvedIssueFields,
    ResolvedProjectFields, STATUS_LITERALS,
};

/// An entity that can be looked up by a human-meaningful name.
pub trait NamedEntity: Resource {
    /// How the type is named in error messages.
    const LABEL: &'static str;

    /// The string a lookup matches against.
    fn lookup_name(&self) -> &str;

    /// The name to show for a resolved reference.
    fn display_name(&self) -> String {
        self.lookup_name().to_string()
    }
}

impl NamedEntity for Project {
    const LABEL: &'static str = "project";

    fn lookup_name(&self) -> &str {
        &self.identifier
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

impl NamedEntity for User {
    const LABEL: &'static str = "user";

    fn lookup_name(&self) -> &str {
        &self.login
    }

    fn display_name(&self) -> String {
        User::display_name(self)
    }
}

impl NamedEntity for IssueStatus {
    const LABEL: &'static str = "issue status";

    fn lookup_name(&self) -> &str {
        &self.name
    }
}

impl NamedEntity for IssuePriority {
    const LABEL: &'static str = "issue priority";

    fn lookup_name(&self) -> &str {
        &self.name
    }
}

impl NamedEntity for Tracker {
    const LABEL: &'static str = "tracker";

    fn lookup_name(&self) -> &str {
        &self.name
    }
}

impl NamedEntity for Role {
    const LABEL: &'static str = "role";

    fn lookup_name(&self) -> &str {
        &self.name
    }
}

/// A foreign key that can be given by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceField {
    /// Assignee, by user login.
    Assignee,
    /// Project, by identifier.
    Project,
    /// Issue status, by name.
    Status,
    /// Issue priority, by name.
    Priority,
    /// Tracker, by name.
    Tracker,
    /// Membership role, by name.
    Role,
}

impl ReferenceField {
    /// The field name as used in metadata maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assignee => "assignee",
            Self::Project => "project",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::Tracker => "tracker",
            Self::Role => "role",
        }
    }
}

impl fmt::Display for ReferenceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "assignee" | "assigned_to" => Ok(Self::Assignee),
            "project" => Ok(Self::Project),
            "status" => Ok(Self::Status),
            "priority" => Ok(Self::Priority),
            "tracker" => Ok(Self::Tracker),
            "role" => Ok(Self::Role),
            other => Err(Error::precondition(format!(
                "'{}' is not a resolvable field",
                other
            ))),
        }
    }
}

/// A resolved reference, ready to embed in a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Backend id.
    pub id: u32,
    /// Display name of the referenced entity.
    pub name: String,
}

impl<S: RemoteStore> Client<S> {
    /// Find the first entity of type `T` whose name matches exactly.
    ///
    /// Uses the cached listing of `T` when one is present; otherwise fetches
    /// and caches the full listing.
    #[instrument(skip(self), fields(entity = T::LABEL))]
    pub fn find_by_name<T: NamedEntity>(&self, name: &str) -> Result<T> {
        if name.is_empty() {
            return Err(Error::precondition(format!("{} name cannot be empty", T::LABEL)));
        }

        let mut matches = self
            .list_all::<T>()?
            .into_iter()
            .filter(|entity| entity.lookup_name() == name);

        let found = matches
            .next()
            .ok_or_else(|| Error::not_found(T::LABEL, name))?;
        if let Some(other) = matches.next() {
            warn!(
                lookup = name,
                chosen = found.id(),
                ignored = other.id(),
                "Name matches more than one entity, using the first"
            );
        }

        debug!(lookup = name, id = found.id(), "Resolved name");
        Ok(found)
    }

    fn reference<T: NamedEntity>(&self, name: &str) -> Result<Reference> {
        let entity = self.find_by_name::<T>(name)?;
        Ok(Reference {
            id: entity.id(),
            name: entity.display_name(),
        })
    }

    /// Resolve a named reference to its backend id.
    pub fn resolve(&self, field: ReferenceField, raw_value: &str) -> Result<Reference> {
        match field {
            ReferenceField::Assignee => self.reference::<User>(raw_value),
            ReferenceField::Project => self.reference::<Project>(raw_value),
            ReferenceField::Status => self.reference::<IssueStatus>(raw_value),
            ReferenceField::Priority => self.reference::<IssuePriority>(raw_value),
            ReferenceField::Tracker => self.reference::<Tracker>(raw_value),
            ReferenceField::Role => self.reference::<Role>(raw_value),
        }
    }

    fn resolve_id(&self, field: ReferenceField, raw_value: &Option<String>) -> Result<Option<u32>> {
        raw_value
            .as_deref()
            .map(|value| self.resolve(field, value).map(|r| r.id))
            .transpose()
    }

    /// Replace every named reference in `metadata` with its id.
    ///
    /// Scalars pass through untouched. Nothing is sent to the server besides
    /// the listings needed for resolution.
    pub fn resolve_issue_metadata(&self, metadata: &IssueMetadata) -> Result<ResolvedIssueFields> {
        metadata.validate()?;

        let assigned_to_id = metadata
            .assignee
            .clone()
            .map(|change| change.try_map(|login| self.resolve(ReferenceField::Assignee, &login).map(|r| r.id)))
            .transpose()?
            .map(Change::into_patch);

        Ok(ResolvedIssueFields {
            project_id: self.resolve_id(ReferenceField::Project, &metadata.project)?,
            tracker_id: self.resolve_id(ReferenceField::Tracker, &metadata.tracker)?,
            status_id: self.resolve_id(ReferenceField::Status, &metadata.status)?,
            priority_id: self.resolve_id(ReferenceField::Priority, &metadata.priority)?,
            assigned_to_id,
            subject: metadata.subject.clone(),
            description: metadata.description.clone().map(Change::into_patch),
            start_date: metadata.start_date.clone().map(Change::into_patch),
            due_date: metadata.due_date.clone().map(Change::into_patch),
            done_ratio: metadata.done_ratio,
            estimated_hours: metadata.estimated_hours.clone().map(Change::into_patch),
            is_private: metadata.is_private,
            parent_issue_id: metadata.parent_issue_id.clone().map(Change::into_patch),
            notes: metadata.notes.clone(),
            private_notes: metadata.private_notes,
            uploads: Vec::new(),
        })
    }

    /// Turn an issue query into listing parameters.
    pub fn resolve_issue_query(&self, query: &IssueQuery) -> Result<ListFilter> {
        let mut filter = ListFilter::new();

        if let Some(id) = self.resolve_id(ReferenceField::Project, &query.project)? {
            filter = filter.param("project_id", id.to_string());
        }
        if let Some(id) = self.resolve_id(ReferenceField::Tracker, &query.tracker)? {
            filter = filter.param("tracker_id", id.to_string());
        }
        if let Some(status) = &query.status {
            let value = if STATUS_LITERALS.contains(&status.as_str()) {
                status.clone()
            } else {
                self.resolve(ReferenceField::Status, status)?.id.to_string()
            };
            filter = filter.param("status_id", value);
        }
        if let Some(id) = self.resolve_id(ReferenceField::Priority, &query.priority)? {
            filter = filter.param("priority_id", id.to_string());
        }
        if let Some(assignee) = &query.assignee {
            let value = if assignee == "me" {
                assignee.clone()
            } else {
                self.resolve(ReferenceField::Assignee, assignee)?.id.to_string()
            };
            filter = filter.param("assigned_to_id", value);
        }
        if let Some(subject) = &query.subject {
            filter = filter.param("subject", format!("~{}", subject));
        }
        if let Some(sort) = &query.sort {
            filter = filter.param("sort", sort.clone());
        }

        Ok(filter)
    }

    pub(crate) fn resolve_new_project(&self, project: &NewProject) -> Result<ResolvedProjectFields> {
        project.validate()?;
        let parent_id = self.resolve_id(ReferenceField::Project, &project.parent)?;
        Ok(ResolvedProjectFields {
            name: Some(project.name.clone()),
            identifier: Some(project.identifier.clone()),
            description: project.description.clone().map(Some),
            is_public: project.is_public,
            parent_id: parent_id.map(Some),
        })
    }

    pub(crate) fn resolve_project_changes(&self, changes: &ProjectChanges) -> Result<ResolvedProjectFields> {
        if matches!(&changes.name, Some(name) if name.trim().is_empty()) {
            return Err(Error::precondition("project name cannot be blank"));
        }
        let parent_id = changes
            .parent
            .clone()
            .map(|change| change.try_map(|identifier| self.resolve(ReferenceField::Project, &identifier).map(|r| r.id)))
            .transpose()?
            .map(Change::into_patch);

        Ok(ResolvedProjectFields {
            name: changes.name.clone(),
            identifier: None,
            description: changes.description.clone().map(Change::into_patch),
            is_public: changes.is_public,
            parent_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_client, FakeStore};
    use serde_json::json;

    fn seeded() -> FakeStore {
        let store = FakeStore::new();
        store.seed::<IssueStatus>(json!({"id": 1, "name": "New", "is_closed": false}));
        store.seed::<IssueStatus>(json!({"id": 2, "name": "In Progress", "is_closed": false}));
        store.seed::<IssueStatus>(json!({"id": 5, "name": "Closed", "is_closed": true}));
        store.seed::<User>(json!({"id": 7, "login": "aturing", "firstname": "Alan", "lastname": "Turing"}));
        store.seed::<Project>(json!({"id": 3, "name": "Website", "identifier": "website"}));
        store.seed::<Tracker>(json!({"id": 1, "name": "Bug"}));
        store.seed::<IssuePriority>(json!({"id": 4, "name": "High"}));
        store
    }

    #[test]
    fn test_resolve_present_name() {
        let client = fake_client(seeded());
        let reference = client.resolve(ReferenceField::Status, "In Progress").unwrap();
        assert_eq!(reference, Reference { id: 2, name: "In Progress".to_string() });
    }

    #[test]
    fn test_resolve_absent_name_is_not_found() {
        let client = fake_client(seeded());
        let err = client.resolve(ReferenceField::Status, "Reopened").unwrap_err();

        match err {
            Error::NotFound { entity, name } => {
                assert_eq!(entity, "issue status");
                assert_eq!(name, "Reopened");
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_resolution_is_case_sensitive() {
        let client = fake_client(seeded());
        assert!(client.resolve(ReferenceField::Status, "closed").unwrap_err().is_not_found());
    }

    #[test]
    fn test_second_resolution_hits_cache() {
        let client = fake_client(seeded());
        client.resolve(ReferenceField::Status, "New").unwrap();
        client.resolve(ReferenceField::Status, "Closed").unwrap();

        assert_eq!(client.store().calls("list:issue_status"), 1);
    }

    #[test]
    fn test_first_match_wins() {
        let store = seeded();
        store.seed::<IssueStatus>(json!({"id": 9, "name": "New", "is_closed": false}));
        let client = fake_client(store);

        assert_eq!(client.resolve(ReferenceField::Status, "New").unwrap().id, 1);
    }

    #[test]
    fn test_resolve_user_by_login_returns_display_name() {
        let client = fake_client(seeded());
        let reference = client.resolve(ReferenceField::Assignee, "aturing").unwrap();
        assert_eq!(reference, Reference { id: 7, name: "Alan Turing".to_string() });
    }

    #[test]
    fn test_project_resolves_by_identifier_not_name() {
        let client = fake_client(seeded());
        assert_eq!(client.resolve(ReferenceField::Project, "website").unwrap().id, 3);
        assert!(client.resolve(ReferenceField::Project, "Website").is_err());
    }

    #[test]
    fn test_empty_name_is_precondition() {
        let client = fake_client(seeded());
        assert!(client.resolve(ReferenceField::Tracker, "").unwrap_err().is_precondition());
        assert_eq!(client.store().total_calls(), 0);
    }

    #[test]
    fn test_field_from_str() {
        assert_eq!("assigned_to".parse::<ReferenceField>().unwrap(), ReferenceField::Assignee);
        assert_eq!("role".parse::<ReferenceField>().unwrap(), ReferenceField::Role);
        assert!("colour".parse::<ReferenceField>().unwrap_err().is_precondition());
    }

    #[test]
    fn test_resolve_issue_metadata() {
        let client = fake_client(seeded());
        let metadata = IssueMetadata::new()
            .project("website")
            .tracker("Bug")
            .status("New")
            .priority("High")
            .assignee("aturing")
            .subject("Login fails");

        let resolved = client.resolve_issue_metadata(&metadata).unwrap();

        assert_eq!(resolved.project_id, Some(3));
        assert_eq!(resolved.tracker_id, Some(1));
        assert_eq!(resolved.status_id, Some(1));
        assert_eq!(resolved.priority_id, Some(4));
        assert_eq!(resolved.assigned_to_id, Some(Some(7)));
        assert_eq!(resolved.subject.as_deref(), Some("Login fails"));
        assert!(resolved.description.is_none());
    }

    #[test]
    fn test_resolve_metadata_clear_assignee() {
        let client = fake_client(seeded());
        let resolved = client
            .resolve_issue_metadata(&IssueMetadata::new().unassign())
            .unwrap();

        assert_eq!(resolved.assigned_to_id, Some(None));
        assert_eq!(client.store().calls("list:user"), 0);
    }

    #[test]
    fn test_resolve_issue_query() {
        let client = fake_client(seeded());
        let query = IssueQuery {
            project: Some("website".to_string()),
            status: Some("open".to_string()),
            assignee: Some("aturing".to_string()),
            subject: Some("login".to_string()),
            ..Default::default()
        };

        let filter = client.resolve_issue_query(&query).unwrap();

        assert_eq!(
            filter.params,
            vec![
                ("project_id".to_string(), "3".to_string()),
                ("status_id".to_string(), "open".to_string()),
                ("assigned_to_id".to_string(), "7".to_string()),
                ("subject".to_string(), "~login".to_string()),
            ]
        );
        assert_eq!(client.store().calls("list:issue_status"), 0);
    }

    #[test]
    fn test_resolve_issue_query_status_by_name() {
        let client = fake_client(seeded());
        let filter = client
            .resolve_issue_query(&IssueQuery::new().status("Closed").assignee("me"))
            .unwrap();

        assert_eq!(
            filter.params,
            vec![
                ("status_id".to_string(), "5".to_string()),
                ("assigned_to_id".to_string(), "me".to_string()),
            ]
        );
    }

    #[test]
    fn test_resolve_while_listing_is_recached() {
        let client = fake_client(seeded());
        let statuses = client.statuses().unwrap();

        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..300 {
                    client.cache().put_all(&statuses);
                    client.clear_cache();
                }
            });

            for _ in 0..300 {
                let reference = client.resolve(ReferenceField::Status, "Closed").unwrap();
                assert_eq!(reference.id, 5);
                assert_eq!(client.find_by_name::<IssueStatus>("New").unwrap().id, 1);
            }
        });
    }
}
