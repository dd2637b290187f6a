//! Redmine API request and response types.
//!
//! These types model the Redmine REST API JSON representations.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::store::Resource;
use crate::cache::Cacheable;

/// A reference to another entity as embedded in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdName {
    /// The referenced entity's id.
    pub id: u32,
    /// Its display name.
    #[serde(default)]
    pub name: String,
}

impl fmt::Display for IdName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A reference carrying only an id (e.g. an issue's parent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    /// The referenced entity's id.
    pub id: u32,
}

/// A Redmine project.
///
/// Returned by `GET /projects/{id}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// The project ID.
    pub id: u32,
    /// The display name.
    pub name: String,
    /// The unique URL identifier (e.g. "website").
    pub identifier: String,
    /// The project description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the project is visible to anonymous users.
    #[serde(default)]
    pub is_public: Option<bool>,
    /// The parent project, if this is a subproject.
    #[serde(default)]
    pub parent: Option<IdName>,
    /// Project status (1 active, 5 closed, 9 archived).
    #[serde(default)]
    pub status: Option<u8>,
    /// When the project was created.
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    /// When the project was last updated.
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.identifier)
    }
}

/// A Redmine issue.
///
/// Returned by `GET /issues/{id}.json`, optionally with `include=journals,attachments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// The issue ID.
    pub id: u32,
    /// The project the issue belongs to.
    #[serde(default)]
    pub project: Option<IdName>,
    /// The tracker (Bug, Feature, ...).
    #[serde(default)]
    pub tracker: Option<IdName>,
    /// The workflow status.
    #[serde(default)]
    pub status: Option<IdName>,
    /// The priority.
    #[serde(default)]
    pub priority: Option<IdName>,
    /// Who opened the issue.
    #[serde(default)]
    pub author: Option<IdName>,
    /// Who the issue is assigned to.
    #[serde(default)]
    pub assigned_to: Option<IdName>,
    /// The parent issue.
    #[serde(default)]
    pub parent: Option<IdRef>,
    /// One-line summary.
    pub subject: String,
    /// Long description.
    #[serde(default)]
    pub description: Option<String>,
    /// Planned start.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Planned end.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Completion percentage.
    #[serde(default)]
    pub done_ratio: Option<u8>,
    /// Estimated effort in hours.
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    /// Whether only members with the right permission can see the issue.
    #[serde(default)]
    pub is_private: Option<bool>,
    /// Change history, present when requested with `include=journals`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub journals: Vec<Journal>,
    /// Attached files, present when requested with `include=attachments`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// When the issue was created.
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    /// When the issue was last updated.
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
}

impl Issue {
    /// Get the status name, if known.
    pub fn status_name(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.name.as_str())
    }

    /// Get the assignee display name, or "Unassigned" if not set.
    pub fn assignee_name(&self) -> &str {
        self.assigned_to
            .as_ref()
            .map(|u| u.name.as_str())
            .unwrap_or("Unassigned")
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}: {}", self.id, self.subject)
    }
}

/// A Redmine user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user ID.
    pub id: u32,
    /// The login name.
    pub login: String,
    /// First name.
    #[serde(default)]
    pub firstname: String,
    /// Last name.
    #[serde(default)]
    pub lastname: String,
    /// Email address (hidden unless permitted).
    #[serde(default)]
    pub mail: Option<String>,
    /// Whether the user is an administrator.
    #[serde(default)]
    pub admin: Option<bool>,
    /// Account status (1 active, 2 registered, 3 locked).
    #[serde(default)]
    pub status: Option<u8>,
    /// When the account was created.
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    /// Last sign-in.
    #[serde(default)]
    pub last_login_on: Option<DateTime<Utc>>,
}

impl User {
    /// First and last name joined, or the login when both are empty.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.firstname, self.lastname);
        let full = full.trim();
        if full.is_empty() {
            self.login.clone()
        } else {
            full.to_string()
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// An issue workflow status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStatus {
    /// The status ID.
    pub id: u32,
    /// The status name (e.g. "New", "In Progress", "Closed").
    pub name: String,
    /// Whether issues in this status count as closed.
    #[serde(default)]
    pub is_closed: bool,
}

/// An issue priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuePriority {
    /// The priority ID.
    pub id: u32,
    /// The priority name (e.g. "Low", "Normal", "High").
    pub name: String,
    /// Whether new issues get this priority by default.
    #[serde(default)]
    pub is_default: bool,
    /// Whether the priority can still be chosen.
    #[serde(default)]
    pub active: Option<bool>,
}

/// An issue tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
    /// The tracker ID.
    pub id: u32,
    /// The tracker name (e.g. "Bug", "Feature", "Support").
    pub name: String,
    /// Status new issues of this tracker start in.
    #[serde(default)]
    pub default_status: Option<IdName>,
    /// The tracker description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A project role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// The role ID.
    pub id: u32,
    /// The role name (e.g. "Manager", "Developer").
    pub name: String,
    /// Whether issues can be assigned to holders of this role.
    #[serde(default)]
    pub assignable: Option<bool>,
}

/// A user's (or group's) membership in a project.
///
/// Listed by `GET /projects/{id}/memberships.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// The membership ID.
    pub id: u32,
    /// The project.
    pub project: IdName,
    /// The member, when a user.
    #[serde(default)]
    pub user: Option<IdName>,
    /// The member, when a group.
    #[serde(default)]
    pub group: Option<IdName>,
    /// Roles held in the project.
    #[serde(default)]
    pub roles: Vec<IdName>,
}

/// A file attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// The attachment ID.
    pub id: u32,
    /// Original file name.
    pub filename: String,
    /// Size in bytes.
    #[serde(default)]
    pub filesize: u64,
    /// MIME type.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Download URL.
    #[serde(default)]
    pub content_url: Option<String>,
    /// Who uploaded it.
    #[serde(default)]
    pub author: Option<IdName>,
    /// When it was uploaded.
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
}

/// One entry in an issue's change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    /// The journal ID.
    pub id: u32,
    /// Who made the change.
    #[serde(default)]
    pub user: Option<IdName>,
    /// Comment text.
    #[serde(default)]
    pub notes: Option<String>,
    /// Whether the notes are private.
    #[serde(default)]
    pub private_notes: bool,
    /// When the change was made.
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    /// Field-level changes.
    #[serde(default)]
    pub details: Vec<JournalDetail>,
}

/// A single field change recorded in a journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalDetail {
    /// Kind of property ("attr", "cf", "attachment", ...).
    pub property: String,
    /// Changed field name.
    pub name: String,
    /// Previous value.
    #[serde(default)]
    pub old_value: Option<String>,
    /// New value.
    #[serde(default)]
    pub new_value: Option<String>,
}

/// Token returned by `POST /uploads.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadToken {
    /// Opaque token to reference the upload from an issue.
    pub token: String,
    /// Server-side id of the pending attachment.
    #[serde(default)]
    pub id: Option<u32>,
}

/// Payload for `POST /users.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewUser {
    /// Login name.
    pub login: String,
    /// First name.
    pub firstname: String,
    /// Last name.
    pub lastname: String,
    /// Email address.
    pub mail: String,
    /// Initial password; omitted to let the server generate one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Whether the user is an administrator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
}

/// Payload for `PUT /users/{id}.json`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserChanges {
    /// New first name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    /// New last name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    /// New email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    /// New password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// New administrator flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
}

macro_rules! resource {
    ($ty:ty, $type_name:literal, $path:literal, $collection:literal) => {
        impl Cacheable for $ty {
            const TYPE_NAME: &'static str = $type_name;
            fn id(&self) -> u32 {
                self.id
            }
        }

        impl Resource for $ty {
            const PATH: &'static str = $path;
            const COLLECTION_KEY: &'static str = $collection;
        }
    };
}

resource!(Project, "project", "projects", "projects");
resource!(Issue, "issue", "issues", "issues");
resource!(User, "user", "users", "users");
resource!(IssueStatus, "issue_status", "issue_statuses", "issue_statuses");
resource!(
    IssuePriority,
    "issue_priority",
    "enumerations/issue_priorities",
    "issue_priorities"
);
resource!(Tracker, "tracker", "trackers", "trackers");
resource!(Role, "role", "roles", "roles");
resource!(Membership, "membership", "memberships", "memberships");
resource!(Attachment, "attachment", "attachments", "attachments");
