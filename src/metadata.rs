//! Input records for mutations and queries.
//!
//! Each composite input has one typed record. Callers holding an untyped
//! name→value map go through `from_map`, which validates every key and value
//! and builds the record; nothing past that point sees the map.
//!
//! A field left as `None` means "do not touch". Fields that Redmine lets you
//! blank out take a [`Change`], so clearing is always explicit.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// An explicit change to a clearable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    /// Set the field to a value.
    Set(T),
    /// Remove the field's value.
    Clear,
}

impl<T> Change<T> {
    /// The value being set, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Change::Set(v) => Some(v),
            Change::Clear => None,
        }
    }

    /// Map the set value, keeping `Clear` as is.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Change<U> {
        match self {
            Change::Set(v) => Change::Set(f(v)),
            Change::Clear => Change::Clear,
        }
    }

    /// Like [`Change::map`] with a fallible function.
    pub fn try_map<U>(self, f: impl FnOnce(T) -> Result<U>) -> Result<Change<U>> {
        Ok(match self {
            Change::Set(v) => Change::Set(f(v)?),
            Change::Clear => Change::Clear,
        })
    }

    /// The set value, or `None` for `Clear`.
    ///
    /// Wrapped in `Some` this gives the `Option<Option<T>>` payload shape.
    pub fn into_patch(self) -> Option<T> {
        match self {
            Change::Set(v) => Some(v),
            Change::Clear => None,
        }
    }
}

/// Fields to set on an issue when creating or updating it.
///
/// References are given by name (project identifier, tracker, status and
/// priority names, assignee login) and resolved to ids before sending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueMetadata {
    /// Project identifier.
    pub project: Option<String>,
    /// Tracker name.
    pub tracker: Option<String>,
    /// Status name.
    pub status: Option<String>,
    /// Priority name.
    pub priority: Option<String>,
    /// Assignee login.
    pub assignee: Option<Change<String>>,
    /// One-line summary.
    pub subject: Option<String>,
    /// Long description.
    pub description: Option<Change<String>>,
    /// Planned start.
    pub start_date: Option<Change<NaiveDate>>,
    /// Planned end.
    pub due_date: Option<Change<NaiveDate>>,
    /// Completion percentage, 0 to 100.
    pub done_ratio: Option<u8>,
    /// Estimated effort in hours.
    pub estimated_hours: Option<Change<f64>>,
    /// Private flag.
    pub is_private: Option<bool>,
    /// Parent issue id.
    pub parent_issue_id: Option<Change<u32>>,
    /// Comment recorded in the issue journal.
    pub notes: Option<String>,
    /// Whether `notes` is private.
    pub private_notes: Option<bool>,
}

const ISSUE_KEYS: &[&str] = &[
    "project",
    "tracker",
    "status",
    "priority",
    "assignee",
    "subject",
    "description",
    "start_date",
    "due_date",
    "done_ratio",
    "estimated_hours",
    "is_private",
    "parent_issue_id",
    "notes",
    "private_notes",
];

impl IssueMetadata {
    /// An empty record that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the project by identifier.
    pub fn project(mut self, identifier: impl Into<String>) -> Self {
        self.project = Some(identifier.into());
        self
    }

    /// Set the tracker by name.
    pub fn tracker(mut self, name: impl Into<String>) -> Self {
        self.tracker = Some(name.into());
        self
    }

    /// Set the status by name.
    pub fn status(mut self, name: impl Into<String>) -> Self {
        self.status = Some(name.into());
        self
    }

    /// Set the priority by name.
    pub fn priority(mut self, name: impl Into<String>) -> Self {
        self.priority = Some(name.into());
        self
    }

    /// Assign to the user with this login.
    pub fn assignee(mut self, login: impl Into<String>) -> Self {
        self.assignee = Some(Change::Set(login.into()));
        self
    }

    /// Remove the assignee.
    pub fn unassign(mut self) -> Self {
        self.assignee = Some(Change::Clear);
        self
    }

    /// Set the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Change::Set(description.into()));
        self
    }

    /// Add a journal comment.
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Build from an untyped map.
    ///
    /// # Errors
    ///
    /// `Error::Precondition` for unknown keys, wrongly typed values, or
    /// values out of range. JSON `null` clears a clearable field.
    pub fn from_map(map: &HashMap<String, Value>) -> Result<Self> {
        let reader = MapReader::new(map, ISSUE_KEYS)?;
        let metadata = Self {
            project: reader.string("project")?,
            tracker: reader.string("tracker")?,
            status: reader.string("status")?,
            priority: reader.string("priority")?,
            assignee: reader.clearable("assignee", MapReader::as_string)?,
            subject: reader.string("subject")?,
            description: reader.clearable("description", MapReader::as_string)?,
            start_date: reader.clearable("start_date", MapReader::as_date)?,
            due_date: reader.clearable("due_date", MapReader::as_date)?,
            done_ratio: reader
                .required_or_absent("done_ratio", MapReader::as_u32)?
                .map(|n| u8::try_from(n).unwrap_or(u8::MAX)),
            estimated_hours: reader.clearable("estimated_hours", MapReader::as_f64)?,
            is_private: reader.bool("is_private")?,
            parent_issue_id: reader.clearable("parent_issue_id", MapReader::as_u32)?,
            notes: reader.string("notes")?,
            private_notes: reader.bool("private_notes")?,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    /// Check values that are wrong regardless of the remote state.
    pub fn validate(&self) -> Result<()> {
        if let Some(ratio) = self.done_ratio {
            if ratio > 100 {
                return Err(Error::precondition(format!(
                    "done_ratio must be between 0 and 100, got {}",
                    ratio
                )));
            }
        }
        if matches!(&self.subject, Some(s) if s.trim().is_empty()) {
            return Err(Error::precondition("subject cannot be blank"));
        }
        if let Some(Change::Set(hours)) = self.estimated_hours {
            if !hours.is_finite() || hours < 0.0 {
                return Err(Error::precondition("estimated_hours must be a non-negative number"));
            }
        }
        if let Some(Change::Set(0)) = self.parent_issue_id {
            return Err(Error::precondition("parent_issue_id must be positive"));
        }
        if let (Some(Change::Set(start)), Some(Change::Set(due))) = (&self.start_date, &self.due_date) {
            if due < start {
                return Err(Error::precondition("due_date cannot be before start_date"));
            }
        }
        Ok(())
    }

    /// Whether the record changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Issue fields with every reference replaced by its backend id.
///
/// Serializes to the body of an issue create or update; untouched fields are
/// omitted and cleared fields are sent as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedIssueFields {
    /// Project the issue belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u32>,
    /// Tracker id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<u32>,
    /// Status id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<u32>,
    /// Priority id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<u32>,
    /// Assignee id; `Some(None)` unassigns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<Option<u32>>,
    /// One-line summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Description; `Some(None)` clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    /// Start date; `Some(None)` clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<NaiveDate>>,
    /// Due date; `Some(None)` clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
    /// Percent done, 0 to 100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_ratio: Option<u8>,
    /// Estimated effort in hours; `Some(None)` clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<Option<f64>>,
    /// Whether the issue is private.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    /// Parent issue id; `Some(None)` detaches the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_issue_id: Option<Option<u32>>,
    /// Journal note added with the update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Whether `notes` is private.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_notes: Option<bool>,
    /// Uploaded files to attach.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uploads: Vec<UploadReference>,
}

/// An uploaded file referenced from an issue update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReference {
    /// Token returned by the upload.
    pub token: String,
    /// File name to store the attachment under.
    pub filename: String,
    /// Free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Filter for listing issues.
///
/// `status` accepts a status name or one of the literals `open`, `closed`
/// and `*`; `assignee` accepts a login or `me`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueQuery {
    /// Project identifier.
    pub project: Option<String>,
    /// Tracker name.
    pub tracker: Option<String>,
    /// Status name or `open` / `closed` / `*`.
    pub status: Option<String>,
    /// Priority name.
    pub priority: Option<String>,
    /// Assignee login or `me`.
    pub assignee: Option<String>,
    /// Substring the subject must contain.
    pub subject: Option<String>,
    /// Sort expression, e.g. `updated_on:desc`.
    pub sort: Option<String>,
}

const QUERY_KEYS: &[&str] = &[
    "project", "tracker", "status", "priority", "assignee", "subject", "sort",
];

/// Status filter literals passed through without resolution.
pub const STATUS_LITERALS: &[&str] = &["open", "closed", "*"];

impl IssueQuery {
    /// A query matching Redmine's default (open issues in all projects).
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a project.
    pub fn project(mut self, identifier: impl Into<String>) -> Self {
        self.project = Some(identifier.into());
        self
    }

    /// Restrict to a status name or literal.
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Restrict to an assignee login.
    pub fn assignee(mut self, login: impl Into<String>) -> Self {
        self.assignee = Some(login.into());
        self
    }

    /// Build from an untyped map. All values must be strings.
    pub fn from_map(map: &HashMap<String, Value>) -> Result<Self> {
        let reader = MapReader::new(map, QUERY_KEYS)?;
        Ok(Self {
            project: reader.string("project")?,
            tracker: reader.string("tracker")?,
            status: reader.string("status")?,
            priority: reader.string("priority")?,
            assignee: reader.string("assignee")?,
            subject: reader.string("subject")?,
            sort: reader.string("sort")?,
        })
    }
}

/// Description of a file to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMetadata {
    /// File name to store the attachment under.
    pub filename: String,
    /// Free-text description.
    pub description: Option<String>,
    /// MIME type.
    pub content_type: Option<String>,
}

impl AttachmentMetadata {
    /// Describe a file by name.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            description: None,
            content_type: None,
        }
    }

    /// Build from an untyped map; `filename` is required.
    pub fn from_map(map: &HashMap<String, Value>) -> Result<Self> {
        let reader = MapReader::new(map, &["filename", "description", "content_type"])?;
        let metadata = Self {
            filename: reader
                .string("filename")?
                .ok_or_else(|| Error::precondition("filename is required"))?,
            description: reader.string("description")?,
            content_type: reader.string("content_type")?,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    /// Check the file name is usable.
    pub fn validate(&self) -> Result<()> {
        if self.filename.trim().is_empty() {
            return Err(Error::precondition("filename cannot be blank"));
        }
        Ok(())
    }

    pub(crate) fn into_reference(self, token: String) -> UploadReference {
        UploadReference {
            token,
            filename: self.filename,
            description: self.description,
            content_type: self.content_type,
        }
    }
}

/// A comment to add to an issue's journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalMetadata {
    /// Comment text.
    pub notes: String,
    /// Whether only privileged members can read it.
    pub private_notes: bool,
}

impl JournalMetadata {
    /// A public comment.
    pub fn new(notes: impl Into<String>) -> Self {
        Self {
            notes: notes.into(),
            private_notes: false,
        }
    }

    /// Build from an untyped map; `notes` is required.
    pub fn from_map(map: &HashMap<String, Value>) -> Result<Self> {
        let reader = MapReader::new(map, &["notes", "private_notes"])?;
        let metadata = Self {
            notes: reader
                .string("notes")?
                .ok_or_else(|| Error::precondition("notes is required"))?,
            private_notes: reader.bool("private_notes")?.unwrap_or(false),
        };
        metadata.validate()?;
        Ok(metadata)
    }

    /// Check the comment is not blank.
    pub fn validate(&self) -> Result<()> {
        if self.notes.trim().is_empty() {
            return Err(Error::precondition("notes cannot be blank"));
        }
        Ok(())
    }
}

/// A project to create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProject {
    /// Display name.
    pub name: String,
    /// Unique URL identifier.
    pub identifier: String,
    /// Description.
    pub description: Option<String>,
    /// Public visibility.
    pub is_public: Option<bool>,
    /// Identifier of the parent project.
    pub parent: Option<String>,
}

impl NewProject {
    /// A project with a name and identifier.
    pub fn new(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    /// Check name and identifier.
    ///
    /// Redmine identifiers are 1 to 100 lowercase letters, digits, dashes or
    /// underscores, starting with a letter.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::precondition("project name cannot be blank"));
        }
        validate_identifier(&self.identifier)
    }
}

/// Changes to an existing project. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectChanges {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<Change<String>>,
    /// New visibility.
    pub is_public: Option<bool>,
    /// New parent by identifier, or `Clear` to make it top-level.
    pub parent: Option<Change<String>>,
}

impl ProjectChanges {
    /// Rename the project.
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Project fields with the parent reference resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct ResolvedProjectFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<u32>>,
}

fn validate_identifier(identifier: &str) -> Result<()> {
    let valid = !identifier.is_empty()
        && identifier.len() <= 100
        && identifier.starts_with(|c: char| c.is_ascii_lowercase())
        && identifier
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::precondition(format!(
            "'{}' is not a valid project identifier",
            identifier
        )))
    }
}

/// Typed access to an untyped map, rejecting unknown keys up front.
struct MapReader<'a> {
    map: &'a HashMap<String, Value>,
}

impl<'a> MapReader<'a> {
    fn new(map: &'a HashMap<String, Value>, known: &[&str]) -> Result<Self> {
        let mut unknown: Vec<&str> = map
            .keys()
            .map(String::as_str)
            .filter(|key| !known.contains(key))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(Error::precondition(format!(
                "unknown field(s): {}",
                unknown.join(", ")
            )));
        }
        Ok(Self { map })
    }

    /// Read a non-null value, failing on `null`.
    fn required_or_absent<T>(
        &self,
        key: &str,
        convert: fn(&str, &Value) -> Result<T>,
    ) -> Result<Option<T>> {
        match self.map.get(key) {
            None => Ok(None),
            Some(Value::Null) => Err(Error::precondition(format!("{} cannot be null", key))),
            Some(value) => convert(key, value).map(Some),
        }
    }

    /// Read a value where `null` means clear.
    fn clearable<T>(
        &self,
        key: &str,
        convert: fn(&str, &Value) -> Result<T>,
    ) -> Result<Option<Change<T>>> {
        match self.map.get(key) {
            None => Ok(None),
            Some(Value::Null) => Ok(Some(Change::Clear)),
            Some(value) => convert(key, value).map(|v| Some(Change::Set(v))),
        }
    }

    fn string(&self, key: &str) -> Result<Option<String>> {
        self.required_or_absent(key, Self::as_string)
    }

    fn bool(&self, key: &str) -> Result<Option<bool>> {
        self.required_or_absent(key, |key, value| {
            value.as_bool().ok_or_else(|| type_error(key, "a boolean"))
        })
    }

    fn as_string(key: &str, value: &Value) -> Result<String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| type_error(key, "a string"))
    }

    fn as_u32(key: &str, value: &Value) -> Result<u32> {
        value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| type_error(key, "a non-negative integer"))
    }

    fn as_f64(key: &str, value: &Value) -> Result<f64> {
        value.as_f64().ok_or_else(|| type_error(key, "a number"))
    }

    fn as_date(key: &str, value: &Value) -> Result<NaiveDate> {
        let text = value.as_str().ok_or_else(|| type_error(key, "a YYYY-MM-DD date"))?;
        NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| type_error(key, "a YYYY-MM-DD date"))
    }
}

fn type_error(key: &str, expected: &str) -> Error {
    Error::precondition(format!("{} must be {}", key, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_issue_from_map_matches_typed_record() {
        let from_map = IssueMetadata::from_map(&map(json!({
            "project": "website",
            "status": "In Progress",
            "assignee": "aturing",
            "subject": "Fix login",
            "start_date": "2024-03-01",
            "done_ratio": 40
        })))
        .unwrap();

        let mut typed = IssueMetadata::new()
            .project("website")
            .status("In Progress")
            .assignee("aturing")
            .subject("Fix login");
        typed.start_date = Some(Change::Set(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        typed.done_ratio = Some(40);

        assert_eq!(from_map, typed);
    }

    #[test]
    fn test_issue_from_map_null_clears() {
        let metadata = IssueMetadata::from_map(&map(json!({
            "assignee": null,
            "due_date": null
        })))
        .unwrap();

        assert_eq!(metadata.assignee, Some(Change::Clear));
        assert_eq!(metadata.due_date, Some(Change::Clear));
        assert!(metadata.description.is_none());
    }

    #[test]
    fn test_issue_from_map_rejects_null_on_plain_field() {
        let err = IssueMetadata::from_map(&map(json!({"status": null}))).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn test_issue_from_map_rejects_unknown_keys() {
        let err = IssueMetadata::from_map(&map(json!({"subject": "x", "colour": "red"}))).unwrap_err();
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_issue_from_map_rejects_wrong_types() {
        assert!(IssueMetadata::from_map(&map(json!({"done_ratio": "half"}))).is_err());
        assert!(IssueMetadata::from_map(&map(json!({"is_private": "yes"}))).is_err());
        assert!(IssueMetadata::from_map(&map(json!({"start_date": "March 1st"}))).is_err());
    }

    #[test]
    fn test_validate_ranges() {
        let mut metadata = IssueMetadata::new();
        metadata.done_ratio = Some(120);
        assert!(metadata.validate().is_err());

        assert!(IssueMetadata::new().subject("  ").validate().is_err());

        let mut dates = IssueMetadata::new();
        dates.start_date = Some(Change::Set(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()));
        dates.due_date = Some(Change::Set(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert!(dates.validate().is_err());
    }

    #[test]
    fn test_done_ratio_over_255_rejected() {
        assert!(IssueMetadata::from_map(&map(json!({"done_ratio": 1000}))).is_err());
    }

    #[test]
    fn test_resolved_fields_serialization() {
        let fields = ResolvedIssueFields {
            status_id: Some(2),
            assigned_to_id: Some(None),
            subject: Some("Fix login".to_string()),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&fields).unwrap(),
            json!({"status_id": 2, "assigned_to_id": null, "subject": "Fix login"})
        );
    }

    #[test]
    fn test_resolved_fields_serialize_uploads() {
        let metadata = AttachmentMetadata::from_map(&map(json!({"filename": "build.log"}))).unwrap();
        let fields = ResolvedIssueFields {
            uploads: vec![metadata.into_reference("7.abc".to_string())],
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&fields).unwrap(),
            json!({"uploads": [{"token": "7.abc", "filename": "build.log"}]})
        );
    }

    #[test]
    fn test_project_changes_equality() {
        let clear_parent = ProjectChanges {
            parent: Some(Change::Clear),
            ..ProjectChanges::rename("Website")
        };

        fn same<T: Eq>(a: &T, b: &T) -> bool {
            a == b
        }
        assert!(same(&clear_parent, &clear_parent.clone()));
        assert_ne!(clear_parent, ProjectChanges::rename("Website"));
        assert_eq!(Change::Set("x".to_string()), Change::Set("x".to_string()));
    }

    #[test]
    fn test_query_from_map() {
        let query = IssueQuery::from_map(&map(json!({"project": "website", "status": "open"}))).unwrap();
        assert_eq!(query, IssueQuery::new().project("website").status("open"));
        assert!(IssueQuery::from_map(&map(json!({"limit": 5}))).is_err());
    }

    #[test]
    fn test_attachment_from_map_requires_filename() {
        assert!(AttachmentMetadata::from_map(&map(json!({"description": "logs"}))).is_err());

        let metadata = AttachmentMetadata::from_map(&map(json!({
            "filename": "build.log",
            "content_type": "text/plain"
        })))
        .unwrap();
        assert_eq!(metadata.filename, "build.log");
        assert_eq!(metadata.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_journal_from_map() {
        let journal = JournalMetadata::from_map(&map(json!({"notes": "Deployed", "private_notes": true}))).unwrap();
        assert!(journal.private_notes);
        assert!(JournalMetadata::from_map(&map(json!({"notes": " "}))).is_err());
    }

    #[test]
    fn test_project_identifier_validation() {
        assert!(NewProject::new("Website", "website-2").validate().is_ok());
        assert!(NewProject::new("Website", "Website").validate().is_err());
        assert!(NewProject::new("Website", "2website").validate().is_err());
        assert!(NewProject::new("", "website").validate().is_err());
    }

    #[test]
    fn test_change_helpers() {
        assert_eq!(Change::Set(2).map(|n| n * 2), Change::Set(4));
        assert_eq!(Change::<u32>::Clear.into_patch(), None);
        assert_eq!(Change::Set("a").value(), Some(&"a"));
    }
}
