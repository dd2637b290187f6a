//! In-memory test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::api::error::{ApiError, Result};
use crate::api::store::{ListFilter, Page, RemoteStore, Resource};
use crate::api::types::{UploadToken, User};
use crate::client::Client;
use crate::config::ClientSettings;
use crate::retry::{Retrier, RetryPolicy, Sleeper};

/// Records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Types whose listings report `total_count` and honour `offset`/`limit`.
const PAGINATED: &[&str] = &["issue", "project", "user", "membership"];

/// A [`RemoteStore`] backed by JSON values held in memory.
///
/// Every call is counted under `"<operation>:<type>"`, e.g. `"list:issue"`.
/// Failures can be injected per operation key.
pub struct FakeStore {
    entities: Mutex<HashMap<&'static str, Vec<Value>>>,
    calls: Mutex<HashMap<String, usize>>,
    failures: Mutex<HashMap<String, usize>>,
    authenticated: AtomicBool,
    next_id: AtomicU32,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            authenticated: AtomicBool::new(true),
            next_id: AtomicU32::new(1000),
        }
    }

    pub fn anonymous() -> Self {
        let store = Self::new();
        store.authenticated.store(false, Ordering::SeqCst);
        store
    }

    /// Add an entity as the server would return it.
    pub fn seed<T: Resource>(&self, value: Value) {
        self.entities
            .lock()
            .unwrap()
            .entry(T::TYPE_NAME)
            .or_default()
            .push(value);
    }

    /// Change a stored entity behind the client's back.
    pub fn mutate<T: Resource>(&self, id: u32, field: &str, value: Value) {
        let mut entities = self.entities.lock().unwrap();
        if let Some(entity) = entities
            .get_mut(T::TYPE_NAME)
            .and_then(|items| items.iter_mut().find(|item| item["id"] == id))
        {
            entity[field] = value;
        }
    }

    /// Make the next `count` calls of `operation` fail with a server error.
    pub fn fail_next(&self, operation: &str, count: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), count);
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().get(operation).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn record(&self, operation: String) -> Result<()> {
        *self.calls.lock().unwrap().entry(operation.clone()).or_default() += 1;

        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(ApiError::ServerError(format!("injected {} failure", operation)))
            }
            _ => Ok(()),
        }
    }

    fn find(&self, type_name: &str, id: u32) -> Option<Value> {
        self.entities
            .lock()
            .unwrap()
            .get(type_name)
            .and_then(|items| items.iter().find(|item| item["id"] == id).cloned())
    }

    fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn project_for_scope(&self, scope: &str) -> Result<Value> {
        let identifier = scope.trim_start_matches("projects/");
        self.entities
            .lock()
            .unwrap()
            .get("project")
            .and_then(|projects| {
                projects
                    .iter()
                    .find(|p| p["identifier"] == identifier || p["id"].to_string() == identifier)
                    .cloned()
            })
            .ok_or_else(|| ApiError::NotFound(scope.to_string()))
    }

    /// Apply a write payload the way Redmine does: `*_id` keys become
    /// references, notes become journal entries, uploads become attachments.
    fn apply(&self, target: &mut Map<String, Value>, payload: &Value) {
        let Some(fields) = payload.as_object() else {
            return;
        };
        for (key, value) in fields {
            match key.as_str() {
                "notes" => {
                    let journal = json!({
                        "id": self.next_id(),
                        "notes": value,
                        "private_notes": fields.get("private_notes").cloned().unwrap_or(json!(false)),
                    });
                    push(target, "journals", journal);
                }
                "private_notes" => {}
                "uploads" => {
                    for upload in value.as_array().into_iter().flatten() {
                        let id = upload["token"]
                            .as_str()
                            .and_then(|token| token.split('.').next())
                            .and_then(|id| id.parse::<u32>().ok())
                            .unwrap_or_else(|| self.next_id());
                        let attachment = json!({
                            "id": id,
                            "filename": upload["filename"],
                            "description": upload.get("description").cloned().unwrap_or(Value::Null),
                            "content_type": upload.get("content_type").cloned().unwrap_or(Value::Null),
                        });
                        push(target, "attachments", attachment);
                    }
                }
                "role_ids" => {
                    let roles: Vec<Value> = value
                        .as_array()
                        .into_iter()
                        .flatten()
                        .map(|id| json!({"id": id, "name": ""}))
                        .collect();
                    target.insert("roles".to_string(), Value::Array(roles));
                }
                "parent_issue_id" => {
                    let parent = if value.is_null() { Value::Null } else { json!({"id": value}) };
                    target.insert("parent".to_string(), parent);
                }
                other => match other.strip_suffix("_id") {
                    Some(base) => {
                        let reference = if value.is_null() {
                            Value::Null
                        } else {
                            json!({"id": value, "name": ""})
                        };
                        target.insert(base.to_string(), reference);
                    }
                    None => {
                        target.insert(other.to_string(), value.clone());
                    }
                },
            }
        }
    }
}

fn push(target: &mut Map<String, Value>, key: &str, value: Value) {
    match target.get_mut(key).and_then(Value::as_array_mut) {
        Some(items) => items.push(value),
        None => {
            target.insert(key.to_string(), Value::Array(vec![value]));
        }
    }
}

fn matches_params(item: &Value, params: &[(String, String)]) -> bool {
    params.iter().all(|(key, expected)| {
        let Some(base) = key.strip_suffix("_id") else {
            return true;
        };
        match expected.parse::<u64>() {
            Ok(id) => item[base]["id"] == id,
            Err(_) => true,
        }
    })
}

fn decode<T: Resource>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

impl RemoteStore for FakeStore {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn get<T: Resource>(&self, id: u32, _include: &[&str]) -> Result<T> {
        self.record(format!("get:{}", T::TYPE_NAME))?;
        let value = self
            .find(T::TYPE_NAME, id)
            .ok_or_else(|| ApiError::NotFound(format!("{} {}", T::TYPE_NAME, id)))?;
        decode(value)
    }

    fn list<T: Resource>(&self, filter: &ListFilter) -> Result<Page<T>> {
        self.record(format!("list:{}", T::TYPE_NAME))?;

        let scope_project = match &filter.scope {
            Some(scope) => Some(self.project_for_scope(scope)?["id"].clone()),
            None => None,
        };
        let all: Vec<Value> = self
            .entities
            .lock()
            .unwrap()
            .get(T::TYPE_NAME)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|item| scope_project.as_ref().map_or(true, |id| &item["project"]["id"] == id))
            .filter(|item| matches_params(item, &filter.params))
            .collect();

        if !PAGINATED.contains(&T::TYPE_NAME) {
            let items = all.into_iter().map(decode).collect::<Result<Vec<T>>>()?;
            return Ok(Page {
                items,
                total_count: None,
                offset: 0,
                limit: 0,
            });
        }

        let limit = if filter.limit == 0 { 25 } else { filter.limit };
        let total = all.len() as u32;
        let items = all
            .into_iter()
            .skip(filter.offset as usize)
            .take(limit as usize)
            .map(decode)
            .collect::<Result<Vec<T>>>()?;
        Ok(Page {
            items,
            total_count: Some(total),
            offset: filter.offset,
            limit,
        })
    }

    fn create<T: Resource>(&self, scope: Option<&str>, payload: &Value) -> Result<T> {
        self.record(format!("create:{}", T::TYPE_NAME))?;

        let mut entity = Map::new();
        entity.insert("id".to_string(), json!(self.next_id()));
        if let Some(scope) = scope {
            let project = self.project_for_scope(scope)?;
            entity.insert(
                "project".to_string(),
                json!({"id": project["id"], "name": project["name"]}),
            );
        }
        self.apply(&mut entity, payload);

        let value = Value::Object(entity);
        let created = decode::<T>(value.clone())?;
        self.seed::<T>(value);
        Ok(created)
    }

    fn update<T: Resource>(&self, id: u32, payload: &Value) -> Result<()> {
        self.record(format!("update:{}", T::TYPE_NAME))?;

        let mut current = self
            .find(T::TYPE_NAME, id)
            .ok_or_else(|| ApiError::NotFound(format!("{} {}", T::TYPE_NAME, id)))?;
        if let Some(fields) = current.as_object_mut() {
            self.apply(fields, payload);
        }

        let mut entities = self.entities.lock().unwrap();
        if let Some(slot) = entities
            .get_mut(T::TYPE_NAME)
            .and_then(|items| items.iter_mut().find(|item| item["id"] == id))
        {
            *slot = current;
        }
        Ok(())
    }

    fn delete<T: Resource>(&self, id: u32) -> Result<()> {
        self.record(format!("delete:{}", T::TYPE_NAME))?;

        let mut entities = self.entities.lock().unwrap();
        let items = entities.entry(T::TYPE_NAME).or_default();
        let before = items.len();
        items.retain(|item| item["id"] != id);
        if items.len() == before {
            return Err(ApiError::NotFound(format!("{} {}", T::TYPE_NAME, id)));
        }
        Ok(())
    }

    fn upload(&self, filename: &str, content: &[u8]) -> Result<UploadToken> {
        self.record("upload".to_string())?;
        let id = self.next_id();
        Ok(UploadToken {
            token: format!("{}.{}-{}", id, filename, content.len()),
            id: Some(id),
        })
    }

    fn current_user(&self) -> Result<User> {
        self.record("current_user".to_string())?;
        if !self.is_authenticated() {
            return Err(ApiError::Unauthorized);
        }
        decode(json!({"id": 1, "login": "admin", "firstname": "Redmine", "lastname": "Admin"}))
    }
}

/// A client over `store` that retries three times without sleeping.
pub fn fake_client(store: FakeStore) -> Client<FakeStore> {
    fake_client_with_sleeper(store).0
}

/// Like [`fake_client`], also returning the sleeper to inspect delays.
pub fn fake_client_with_sleeper(store: FakeStore) -> (Client<FakeStore>, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let settings = ClientSettings {
        total_attempts: 3,
        base_retry_interval_ms: 100,
        page_size: 2,
        ..ClientSettings::default()
    };
    let client = Client::new(store, &settings)
        .expect("test settings are valid")
        .with_retrier(Retrier::new(sleeper.clone()));
    (client, sleeper)
}

/// A one-attempt policy for tests that expect an immediate failure.
pub fn single_attempt() -> RetryPolicy {
    RetryPolicy::new(1, 1).expect("valid policy")
}
