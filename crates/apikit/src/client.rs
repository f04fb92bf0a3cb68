//! The [`Client`] trait and its in-memory mock.
//!
//! `Client` is the seam between reconciliation logic and the wire: the real
//! implementation is [`crate::Session`], and [`MockClient`] provides an
//! in-memory server for tests without network access.
//!
//! # Testing
//!
//! ```
//! use apikit::client::{Client, MockClient, Scope};
//! use serde_json::{Map, Value};
//!
//! let mock = MockClient::new();
//! let mut org = Map::new();
//! org.insert("name".to_string(), Value::from("Default Organization"));
//! mock.insert("organizations", org);
//!
//! let found = mock
//!     .list("organizations", Some(r#"name="Default Organization""#), &Scope::new())
//!     .unwrap();
//! assert_eq!(found.len(), 1);
//! ```

use crate::error::{Error, Result};
use crate::search;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

/// HTTP method for named resource actions.
///
/// Collection and member CRUD verbs have fixed methods; only actions vary
/// (power status is a GET, publish is a POST, power control is a PUT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read-only action.
    Get,
    /// Action that spawns or submits something.
    Post,
    /// Action that changes a member in place.
    Put,
}

/// Request scope: parent ids and extra query parameters narrowing a call.
///
/// Scope parameters ride as query parameters on reads and inside the body
/// on writes. A route parent relocates the resource under a nested path,
/// e.g. parameters owned by a domain live at `/api/domains/5/parameters`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    params: BTreeMap<String, Value>,
    route: Option<(String, String)>,
}

impl Scope {
    /// An unscoped request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scope parameter, builder style.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Nest the resource under a parent route.
    #[must_use]
    pub fn route(mut self, parent: impl Into<String>, id: impl Into<String>) -> Self {
        self.route = Some((parent.into(), id.into()));
        self
    }

    /// Add a scope parameter in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(key.into(), value.into());
    }

    /// Iterate the scope parameters in key order.
    pub fn params(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.params.iter()
    }

    /// The parent route, if the resource is nested.
    #[must_use]
    pub fn route_parent(&self) -> Option<(&str, &str)> {
        self.route
            .as_ref()
            .map(|(parent, id)| (parent.as_str(), id.as_str()))
    }

    /// True when there are no parameters and no parent route.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.route.is_none()
    }
}

/// Generic REST operations keyed by resource type and id.
///
/// Ids are path segments: numeric ids from the server, but also natural
/// keys where the API accepts them (host routes take the FQDN).
pub trait Client: Send + Sync {
    /// List records of a resource, optionally filtered by a search
    /// expression, within a scope.
    fn list(&self, resource: &str, search: Option<&str>, scope: &Scope) -> Result<Vec<Value>>;

    /// Fetch a single record by id.
    fn show(&self, resource: &str, id: &str, scope: &Scope) -> Result<Value>;

    /// Create a record from an attribute map. Returns the created record.
    fn create(&self, resource: &str, payload: Map<String, Value>, scope: &Scope) -> Result<Value>;

    /// Update a record with the given attributes only. Returns the updated
    /// record.
    fn update(
        &self,
        resource: &str,
        id: &str,
        payload: Map<String, Value>,
        scope: &Scope,
    ) -> Result<Value>;

    /// Delete a record by id. Returns the server's response body.
    fn delete(&self, resource: &str, id: &str, scope: &Scope) -> Result<Value>;

    /// Invoke a named member action, e.g. `publish` or `power`.
    fn action(
        &self,
        resource: &str,
        id: &str,
        name: &str,
        method: Method,
        payload: Map<String, Value>,
    ) -> Result<Value>;
}

// ============================================================================
// Mock client
// ============================================================================

/// REST verb recorded in a [`MockClient`] call log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Collection read.
    List,
    /// Member read.
    Show,
    /// Collection write.
    Create,
    /// Member write.
    Update,
    /// Member removal.
    Delete,
    /// Named member action.
    Action,
}

/// One call observed by [`MockClient`], for assertions on wire traffic.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Which verb was invoked.
    pub verb: Verb,
    /// Resource type the call targeted.
    pub resource: String,
    /// Action name, for [`Verb::Action`] calls.
    pub action: Option<String>,
    /// HTTP method, for [`Verb::Action`] calls.
    pub method: Option<Method>,
    /// The attribute payload, for write calls.
    pub payload: Option<Map<String, Value>>,
}

impl Call {
    /// Whether this call would have written server state.
    #[must_use]
    pub fn is_write(&self) -> bool {
        match self.verb {
            Verb::List | Verb::Show => false,
            Verb::Action => self.method != Some(Method::Get),
            Verb::Create | Verb::Update | Verb::Delete => true,
        }
    }
}

/// In-memory [`Client`] for tests.
///
/// Records live in per-resource buckets (nested resources bucket under
/// their parent route), searches are matched against the same DSL the real
/// server speaks, and every call is logged so tests can assert on traffic.
#[derive(Debug, Default)]
pub struct MockClient {
    records: Mutex<HashMap<String, Vec<Map<String, Value>>>>,
    actions: Mutex<HashMap<String, VecDeque<Value>>>,
    calls: Mutex<Vec<Call>>,
    last_id: Mutex<u64>,
}

impl MockClient {
    /// Create an empty mock server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record, assigning an id when the record has none. Returns the
    /// record's numeric id (0 when the seeded id is not numeric).
    pub fn insert(&self, resource: &str, record: Map<String, Value>) -> u64 {
        self.insert_at(resource.to_string(), record)
    }

    /// Seed a record under a nested parent route.
    pub fn insert_nested(
        &self,
        parent: (&str, &str),
        resource: &str,
        record: Map<String, Value>,
    ) -> u64 {
        self.insert_at(nested_bucket(parent, resource), record)
    }

    fn insert_at(&self, bucket: String, mut record: Map<String, Value>) -> u64 {
        if !record.contains_key("id") {
            record.insert("id".to_string(), Value::from(self.next_id()));
        }
        let id = record.get("id").and_then(Value::as_u64).unwrap_or_default();
        self.records.lock().unwrap().entry(bucket).or_default().push(record);
        id
    }

    /// Snapshot of every record currently in a resource bucket.
    #[must_use]
    pub fn records(&self, resource: &str) -> Vec<Map<String, Value>> {
        self.records
            .lock()
            .unwrap()
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of a nested resource bucket.
    #[must_use]
    pub fn nested_records(&self, parent: (&str, &str), resource: &str) -> Vec<Map<String, Value>> {
        self.records
            .lock()
            .unwrap()
            .get(&nested_bucket(parent, resource))
            .cloned()
            .unwrap_or_default()
    }

    /// Queue a response for a named action; responses pop in FIFO order.
    pub fn queue_action(&self, resource: &str, name: &str, response: Value) {
        self.actions
            .lock()
            .unwrap()
            .entry(format!("{resource}:{name}"))
            .or_default()
            .push_back(response);
    }

    /// Every call observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Only the calls that would have written server state.
    #[must_use]
    pub fn write_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    fn next_id(&self) -> u64 {
        let mut last = self.last_id.lock().unwrap();
        *last += 1;
        *last
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn bucket(resource: &str, scope: &Scope) -> String {
        match scope.route_parent() {
            Some(parent) => nested_bucket(parent, resource),
            None => resource.to_string(),
        }
    }

    fn matches(record: &Map<String, Value>, search: Option<&str>, scope: &Scope) -> bool {
        if let Some(search) = search {
            for (field, value) in search::parse(search) {
                if field_text(record.get(&field)) != Some(value) {
                    return false;
                }
            }
        }
        for (key, value) in scope.params() {
            if key == "thin" {
                continue;
            }
            if field_text(record.get(key)) != field_text(Some(value)) {
                return false;
            }
        }
        true
    }

    fn find_index(records: &[Map<String, Value>], id: &str) -> Option<usize> {
        records
            .iter()
            .position(|record| field_text(record.get("id")).as_deref() == Some(id))
    }
}

fn nested_bucket(parent: (&str, &str), resource: &str) -> String {
    format!("{}/{}/{resource}", parent.0, parent.1)
}

fn field_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl Client for MockClient {
    fn list(&self, resource: &str, search: Option<&str>, scope: &Scope) -> Result<Vec<Value>> {
        self.log(Call {
            verb: Verb::List,
            resource: resource.to_string(),
            action: None,
            method: None,
            payload: None,
        });
        let records = self.records.lock().unwrap();
        let bucket = records
            .get(&Self::bucket(resource, scope))
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(bucket
            .iter()
            .filter(|record| Self::matches(record, search, scope))
            .map(|record| Value::Object(record.clone()))
            .collect())
    }

    fn show(&self, resource: &str, id: &str, scope: &Scope) -> Result<Value> {
        self.log(Call {
            verb: Verb::Show,
            resource: resource.to_string(),
            action: None,
            method: None,
            payload: None,
        });
        let records = self.records.lock().unwrap();
        let bucket = records
            .get(&Self::bucket(resource, scope))
            .map(Vec::as_slice)
            .unwrap_or_default();
        Self::find_index(bucket, id)
            .map(|index| Value::Object(bucket[index].clone()))
            .ok_or_else(|| Error::api(404, format!("{resource} {id} not found")))
    }

    fn create(&self, resource: &str, payload: Map<String, Value>, scope: &Scope) -> Result<Value> {
        self.log(Call {
            verb: Verb::Create,
            resource: resource.to_string(),
            action: None,
            method: None,
            payload: Some(payload.clone()),
        });
        let mut record = payload;
        for (key, value) in scope.params() {
            record.entry(key.clone()).or_insert_with(|| value.clone());
        }
        if !record.contains_key("id") {
            record.insert("id".to_string(), Value::from(self.next_id()));
        }
        self.records
            .lock()
            .unwrap()
            .entry(Self::bucket(resource, scope))
            .or_default()
            .push(record.clone());
        Ok(Value::Object(record))
    }

    fn update(
        &self,
        resource: &str,
        id: &str,
        payload: Map<String, Value>,
        scope: &Scope,
    ) -> Result<Value> {
        self.log(Call {
            verb: Verb::Update,
            resource: resource.to_string(),
            action: None,
            method: None,
            payload: Some(payload.clone()),
        });
        let mut records = self.records.lock().unwrap();
        let bucket = records.entry(Self::bucket(resource, scope)).or_default();
        let index = Self::find_index(bucket, id)
            .ok_or_else(|| Error::api(404, format!("{resource} {id} not found")))?;
        for (key, value) in payload {
            bucket[index].insert(key, value);
        }
        Ok(Value::Object(bucket[index].clone()))
    }

    fn delete(&self, resource: &str, id: &str, scope: &Scope) -> Result<Value> {
        self.log(Call {
            verb: Verb::Delete,
            resource: resource.to_string(),
            action: None,
            method: None,
            payload: None,
        });
        let mut records = self.records.lock().unwrap();
        let bucket = records.entry(Self::bucket(resource, scope)).or_default();
        let index = Self::find_index(bucket, id)
            .ok_or_else(|| Error::api(404, format!("{resource} {id} not found")))?;
        Ok(Value::Object(bucket.remove(index)))
    }

    fn action(
        &self,
        resource: &str,
        id: &str,
        name: &str,
        method: Method,
        payload: Map<String, Value>,
    ) -> Result<Value> {
        self.log(Call {
            verb: Verb::Action,
            resource: resource.to_string(),
            action: Some(name.to_string()),
            method: Some(method),
            payload: Some(payload),
        });
        self.actions
            .lock()
            .unwrap()
            .get_mut(&format!("{resource}:{name}"))
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                Error::InvalidResponse(format!("no mock response queued for {resource} {name} ({id})"))
            })
    }
}
