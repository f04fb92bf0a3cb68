//! Low-level convergence of one entity.
//!
//! All writes funnel through the [`Reconciler`]: check mode
//! short-circuits them, every change is recorded for diff output, and
//! responses that turn out to be asynchronous tasks are awaited before
//! the run continues.

use apikit::{Client, Method, Scope, TaskOptions, tasks};
use serde_json::{Map, Value};

use crate::diff;
use crate::error::{Error, Result};
use crate::spec::{DesiredState, EntitySpec};
use crate::types::{DiffEntry, Outcome, State};

/// Applies desired entity state to the server.
pub struct Reconciler<'a> {
    client: &'a dyn Client,
    check_mode: bool,
    task_options: TaskOptions,
    changed: bool,
    diff: Vec<DiffEntry>,
}

impl<'a> Reconciler<'a> {
    /// Reconciler writing through the given client. In check mode no
    /// write ever reaches the client; everything else behaves the same.
    pub fn new(client: &'a dyn Client, check_mode: bool) -> Self {
        Self {
            client,
            check_mode,
            task_options: TaskOptions::default(),
            changed: false,
            diff: Vec::new(),
        }
    }

    /// Replace the task polling options used for asynchronous writes.
    #[must_use]
    pub fn with_task_options(mut self, options: TaskOptions) -> Self {
        self.task_options = options;
        self
    }

    /// Whether any write was performed or would be performed.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// The writes recorded so far.
    pub fn diff(&self) -> &[DiffEntry] {
        &self.diff
    }

    /// Consume the reconciler, keeping the recorded writes.
    pub fn into_diff(self) -> Vec<DiffEntry> {
        self.diff
    }

    /// Converge one entity to `state`.
    ///
    /// `current` is the entity as the server has it, if it exists.
    /// Returns what happened and the entity afterwards: the server's
    /// record, a fabricated one in check mode, or `None` when absent.
    pub fn ensure(
        &mut self,
        resource: &str,
        spec: &EntitySpec,
        desired: &DesiredState,
        current: Option<Value>,
        state: State,
        scope: &Scope,
    ) -> Result<(Outcome, Option<Value>)> {
        match (state, current) {
            (State::Absent, None) => Ok((Outcome::Unchanged, None)),
            (State::Absent, Some(current)) => {
                self.delete(resource, spec, current, scope)?;
                Ok((Outcome::Deleted, None))
            }
            (State::Present | State::PresentWithDefaults, None) => {
                let created = self.create(resource, spec, desired, scope)?;
                Ok((Outcome::Created, Some(created)))
            }
            (State::Present, Some(current)) => self.update(resource, spec, desired, current, scope),
            (State::PresentWithDefaults, Some(current)) => Ok((Outcome::Unchanged, Some(current))),
        }
    }

    /// Converge the children owned by a parent to exactly the desired
    /// list: present ones are created or updated, others deleted.
    ///
    /// A freshly created parent cannot own children yet, so the server
    /// listing is skipped when `parent_is_new`.
    pub fn ensure_nested(
        &mut self,
        resource: &str,
        item_spec: &EntitySpec,
        desired_items: &[Value],
        parent: (&str, &str),
        parent_is_new: bool,
    ) -> Result<()> {
        let scope = Scope::new().route(parent.0, parent.1);
        let mut current: Vec<Value> = if parent_is_new || self.fabricated(parent.1) {
            Vec::new()
        } else {
            self.client.list(resource, None, &scope)?
        };
        for item in desired_items {
            let Some(attributes) = item.as_object() else {
                return Err(Error::validation(format!(
                    "{resource} items must be mappings"
                )));
            };
            let desired = item_spec.nested_item(attributes)?;
            let name = desired.get("name").and_then(Value::as_str).unwrap_or_default();
            let position = current
                .iter()
                .position(|record| record.get("name").and_then(Value::as_str) == Some(name));
            let existing = position.map(|index| current.swap_remove(index));
            self.ensure(resource, item_spec, &desired, existing, State::Present, &scope)?;
        }
        for leftover in current {
            self.ensure(
                resource,
                item_spec,
                &Map::new(),
                Some(leftover),
                State::Absent,
                &scope,
            )?;
        }
        Ok(())
    }

    /// Invoke a named member action as a write: check mode skips the
    /// call and returns `None`, task responses are awaited.
    pub fn run_action(
        &mut self,
        resource: &str,
        id: &str,
        name: &str,
        method: Method,
        payload: Map<String, Value>,
    ) -> Result<Option<Value>> {
        self.changed = true;
        log::info!("running {name} on {resource} {id}");
        if self.check_mode {
            return Ok(None);
        }
        let response = self.client.action(resource, id, name, method, payload)?;
        self.await_task(response).map(Some)
    }

    fn create(
        &mut self,
        resource: &str,
        spec: &EntitySpec,
        desired: &DesiredState,
        scope: &Scope,
    ) -> Result<Value> {
        let payload = diff::flatten(spec, desired);
        self.record(resource, Map::new(), payload.clone());
        self.changed = true;
        log::info!("creating {resource}");
        if self.check_mode {
            let mut fabricated = payload;
            fabricated.insert("id".to_string(), Value::from(-1));
            return Ok(Value::Object(fabricated));
        }
        let created = self.client.create(resource, payload, scope)?;
        self.await_task(created)
    }

    fn update(
        &mut self,
        resource: &str,
        spec: &EntitySpec,
        desired: &DesiredState,
        current: Value,
        scope: &Scope,
    ) -> Result<(Outcome, Option<Value>)> {
        let id = diff::id_of(&current)?;
        let Value::Object(mut current_map) = current else {
            return Err(Error::Api(apikit::Error::InvalidResponse(
                format!("{resource} record is not an object"),
            )));
        };
        let changes = diff::changeset(spec, desired, &current_map);
        if changes.is_empty() {
            log::debug!("{resource} {id} already converged");
            return Ok((Outcome::Unchanged, Some(Value::Object(current_map))));
        }
        let current_flat = diff::flatten(spec, &current_map);
        let mut before = Map::new();
        for key in changes.keys() {
            before.insert(
                key.clone(),
                current_flat.get(key).cloned().unwrap_or(Value::Null),
            );
        }
        self.record(resource, before, changes.clone());
        self.changed = true;
        log::info!("updating {resource} {id}");
        if self.check_mode {
            for (key, value) in changes {
                current_map.insert(key, value);
            }
            return Ok((Outcome::Updated, Some(Value::Object(current_map))));
        }
        let updated = self.client.update(resource, &id, changes, scope)?;
        let updated = self.await_task(updated)?;
        Ok((Outcome::Updated, Some(updated)))
    }

    fn delete(
        &mut self,
        resource: &str,
        spec: &EntitySpec,
        current: Value,
        scope: &Scope,
    ) -> Result<()> {
        let id = diff::id_of(&current)?;
        let before = current
            .as_object()
            .map(|record| diff::flatten(spec, record))
            .unwrap_or_default();
        self.record(resource, before, Map::new());
        self.changed = true;
        log::info!("deleting {resource} {id}");
        if self.check_mode {
            return Ok(());
        }
        let response = self.client.delete(resource, &id, scope)?;
        self.await_task(response)?;
        Ok(())
    }

    fn await_task(&self, response: Value) -> Result<Value> {
        if tasks::is_task(&response) {
            log::info!("waiting for server task to finish");
            Ok(tasks::wait_for_task(self.client, response, &self.task_options)?)
        } else {
            Ok(response)
        }
    }

    fn record(&mut self, resource: &str, before: Map<String, Value>, after: Map<String, Value>) {
        self.diff.push(DiffEntry {
            resource: resource.to_string(),
            before: Value::Object(before),
            after: Value::Object(after),
        });
    }

    // Check-mode creations fabricate id -1; children of such a parent
    // cannot be listed from the server.
    fn fabricated(&self, parent_id: &str) -> bool {
        self.check_mode && parent_id == "-1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Field;
    use apikit::{MockClient, Verb};
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn domain_spec() -> EntitySpec {
        EntitySpec::builder()
            .field("name", Field::string().required())
            .field("description", Field::string())
            .field("dns_proxy", Field::entity("smart_proxies").flat_name("dns_id"))
            .field("locations", Field::entity_list("locations"))
            .build()
    }

    fn parameter_spec() -> EntitySpec {
        crate::params::parameter_spec()
    }

    #[test]
    fn test_ensure_creates_missing_entity() {
        let mock = MockClient::new();
        let mut reconciler = Reconciler::new(&mock, false);
        let spec = domain_spec();
        let desired = record(json!({
            "name": "example.com",
            "dns_proxy": {"id": 4, "name": "proxy"},
        }));

        let (outcome, entity) = reconciler
            .ensure("domains", &spec, &desired, None, State::Present, &Scope::new())
            .unwrap();

        assert_eq!(outcome, Outcome::Created);
        assert!(reconciler.changed());
        assert_eq!(entity.unwrap()["dns_id"], json!(4));
        let created = &mock.records("domains")[0];
        assert_eq!(created.get("name"), Some(&json!("example.com")));
        assert_eq!(created.get("dns_id"), Some(&json!(4)));
        assert!(!created.contains_key("dns_proxy"));
    }

    #[test]
    fn test_ensure_create_in_check_mode_fabricates_id() {
        let mock = MockClient::new();
        let mut reconciler = Reconciler::new(&mock, true);
        let spec = domain_spec();
        let desired = record(json!({"name": "example.com"}));

        let (outcome, entity) = reconciler
            .ensure("domains", &spec, &desired, None, State::Present, &Scope::new())
            .unwrap();

        assert_eq!(outcome, Outcome::Created);
        assert!(reconciler.changed());
        assert_eq!(entity.unwrap()["id"], json!(-1));
        assert!(mock.write_calls().is_empty());
        assert!(mock.records("domains").is_empty());
    }

    #[test]
    fn test_ensure_updates_only_differing_fields() {
        let mock = MockClient::new();
        let id = mock.insert(
            "domains",
            record(json!({"name": "example.com", "description": "old", "dns_id": 4})),
        );
        let current = Value::Object(mock.records("domains")[0].clone());
        let mut reconciler = Reconciler::new(&mock, false);
        let spec = domain_spec();
        let desired = record(json!({
            "name": "example.com",
            "description": "new",
        }));

        let (outcome, entity) = reconciler
            .ensure("domains", &spec, &desired, Some(current), State::Present, &Scope::new())
            .unwrap();

        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(entity.unwrap()["description"], json!("new"));
        let writes = mock.write_calls();
        assert_eq!(writes.len(), 1);
        let payload = writes[0].payload.clone().unwrap();
        assert_eq!(payload.len(), 1);
        assert_eq!(payload.get("description"), Some(&json!("new")));
        assert_eq!(mock.records("domains")[0].get("id"), Some(&json!(id)));
    }

    #[test]
    fn test_ensure_converged_entity_is_untouched() {
        let mock = MockClient::new();
        mock.insert(
            "domains",
            record(json!({"name": "example.com", "description": "text", "dns_id": 4})),
        );
        let current = Value::Object(mock.records("domains")[0].clone());
        let mut reconciler = Reconciler::new(&mock, false);
        let spec = domain_spec();
        let desired = record(json!({
            "name": "example.com",
            "description": "text",
            "dns_proxy": {"id": 4},
        }));

        let (outcome, _) = reconciler
            .ensure("domains", &spec, &desired, Some(current), State::Present, &Scope::new())
            .unwrap();

        assert_eq!(outcome, Outcome::Unchanged);
        assert!(!reconciler.changed());
        assert!(reconciler.diff().is_empty());
        assert!(mock.write_calls().is_empty());
    }

    #[test]
    fn test_ensure_update_in_check_mode_reports_merged_entity() {
        let mock = MockClient::new();
        mock.insert("domains", record(json!({"name": "example.com", "description": "old"})));
        let current = Value::Object(mock.records("domains")[0].clone());
        let mut reconciler = Reconciler::new(&mock, true);
        let spec = domain_spec();
        let desired = record(json!({"name": "example.com", "description": "new"}));

        let (outcome, entity) = reconciler
            .ensure("domains", &spec, &desired, Some(current), State::Present, &Scope::new())
            .unwrap();

        assert_eq!(outcome, Outcome::Updated);
        assert!(reconciler.changed());
        assert_eq!(entity.unwrap()["description"], json!("new"));
        assert!(mock.write_calls().is_empty());
        assert_eq!(mock.records("domains")[0].get("description"), Some(&json!("old")));
    }

    #[test]
    fn test_ensure_present_with_defaults_keeps_existing_entity() {
        let mock = MockClient::new();
        mock.insert("domains", record(json!({"name": "example.com", "description": "old"})));
        let current = Value::Object(mock.records("domains")[0].clone());
        let mut reconciler = Reconciler::new(&mock, false);
        let spec = domain_spec();
        let desired = record(json!({"name": "example.com", "description": "would differ"}));

        let (outcome, entity) = reconciler
            .ensure(
                "domains",
                &spec,
                &desired,
                Some(current),
                State::PresentWithDefaults,
                &Scope::new(),
            )
            .unwrap();

        assert_eq!(outcome, Outcome::Unchanged);
        assert!(!reconciler.changed());
        assert_eq!(entity.unwrap()["description"], json!("old"));
        assert!(mock.write_calls().is_empty());
    }

    #[test]
    fn test_ensure_deletes_unwanted_entity() {
        let mock = MockClient::new();
        mock.insert("domains", record(json!({"name": "example.com"})));
        let current = Value::Object(mock.records("domains")[0].clone());
        let mut reconciler = Reconciler::new(&mock, false);
        let spec = domain_spec();

        let (outcome, entity) = reconciler
            .ensure("domains", &spec, &Map::new(), Some(current), State::Absent, &Scope::new())
            .unwrap();

        assert_eq!(outcome, Outcome::Deleted);
        assert!(entity.is_none());
        assert!(reconciler.changed());
        assert!(mock.records("domains").is_empty());
    }

    #[test]
    fn test_ensure_absent_entity_stays_absent() {
        let mock = MockClient::new();
        let mut reconciler = Reconciler::new(&mock, false);
        let spec = domain_spec();

        let (outcome, entity) = reconciler
            .ensure("domains", &spec, &Map::new(), None, State::Absent, &Scope::new())
            .unwrap();

        assert_eq!(outcome, Outcome::Unchanged);
        assert!(entity.is_none());
        assert!(!reconciler.changed());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_ensure_delete_in_check_mode_keeps_record() {
        let mock = MockClient::new();
        mock.insert("domains", record(json!({"name": "example.com"})));
        let current = Value::Object(mock.records("domains")[0].clone());
        let mut reconciler = Reconciler::new(&mock, true);
        let spec = domain_spec();

        let (outcome, _) = reconciler
            .ensure("domains", &spec, &Map::new(), Some(current), State::Absent, &Scope::new())
            .unwrap();

        assert_eq!(outcome, Outcome::Deleted);
        assert!(reconciler.changed());
        assert_eq!(mock.records("domains").len(), 1);
        assert!(mock.write_calls().is_empty());
    }

    #[test]
    fn test_diff_records_changed_keys_only() {
        let mock = MockClient::new();
        mock.insert(
            "domains",
            record(json!({"name": "example.com", "description": "old", "dns_id": 4})),
        );
        let current = Value::Object(mock.records("domains")[0].clone());
        let mut reconciler = Reconciler::new(&mock, false);
        let spec = domain_spec();
        let desired = record(json!({"name": "example.com", "description": "new"}));

        reconciler
            .ensure("domains", &spec, &desired, Some(current), State::Present, &Scope::new())
            .unwrap();

        let diff = reconciler.diff();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].resource, "domains");
        assert_eq!(diff[0].before, json!({"description": "old"}));
        assert_eq!(diff[0].after, json!({"description": "new"}));
    }

    #[test]
    fn test_ensure_nested_converges_to_exact_list() {
        let mock = MockClient::new();
        let parent = mock.insert("domains", record(json!({"name": "example.com"})));
        let parent_id = parent.to_string();
        mock.insert_nested(
            ("domains", &parent_id),
            "parameters",
            record(json!({"name": "ntp", "value": "old.pool.ntp.org", "parameter_type": "string"})),
        );
        mock.insert_nested(
            ("domains", &parent_id),
            "parameters",
            record(json!({"name": "obsolete", "value": "x", "parameter_type": "string"})),
        );
        let mut reconciler = Reconciler::new(&mock, false);
        let desired = vec![
            json!({"name": "ntp", "value": "new.pool.ntp.org"}),
            json!({"name": "dns", "value": "10.0.0.53"}),
        ];

        reconciler
            .ensure_nested(
                "parameters",
                &parameter_spec(),
                &desired,
                ("domains", &parent_id),
                false,
            )
            .unwrap();

        assert!(reconciler.changed());
        let remaining = mock.nested_records(("domains", &parent_id), "parameters");
        assert_eq!(remaining.len(), 2);
        let ntp = remaining
            .iter()
            .find(|p| p.get("name") == Some(&json!("ntp")))
            .unwrap();
        assert_eq!(ntp.get("value"), Some(&json!("new.pool.ntp.org")));
        assert!(
            remaining
                .iter()
                .all(|p| p.get("name") != Some(&json!("obsolete")))
        );
    }

    #[test]
    fn test_ensure_nested_unchanged_when_converged() {
        let mock = MockClient::new();
        let parent = mock.insert("domains", record(json!({"name": "example.com"})));
        let parent_id = parent.to_string();
        mock.insert_nested(
            ("domains", &parent_id),
            "parameters",
            record(json!({"name": "ntp", "value": "pool.ntp.org", "parameter_type": "string"})),
        );
        let mut reconciler = Reconciler::new(&mock, false);
        let desired = vec![json!({"name": "ntp", "value": "pool.ntp.org"})];

        reconciler
            .ensure_nested(
                "parameters",
                &parameter_spec(),
                &desired,
                ("domains", &parent_id),
                false,
            )
            .unwrap();

        assert!(!reconciler.changed());
        assert!(mock.write_calls().is_empty());
    }

    #[test]
    fn test_ensure_nested_skips_listing_for_new_parent() {
        let mock = MockClient::new();
        let mut reconciler = Reconciler::new(&mock, false);
        let desired = vec![json!({"name": "ntp", "value": "pool.ntp.org"})];

        reconciler
            .ensure_nested("parameters", &parameter_spec(), &desired, ("domains", "8"), true)
            .unwrap();

        assert!(!mock.calls().iter().any(|call| call.verb == Verb::List));
        assert_eq!(mock.nested_records(("domains", "8"), "parameters").len(), 1);
    }

    #[test]
    fn test_ensure_nested_never_lists_fabricated_parent() {
        let mock = MockClient::new();
        let mut reconciler = Reconciler::new(&mock, true);
        let desired = vec![json!({"name": "ntp", "value": "pool.ntp.org"})];

        reconciler
            .ensure_nested("parameters", &parameter_spec(), &desired, ("domains", "-1"), false)
            .unwrap();

        assert!(reconciler.changed());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_run_action_skipped_in_check_mode() {
        let mock = MockClient::new();
        let mut reconciler = Reconciler::new(&mock, true);

        let response = reconciler
            .run_action("content_views", "3", "publish", Method::Post, Map::new())
            .unwrap();

        assert!(response.is_none());
        assert!(reconciler.changed());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_run_action_waits_for_returned_task() {
        let mock = MockClient::new();
        mock.queue_action(
            "content_views",
            "publish",
            json!({"id": "7b6e3c2d", "state": "running", "started_at": "2026-08-25T10:00:00Z"}),
        );
        mock.insert(
            "foreman_tasks",
            record(json!({"id": "7b6e3c2d", "state": "stopped", "result": "success"})),
        );
        let mut reconciler = Reconciler::new(&mock, false).with_task_options(TaskOptions {
            timeout: std::time::Duration::from_secs(1),
            poll: std::time::Duration::ZERO,
        });

        let finished = reconciler
            .run_action("content_views", "3", "publish", Method::Post, Map::new())
            .unwrap()
            .unwrap();

        assert_eq!(finished["state"], json!("stopped"));
        assert_eq!(finished["result"], json!("success"));
    }
}
