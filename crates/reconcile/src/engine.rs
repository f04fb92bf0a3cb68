//! High-level reconciliation runs.
//!
//! An [`EntityPlan`] names the resource, its spec and the fields that
//! identify an entity. The [`Engine`] drives a full run: validate the
//! desired state, resolve references, find the current entity,
//! converge it and then its nested children, and report what changed.

use apikit::{Client, SearchQuery, TaskOptions};
use serde_json::{Map, Value};

use crate::diff;
use crate::ensure::Reconciler;
use crate::error::{Error, Result};
use crate::resolver::{Detail, Resolver, scope_for};
use crate::spec::{DesiredState, EntitySpec, FieldKind};
use crate::types::{RunReport, State};

/// What one entity command reconciles.
#[derive(Debug, Clone)]
pub struct EntityPlan {
    resource: String,
    spec: EntitySpec,
    keys: Vec<String>,
    scope: Vec<String>,
}

impl EntityPlan {
    /// Plan for `resource`, identified by its `name` field.
    pub fn new(resource: &str, spec: EntitySpec) -> Self {
        Self {
            resource: resource.to_string(),
            spec,
            keys: vec!["name".to_string()],
            scope: Vec::new(),
        }
    }

    /// Replace the identifying fields, for entities with a composite
    /// natural key.
    #[must_use]
    pub fn keyed_by(mut self, fields: &[&str]) -> Self {
        self.keys = fields.iter().map(|field| (*field).to_string()).collect();
        self
    }

    /// Reference field whose resolved id scopes lookups and writes.
    #[must_use]
    pub fn scoped_by(mut self, field: &str) -> Self {
        self.scope.push(field.to_string());
        self
    }

    /// The plural resource name.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The entity's field rules.
    pub fn spec(&self) -> &EntitySpec {
        &self.spec
    }
}

enum Lookup {
    Search,
    Provided(Option<Value>),
}

/// Drives reconciliation runs against one server.
pub struct Engine<'a> {
    client: &'a dyn Client,
    check_mode: bool,
    task_options: TaskOptions,
}

impl<'a> Engine<'a> {
    /// Engine writing through the given client.
    pub fn new(client: &'a dyn Client) -> Self {
        Self {
            client,
            check_mode: false,
            task_options: TaskOptions::default(),
        }
    }

    /// Report changes without performing any write.
    #[must_use]
    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    /// Task polling options for asynchronous writes.
    #[must_use]
    pub fn with_task_options(mut self, options: TaskOptions) -> Self {
        self.task_options = options;
        self
    }

    /// Resolver over the same client, for command-specific lookups.
    pub fn resolver(&self) -> Resolver<'a> {
        Resolver::new(self.client)
    }

    /// Reconciler over the same client, for command-specific writes
    /// such as member actions.
    pub fn reconciler(&self) -> Reconciler<'a> {
        Reconciler::new(self.client, self.check_mode).with_task_options(self.task_options)
    }

    /// Reconcile one entity: find it by its natural key and converge
    /// it to `state`.
    pub fn run(
        &self,
        plan: &EntityPlan,
        params: Map<String, Value>,
        state: State,
    ) -> Result<RunReport> {
        let desired = plan.spec.desired_state(params)?;
        self.converge(plan, desired, state, &Lookup::Search)
    }

    /// Reconcile one entity the caller has already looked up, for
    /// commands with their own lookup rules (titles, composite keys
    /// resolved elsewhere, update-only entities).
    pub fn run_with_current(
        &self,
        plan: &EntityPlan,
        params: Map<String, Value>,
        state: State,
        current: Option<Value>,
    ) -> Result<RunReport> {
        let desired = plan.spec.desired_state(params)?;
        self.converge(plan, desired, state, &Lookup::Provided(current))
    }

    fn converge(
        &self,
        plan: &EntityPlan,
        mut desired: DesiredState,
        state: State,
        lookup: &Lookup,
    ) -> Result<RunReport> {
        let resolver = self.resolver();
        if state.wants_present() {
            resolver.resolve_references(&plan.spec, &mut desired)?;
        } else {
            resolver.resolve_fields(&plan.spec, &mut desired, &plan.scope)?;
        }
        let scope = scope_for(&plan.spec, &plan.scope, &desired)?;

        let current = match lookup {
            Lookup::Provided(current) => current.clone(),
            Lookup::Search => {
                let mut query = SearchQuery::new();
                for key in &plan.keys {
                    let value = desired.get(key).and_then(Value::as_str).ok_or_else(|| {
                        Error::validation(format!("parameter {key} is required"))
                    })?;
                    query = query.eq(key.clone(), value);
                }
                let detail = if state.wants_present() {
                    Detail::Full
                } else {
                    Detail::Thin
                };
                resolver.find_one(&plan.resource, &query, &scope, detail)?
            }
        };

        if current.is_some() && state.wants_present() {
            if let Some(Value::String(new_name)) = desired.get("updated_name").cloned() {
                desired.insert("name".to_string(), Value::String(new_name));
            }
        }

        let mut reconciler = self.reconciler();
        let parent_is_new = current.is_none();
        let (outcome, entity) =
            reconciler.ensure(&plan.resource, &plan.spec, &desired, current, state, &scope)?;

        if state.wants_present() {
            if let Some(parent) = &entity {
                self.converge_children(plan, &desired, parent, state, parent_is_new, &mut reconciler)?;
            }
        }

        Ok(RunReport {
            changed: reconciler.changed(),
            outcome,
            entity,
            diff: reconciler.into_diff(),
        })
    }

    fn converge_children(
        &self,
        plan: &EntityPlan,
        desired: &DesiredState,
        parent: &Value,
        state: State,
        parent_is_new: bool,
        reconciler: &mut Reconciler<'a>,
    ) -> Result<()> {
        for (key, field) in plan.spec.fields() {
            let FieldKind::NestedList(item_spec) = field.kind() else {
                continue;
            };
            let Some(Value::Array(items)) = desired.get(key) else {
                continue;
            };
            // With present_with_defaults an existing parent keeps its
            // children exactly as they are.
            if state == State::PresentWithDefaults && !parent_is_new {
                continue;
            }
            let parent_id = diff::id_of(parent)?;
            reconciler.ensure_nested(
                key,
                item_spec,
                items,
                (&plan.resource, &parent_id),
                parent_is_new,
            )?;
        }
        Ok(())
    }
}
