//! Entity metadata: field kinds, aliases, defaults and wire names.
//!
//! An [`EntitySpec`] describes every attribute an entity command accepts.
//! The reconciler is generic over this description, so entity-specific
//! behaviour lives in the spec rather than in per-entity control flow.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Validated desired attributes, keyed by semantic field name.
pub type DesiredState = Map<String, Value>;

/// Default server search field for a resource.
///
/// Most resources search by `name`; a few nestable or login-based ones
/// use a different natural key.
pub(crate) fn default_search_field(resource: &str) -> &'static str {
    match resource {
        "locations" | "hostgroups" | "operatingsystems" => "title",
        "users" => "login",
        _ => "name",
    }
}

/// How an entity reference is looked up on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    /// Plural resource name the reference points at.
    pub resource: String,
    /// Search field override; defaults per resource.
    pub search_field: Option<String>,
    /// Names of sibling fields whose resolved ids scope the lookup.
    pub scope: Vec<String>,
    /// Resolve to null instead of failing when the target is missing.
    pub failsafe: bool,
}

impl EntityRef {
    fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            search_field: None,
            scope: Vec::new(),
            failsafe: false,
        }
    }

    /// The field this reference is searched by.
    pub fn search_field(&self) -> &str {
        self.search_field
            .as_deref()
            .unwrap_or_else(|| default_search_field(&self.resource))
    }
}

/// Shape of one entity attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Text value, compared by string form.
    Str,
    /// Boolean value.
    Bool,
    /// Integer value.
    Int,
    /// Passed through untouched; lists of objects compare by `name`.
    Raw,
    /// Reference to another entity, sent as `<name>_id`.
    Entity(EntityRef),
    /// References to several entities, sent as `<singular>_ids`.
    EntityList(EntityRef),
    /// Child entities reconciled under the parent's route.
    NestedList(EntitySpec),
}

/// Builder for one field of an [`EntitySpec`].
#[derive(Debug, Clone)]
pub struct Field {
    kind: FieldKind,
    required: bool,
    default: Option<Value>,
    aliases: Vec<String>,
    flat_name: Option<String>,
    ensure: bool,
}

impl Field {
    fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
            aliases: Vec::new(),
            flat_name: None,
            ensure: true,
        }
    }

    /// Text field.
    pub fn string() -> Self {
        Self::new(FieldKind::Str)
    }

    /// Boolean field.
    pub fn boolean() -> Self {
        Self::new(FieldKind::Bool)
    }

    /// Integer field.
    pub fn integer() -> Self {
        Self::new(FieldKind::Int)
    }

    /// Field passed to the server without interpretation.
    pub fn raw() -> Self {
        Self::new(FieldKind::Raw)
    }

    /// Reference to one entity of `resource`, resolved by natural key.
    pub fn entity(resource: &str) -> Self {
        Self::new(FieldKind::Entity(EntityRef::new(resource)))
    }

    /// References to several entities of `resource`.
    pub fn entity_list(resource: &str) -> Self {
        Self::new(FieldKind::EntityList(EntityRef::new(resource)))
    }

    /// List of child entities described by `item`, reconciled under the
    /// parent entity's route.
    pub fn nested_list(item: EntitySpec) -> Self {
        Self::new(FieldKind::NestedList(item))
    }

    /// The field must be present in the desired state.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value assumed when the field is not given.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Additional accepted name for the field.
    pub fn alias(mut self, name: &str) -> Self {
        self.aliases.push(name.to_string());
        self
    }

    /// Attribute name used on the wire instead of the semantic name.
    pub fn flat_name(mut self, name: &str) -> Self {
        self.flat_name = Some(name.to_string());
        self
    }

    /// Search field used to resolve the reference, replacing the
    /// per-resource default. Only meaningful for reference fields.
    pub fn search_by(mut self, field: &str) -> Self {
        if let FieldKind::Entity(ref mut target) | FieldKind::EntityList(ref mut target) =
            self.kind
        {
            target.search_field = Some(field.to_string());
        }
        self
    }

    /// Resolve the reference within the scope of a sibling field.
    /// Only meaningful for reference fields.
    pub fn scoped_by(mut self, field: &str) -> Self {
        if let FieldKind::Entity(ref mut target) | FieldKind::EntityList(ref mut target) =
            self.kind
        {
            target.scope.push(field.to_string());
        }
        self
    }

    /// Missing referenced entities resolve to null instead of failing.
    pub fn failsafe(mut self) -> Self {
        if let FieldKind::Entity(ref mut target) | FieldKind::EntityList(ref mut target) =
            self.kind
        {
            target.failsafe = true;
        }
        self
    }

    /// The field steers lookups but never rides in write payloads.
    pub fn search_only(mut self) -> Self {
        self.ensure = false;
        self
    }

    fn into_spec(self, key: &str) -> FieldSpec {
        let flat_name = self.flat_name.or_else(|| match &self.kind {
            FieldKind::Entity(_) => Some(format!("{key}_id")),
            FieldKind::EntityList(_) => Some(format!("{}_ids", apikit::inflect::singularize(key))),
            _ => None,
        });
        FieldSpec {
            kind: self.kind,
            required: self.required,
            default: self.default,
            aliases: self.aliases,
            flat_name,
            ensure: self.ensure,
        }
    }
}

/// Resolved description of one entity attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    kind: FieldKind,
    required: bool,
    default: Option<Value>,
    aliases: Vec<String>,
    flat_name: Option<String>,
    ensure: bool,
}

impl FieldSpec {
    /// Shape of the attribute.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Whether the attribute participates in write payloads.
    pub fn ensure(&self) -> bool {
        self.ensure
    }

    /// Reference metadata when the field points at other entities.
    pub fn entity_ref(&self) -> Option<&EntityRef> {
        match &self.kind {
            FieldKind::Entity(target) | FieldKind::EntityList(target) => Some(target),
            _ => None,
        }
    }
}

/// Description of an entity: its fields and their rules.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntitySpec {
    fields: BTreeMap<String, FieldSpec>,
}

impl EntitySpec {
    /// Start building a spec.
    pub fn builder() -> EntitySpecBuilder {
        EntitySpecBuilder {
            fields: BTreeMap::new(),
        }
    }

    /// Look up a field by semantic name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Iterate all fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldSpec)> {
        self.fields.iter()
    }

    /// Wire attribute name for a field: the flat name when one is set,
    /// otherwise the semantic name itself.
    pub fn wire_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.fields
            .get(key)
            .and_then(|field| field.flat_name.as_deref())
            .unwrap_or(key)
    }

    fn canonical_name(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.fields.get_key_value(name) {
            return Some(key);
        }
        self.fields
            .iter()
            .find(|(_, field)| field.aliases.iter().any(|alias| alias == name))
            .map(|(key, _)| key.as_str())
    }

    /// Validate raw parameters into a [`DesiredState`].
    ///
    /// Aliases are folded onto their canonical names, defaults are
    /// filled in, and every value is checked against its field kind.
    /// Unknown or duplicated parameters fail validation.
    pub fn desired_state(&self, params: Map<String, Value>) -> Result<DesiredState> {
        let mut state = Map::new();
        for (name, value) in params {
            let Some(canonical) = self.canonical_name(&name) else {
                return Err(Error::validation(format!("unknown parameter {name}")));
            };
            if state.contains_key(canonical) {
                return Err(Error::validation(format!(
                    "parameter {canonical} given more than once"
                )));
            }
            state.insert(canonical.to_string(), value);
        }
        for (name, field) in &self.fields {
            if !state.contains_key(name) {
                if let Some(default) = &field.default {
                    state.insert(name.clone(), default.clone());
                }
            }
        }
        for (name, field) in &self.fields {
            match state.get(name) {
                None if field.required => {
                    return Err(Error::validation(format!("parameter {name} is required")));
                }
                Some(value) => self.check_value(name, field, value)?,
                None => {}
            }
        }
        Ok(state)
    }

    fn check_value(&self, name: &str, field: &FieldSpec, value: &Value) -> Result<()> {
        let ok = match &field.kind {
            FieldKind::Str => value.is_string() || value.is_null(),
            FieldKind::Bool => value.is_boolean() || value.is_null(),
            FieldKind::Int => value.as_i64().is_some() || value.is_null(),
            FieldKind::Raw => true,
            FieldKind::Entity(_) => value.is_string() || value.is_object() || value.is_null(),
            FieldKind::EntityList(_) => match value {
                Value::Array(items) => items
                    .iter()
                    .all(|item| item.is_string() || item.is_object()),
                _ => false,
            },
            FieldKind::NestedList(item_spec) => {
                return self.check_nested(name, item_spec, value);
            }
        };
        if ok {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "parameter {name} has the wrong type"
            )))
        }
    }

    fn check_nested(&self, name: &str, item_spec: &EntitySpec, value: &Value) -> Result<()> {
        let Value::Array(items) = value else {
            return Err(Error::validation(format!(
                "parameter {name} must be a list"
            )));
        };
        for (index, item) in items.iter().enumerate() {
            let Value::Object(attributes) = item else {
                return Err(Error::validation(format!(
                    "{name}[{index}] must be a mapping"
                )));
            };
            match item_spec.desired_state(attributes.clone()) {
                Ok(_) => {}
                Err(Error::Validation(message)) => {
                    return Err(Error::validation(format!("{name}[{index}]: {message}")));
                }
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    /// Validate one nested item and fill in its defaults.
    pub(crate) fn nested_item(&self, item: &Map<String, Value>) -> Result<DesiredState> {
        self.desired_state(item.clone())
    }
}

/// Builder for [`EntitySpec`].
#[derive(Debug)]
pub struct EntitySpecBuilder {
    fields: BTreeMap<String, FieldSpec>,
}

impl EntitySpecBuilder {
    /// Add a field under its semantic name.
    #[must_use]
    pub fn field(mut self, name: &str, field: Field) -> Self {
        self.fields.insert(name.to_string(), field.into_spec(name));
        self
    }

    /// Finish the spec.
    pub fn build(self) -> EntitySpec {
        EntitySpec {
            fields: self.fields,
        }
    }
}
