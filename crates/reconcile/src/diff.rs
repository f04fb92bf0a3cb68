//! Flattening and comparison of desired against current attributes.
//!
//! Both sides of a comparison are first flattened: reference fields
//! collapse to their wire names carrying bare ids, reference lists to
//! sorted id arrays. The change set is the minimal flat payload that
//! would make the server record match the desired state.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::spec::{EntitySpec, FieldKind, FieldSpec};

/// Entity id as a path parameter string.
///
/// Ids are numeric for entities and opaque strings for tasks, so both
/// forms are accepted.
pub fn id_of(entity: &Value) -> Result<String> {
    match entity.get("id") {
        Some(Value::Number(id)) => Ok(id.to_string()),
        Some(Value::String(id)) => Ok(id.clone()),
        _ => Err(Error::Api(apikit::Error::InvalidResponse(
            "entity has no usable id".to_string(),
        ))),
    }
}

/// Attribute lookup that accepts either the semantic name or the wire
/// name. Server records carry wire names, desired states semantic ones.
fn attribute<'a>(
    entity: &'a Map<String, Value>,
    spec: &EntitySpec,
    key: &str,
) -> Option<&'a Value> {
    entity.get(key).or_else(|| {
        let wire = spec.wire_name(key);
        if wire == key { None } else { entity.get(wire) }
    })
}

/// Flatten an entity to its wire attributes.
///
/// Search-only fields and nested child lists are skipped; references
/// collapse to ids. Works on desired states with resolved references
/// as well as on server records.
pub fn flatten(spec: &EntitySpec, entity: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    for (key, field) in spec.fields() {
        if !field.ensure() || matches!(field.kind(), FieldKind::NestedList(_)) {
            continue;
        }
        let Some(value) = attribute(entity, spec, key) else {
            continue;
        };
        flat.insert(spec.wire_name(key).to_string(), flat_value(field, value));
    }
    flat
}

/// Minimal flat payload turning `current` into `desired`.
///
/// Only fields present in the desired state are considered; omitted
/// fields never appear in the change set.
pub fn changeset(
    spec: &EntitySpec,
    desired: &Map<String, Value>,
    current: &Map<String, Value>,
) -> Map<String, Value> {
    let mut changes = Map::new();
    for (key, field) in spec.fields() {
        if !field.ensure() || matches!(field.kind(), FieldKind::NestedList(_)) {
            continue;
        }
        let Some(desired_value) = attribute(desired, spec, key) else {
            continue;
        };
        let desired_flat = flat_value(field, desired_value);
        let current_flat = attribute(current, spec, key).map(|value| flat_value(field, value));
        if !values_equal(field.kind(), &desired_flat, current_flat.as_ref()) {
            changes.insert(spec.wire_name(key).to_string(), desired_flat);
        }
    }
    changes
}

fn flat_value(field: &FieldSpec, value: &Value) -> Value {
    match field.kind() {
        FieldKind::Entity(_) => match value {
            Value::Object(record) => record.get("id").cloned().unwrap_or(Value::Null),
            other => other.clone(),
        },
        FieldKind::EntityList(_) => match value {
            Value::Array(items) => {
                let mut ids: Vec<Value> = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(record) => record.get("id").cloned().unwrap_or(Value::Null),
                        other => other.clone(),
                    })
                    .collect();
                ids.sort_by_key(|id| (id.as_i64().unwrap_or(i64::MAX), text_form(id)));
                Value::Array(ids)
            }
            other => other.clone(),
        },
        _ => value.clone(),
    }
}

fn values_equal(kind: &FieldKind, desired: &Value, current: Option<&Value>) -> bool {
    let current = current.unwrap_or(&Value::Null);
    match kind {
        // The server stores and echoes many text attributes as their
        // native type, so "4" and 4 must compare equal.
        FieldKind::Str => match (desired, current) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            _ => text_form(desired) == text_form(current),
        },
        FieldKind::Raw => raw_form(desired) == raw_form(current),
        _ => desired == current,
    }
}

fn text_form(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Lists of objects compare as sets keyed by `name`; the server does
/// not keep their order.
fn raw_form(value: &Value) -> Value {
    match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
            let mut sorted = items.clone();
            sorted.sort_by_key(|item| item.get("name").map(text_form).unwrap_or_default());
            Value::Array(sorted)
        }
        other => other.clone(),
    }
}
