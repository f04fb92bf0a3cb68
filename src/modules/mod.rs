//! One module per entity command.
//!
//! Every ensure command follows the same shape: describe the entity's
//! fields as an [`reconcile::EntitySpec`], collect the desired state
//! from the parsed arguments, run the engine and emit the report.

pub mod bookmark;
pub mod content_view;
pub mod domain;
pub mod global_parameter;
pub mod host_power;
pub mod lifecycle_environment;
pub mod location;
pub mod organization;
pub mod ping;
pub mod role;
pub mod search;
pub mod setting;
pub mod smart_proxy;

use anyhow::{Result, bail};
use serde_json::{Map, Value};

/// Insert `key` when the flag was given; omitted flags leave the
/// server-side attribute untouched.
pub(crate) fn put(params: &mut Map<String, Value>, key: &str, value: Option<impl Into<Value>>) {
    if let Some(value) = value {
        params.insert(key.to_string(), value.into());
    }
}

/// Insert a repeatable flag's values when at least one was given.
pub(crate) fn put_list(params: &mut Map<String, Value>, key: &str, values: &[String]) {
    if !values.is_empty() {
        let items = values
            .iter()
            .map(|value| Value::String(value.clone()))
            .collect();
        params.insert(key.to_string(), Value::Array(items));
    }
}

/// Parse a value argument: JSON when it parses, a literal string otherwise.
pub(crate) fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Parse one `--parameter` occurrence: `NAME=VALUE` or `NAME:TYPE=VALUE`.
pub(crate) fn parse_parameter(raw: &str) -> Result<Value> {
    let Some((head, value)) = raw.split_once('=') else {
        bail!("parameter {raw} must look like name=value or name:type=value");
    };
    let (name, parameter_type) = match head.split_once(':') {
        Some((name, kind)) => (name, Some(kind)),
        None => (head, None),
    };
    if name.is_empty() {
        bail!("parameter {raw} has an empty name");
    }
    let mut item = Map::new();
    item.insert("name".to_string(), Value::String(name.to_string()));
    item.insert("value".to_string(), parse_value(value));
    if let Some(kind) = parameter_type {
        item.insert(
            "parameter_type".to_string(),
            Value::String(kind.to_string()),
        );
    }
    Ok(Value::Object(item))
}

/// Parse every `--parameter` occurrence into the nested list the
/// server expects, values normalized to their text form.
pub(crate) fn parameters_from(raw: &[String]) -> Result<Value> {
    let mut items = raw
        .iter()
        .map(|item| parse_parameter(item))
        .collect::<Result<Vec<_>>>()?;
    reconcile::params::canonicalize_parameters(&mut items);
    Ok(Value::Array(items))
}
