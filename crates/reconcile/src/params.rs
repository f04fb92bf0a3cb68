//! Typed key/value parameters attached to other entities.
//!
//! The server stores every parameter value as text and casts it back
//! according to `parameter_type`. Desired values are normalized to the
//! same text form, so `42`, `true` and `[1,2]` compare cleanly against
//! what the server echoes.

use serde_json::Value;

use crate::spec::{EntitySpec, Field};

/// Canonical text form of a parameter value.
///
/// Strings pass through, everything else becomes compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Normalize the `value` of each parameter mapping to its text form.
pub fn canonicalize_parameters(items: &mut [Value]) {
    for item in items {
        if let Value::Object(attributes) = item {
            if let Some(value) = attributes.get("value") {
                if !value.is_string() {
                    let text = value_text(value);
                    attributes.insert("value".to_string(), Value::String(text));
                }
            }
        }
    }
}

/// Spec of one parameter as nested under a host, domain, location,
/// organization or similar entity.
pub fn parameter_spec() -> EntitySpec {
    EntitySpec::builder()
        .field("name", Field::string().required())
        .field("value", Field::string().required())
        .field("parameter_type", Field::string().default_value("string"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_text_keeps_strings() {
        assert_eq!(value_text(&json!("pool.ntp.org")), "pool.ntp.org");
    }

    #[test]
    fn test_value_text_renders_scalars() {
        assert_eq!(value_text(&json!(42)), "42");
        assert_eq!(value_text(&json!(true)), "true");
    }

    #[test]
    fn test_value_text_renders_collections_as_json() {
        assert_eq!(value_text(&json!([1, 2])), "[1,2]");
        assert_eq!(value_text(&json!({"b": 2, "a": 1})), "{\"a\":1,\"b\":2}");
    }

    #[test]
    fn test_canonicalize_parameters() {
        let mut items = vec![
            json!({"name": "retries", "value": 3, "parameter_type": "integer"}),
            json!({"name": "ntp", "value": "pool.ntp.org"}),
        ];
        canonicalize_parameters(&mut items);
        assert_eq!(items[0]["value"], json!("3"));
        assert_eq!(items[1]["value"], json!("pool.ntp.org"));
    }

    #[test]
    fn test_parameter_spec_defaults_type() {
        let spec = parameter_spec();
        let item = json!({"name": "ntp", "value": "pool.ntp.org"});
        let normalized = spec
            .desired_state(item.as_object().cloned().unwrap())
            .unwrap();
        assert_eq!(normalized.get("parameter_type"), Some(&json!("string")));
    }
}
