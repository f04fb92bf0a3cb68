//! The `setting` command.
//!
//! Settings always exist on the server, so this command only ever
//! updates. Omitting the value resets the setting to its server-side
//! default. Desired values are cast to the setting's own type before
//! comparison, so `--value true` converges a boolean setting cleanly.

use anyhow::Result;
use apikit::{Scope, SearchQuery};
use reconcile::{Detail, EntityPlan, EntitySpec, Field, State};
use serde_json::{Map, Value};

use super::parse_value;
use crate::Context;
use crate::cli::SettingArgs;
use crate::report;

fn plan() -> EntityPlan {
    let spec = EntitySpec::builder()
        .field("name", Field::string().required())
        .field("value", Field::raw())
        .build();
    EntityPlan::new("settings", spec)
}

pub fn run(ctx: &Context, args: SettingArgs) -> Result<()> {
    let engine = ctx.engine();
    let current = engine.resolver().require_one(
        "settings",
        &SearchQuery::new().eq("name", &args.name),
        &Scope::new(),
        Detail::Full,
    )?;

    let settings_type = current["settings_type"].as_str().map(str::to_string);
    let value = match &args.value {
        Some(raw) => cast(parse_value(raw), settings_type.as_deref()),
        // reset to the server-side default
        None => current["default"].clone(),
    };

    let mut params = Map::new();
    params.insert("name".to_string(), args.name.into());
    params.insert("value".to_string(), value);

    let report = engine.run_with_current(&plan(), params, State::Present, Some(current))?;
    log::info!("setting: {}", report.outcome);
    report::emit(&report, ctx.diff);
    Ok(())
}

/// Cast a string value to the setting's declared type, leaving values
/// that do not parse for the server to reject.
fn cast(value: Value, settings_type: Option<&str>) -> Value {
    let Value::String(text) = &value else {
        return value;
    };
    match settings_type {
        Some("boolean") => match text.trim() {
            "true" | "yes" | "on" | "1" => Value::Bool(true),
            "false" | "no" | "off" | "0" => Value::Bool(false),
            _ => value,
        },
        Some("integer") => text.trim().parse::<i64>().map_or(value, Value::from),
        Some("array") | Some("hash") => serde_json::from_str(text).unwrap_or(value),
        _ => value,
    }
}
