//! The `global-parameter` command.
//!
//! Global parameters are plain key/value pairs. The server stores every
//! value as text and casts it back by parameter_type, so the desired
//! value is normalized to its text form before comparison. Parameters
//! marked hidden get their value masked in the emitted report and diff.

use anyhow::{Result, bail};
use reconcile::{EntityPlan, EntitySpec, Field, RunReport, State, params};
use serde_json::{Map, Value};

use super::{parse_value, put};
use crate::Context;
use crate::cli::GlobalParameterArgs;
use crate::report;

const MASK: &str = "*****";

fn plan() -> EntityPlan {
    let spec = EntitySpec::builder()
        .field("name", Field::string().required())
        .field("value", Field::string())
        .field("parameter_type", Field::string().default_value("string"))
        .field("hidden_value", Field::boolean())
        .build();
    EntityPlan::new("common_parameters", spec)
}

pub fn run(ctx: &Context, args: GlobalParameterArgs) -> Result<()> {
    let state: State = args.state.into();
    if state.wants_present() && args.value.is_none() {
        bail!("value is required when state is {state}");
    }

    let mut desired = Map::new();
    desired.insert("name".to_string(), args.name.into());
    if let Some(raw) = &args.value {
        let value = parse_value(raw);
        desired.insert("value".to_string(), params::value_text(&value).into());
    }
    put(
        &mut desired,
        "parameter_type",
        args.parameter_type.map(|kind| kind.as_str().to_string()),
    );
    put(&mut desired, "hidden_value", args.hidden_value);

    let mut report = ctx.engine().run(&plan(), desired, state)?;
    log::info!("global parameter: {}", report.outcome);
    if is_hidden(args.hidden_value, report.entity.as_ref()) {
        mask(&mut report);
    }
    report::emit(&report, ctx.diff);
    Ok(())
}

/// Whether the value must not appear in the output. An explicit flag
/// wins; otherwise the server record decides.
fn is_hidden(flag: Option<bool>, entity: Option<&Value>) -> bool {
    if let Some(hidden) = flag {
        return hidden;
    }
    entity.is_some_and(|entity| {
        entity["hidden_value?"]
            .as_bool()
            .or_else(|| entity["hidden_value"].as_bool())
            .unwrap_or(false)
    })
}

fn mask(report: &mut RunReport) {
    if let Some(Value::Object(entity)) = &mut report.entity {
        if entity.contains_key("value") {
            entity.insert("value".to_string(), Value::String(MASK.to_string()));
        }
    }
    for entry in &mut report.diff {
        for side in [&mut entry.before, &mut entry.after] {
            if let Value::Object(attributes) = side {
                if attributes.contains_key("value") {
                    attributes.insert("value".to_string(), Value::String(MASK.to_string()));
                }
            }
        }
    }
}
