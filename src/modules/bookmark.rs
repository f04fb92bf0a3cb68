//! The `bookmark` command.
//!
//! Bookmarks are identified by name and controller together; the same
//! name may exist once per controller.

use anyhow::{Result, bail};
use reconcile::{EntityPlan, EntitySpec, Field, State};
use serde_json::Map;

use super::put;
use crate::Context;
use crate::cli::BookmarkArgs;
use crate::report;

fn plan() -> EntityPlan {
    let spec = EntitySpec::builder()
        .field("name", Field::string().required())
        .field("controller", Field::string().required())
        .field("query", Field::string())
        .field("public", Field::boolean().default_value(true))
        .build();
    EntityPlan::new("bookmarks", spec).keyed_by(&["name", "controller"])
}

pub fn run(ctx: &Context, args: BookmarkArgs) -> Result<()> {
    let state: State = args.state.into();
    if state.wants_present() && args.query.is_none() {
        bail!("query is required when state is {state}");
    }

    let mut params = Map::new();
    params.insert("name".to_string(), args.name.into());
    params.insert("controller".to_string(), args.controller.into());
    put(&mut params, "query", args.query);
    put(&mut params, "public", args.public);

    let report = ctx.engine().run(&plan(), params, state)?;
    log::info!("bookmark: {}", report.outcome);
    report::emit(&report, ctx.diff);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_defaults_public() {
        let mut raw = Map::new();
        raw.insert("name".to_string(), "recent".into());
        raw.insert("controller".to_string(), "hosts".into());
        let desired = plan().spec().desired_state(raw).unwrap();
        assert_eq!(desired.get("public"), Some(&json!(true)));
    }
}
