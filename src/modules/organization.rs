//! The `organization` command.

use anyhow::Result;
use reconcile::{EntityPlan, EntitySpec, Field};
use serde_json::Map;

use super::put;
use crate::Context;
use crate::cli::OrganizationArgs;
use crate::report;

fn plan() -> EntityPlan {
    let spec = EntitySpec::builder()
        .field("name", Field::string().required())
        .field("updated_name", Field::string().search_only())
        .field("description", Field::string())
        .field("label", Field::string())
        .build();
    EntityPlan::new("organizations", spec)
}

pub fn run(ctx: &Context, args: OrganizationArgs) -> Result<()> {
    let mut params = Map::new();
    params.insert("name".to_string(), args.name.into());
    put(&mut params, "updated_name", args.updated_name);
    put(&mut params, "description", args.description);
    put(&mut params, "label", args.label);

    let report = ctx.engine().run(&plan(), params, args.state.into())?;
    log::info!("organization: {}", report.outcome);
    report::emit(&report, ctx.diff);
    Ok(())
}
