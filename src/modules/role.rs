//! The `role` command.

use anyhow::Result;
use reconcile::{EntityPlan, EntitySpec, Field};
use serde_json::Map;

use super::{put, put_list};
use crate::Context;
use crate::cli::RoleArgs;
use crate::report;

fn plan() -> EntityPlan {
    let spec = EntitySpec::builder()
        .field("name", Field::string().required())
        .field("description", Field::string())
        .field("locations", Field::entity_list("locations"))
        .field("organizations", Field::entity_list("organizations"))
        .build();
    EntityPlan::new("roles", spec)
}

pub fn run(ctx: &Context, args: RoleArgs) -> Result<()> {
    let mut params = Map::new();
    params.insert("name".to_string(), args.name.into());
    put(&mut params, "description", args.description);
    put_list(&mut params, "locations", &args.locations);
    put_list(&mut params, "organizations", &args.organizations);

    let report = ctx.engine().run(&plan(), params, args.state.into())?;
    log::info!("role: {}", report.outcome);
    report::emit(&report, ctx.diff);
    Ok(())
}
