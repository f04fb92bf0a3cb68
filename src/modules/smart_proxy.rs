//! The `smart-proxy` command.

use anyhow::{Result, bail};
use reconcile::{EntityPlan, EntitySpec, Field, State};
use serde_json::Map;

use super::{put, put_list};
use crate::Context;
use crate::cli::SmartProxyArgs;
use crate::report;

fn plan() -> EntityPlan {
    let spec = EntitySpec::builder()
        .field("name", Field::string().required())
        .field("url", Field::string())
        .field("download_policy", Field::string())
        .field("locations", Field::entity_list("locations"))
        .field("organizations", Field::entity_list("organizations"))
        .build();
    EntityPlan::new("smart_proxies", spec)
}

pub fn run(ctx: &Context, args: SmartProxyArgs) -> Result<()> {
    let state: State = args.state.into();
    if state.wants_present() && args.url.is_none() {
        bail!("url is required when state is {state}");
    }

    let mut params = Map::new();
    params.insert("name".to_string(), args.name.into());
    put(&mut params, "url", args.url);
    put(&mut params, "download_policy", args.download_policy);
    put_list(&mut params, "locations", &args.locations);
    put_list(&mut params, "organizations", &args.organizations);

    let report = ctx.engine().run(&plan(), params, state)?;
    log::info!("smart proxy: {}", report.outcome);
    report::emit(&report, ctx.diff);
    Ok(())
}
