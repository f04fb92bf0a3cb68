//! The `location` command.
//!
//! Locations nest: `Europe/Berlin` names a location `Berlin` under the
//! parent `Europe`. The server identifies a location by its full
//! title, so the lookup key is built from parent and name first.

use anyhow::{Result, bail};
use apikit::Scope;
use reconcile::{Detail, EntityPlan, EntitySpec, Field, State, titles};
use serde_json::Map;

use super::{put, put_list};
use crate::Context;
use crate::cli::LocationArgs;
use crate::report;

fn plan() -> EntityPlan {
    let spec = EntitySpec::builder()
        .field("name", Field::string().required())
        .field("updated_name", Field::string().search_only())
        .field("parent", Field::entity("locations"))
        .field("description", Field::string())
        .field("organizations", Field::entity_list("organizations"))
        .build();
    EntityPlan::new("locations", spec)
}

/// Split the name argument into a plain name and the parent title,
/// merging in `--parent` when both agree.
fn name_and_parent(name_arg: &str, parent_flag: Option<String>) -> Result<(String, Option<String>)> {
    let (name, embedded) = titles::split_title(name_arg);
    match (embedded, parent_flag) {
        (Some(embedded), Some(flag)) if embedded != flag => {
            bail!("parent {flag} conflicts with the parent in the title {name_arg}");
        }
        (embedded, flag) => Ok((name, flag.or(embedded))),
    }
}

pub fn run(ctx: &Context, args: LocationArgs) -> Result<()> {
    let (name, parent) = name_and_parent(&args.name, args.parent)?;
    let title = titles::build_title(&name, parent.as_deref());
    let state: State = args.state.into();

    let engine = ctx.engine();
    let detail = if state.wants_present() {
        Detail::Full
    } else {
        Detail::Thin
    };
    let current = engine
        .resolver()
        .find_by("locations", "title", &title, &Scope::new(), detail)?;

    let mut params = Map::new();
    params.insert("name".to_string(), name.into());
    put(&mut params, "updated_name", args.updated_name);
    put(&mut params, "parent", parent);
    put(&mut params, "description", args.description);
    put_list(&mut params, "organizations", &args.organizations);

    let report = engine.run_with_current(&plan(), params, state, current)?;
    log::info!("location {title}: {}", report.outcome);
    report::emit(&report, ctx.diff);
    Ok(())
}
