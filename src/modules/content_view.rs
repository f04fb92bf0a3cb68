//! The `content-view` commands.

use anyhow::{Result, bail};
use apikit::{Method, Scope, SearchQuery};
use reconcile::{Detail, EntityPlan, EntitySpec, Field, diff};
use serde_json::{Map, json};

use super::{put, put_list};
use crate::Context;
use crate::cli::{ContentViewArgs, PublishArgs};
use crate::report;

fn plan() -> EntityPlan {
    let spec = EntitySpec::builder()
        .field("name", Field::string().required())
        .field("organization", Field::entity("organizations").required())
        .field("description", Field::string())
        .field("composite", Field::boolean())
        .field("auto_publish", Field::boolean())
        .field(
            "repositories",
            Field::entity_list("repositories").scoped_by("organization"),
        )
        .build();
    EntityPlan::new("content_views", spec).scoped_by("organization")
}

pub fn run(ctx: &Context, args: ContentViewArgs) -> Result<()> {
    if args.auto_publish == Some(true) && args.composite == Some(false) {
        bail!("auto_publish needs a composite content view");
    }

    let mut params = Map::new();
    params.insert("name".to_string(), args.name.into());
    params.insert("organization".to_string(), args.organization.into());
    put(&mut params, "description", args.description);
    put(&mut params, "composite", args.composite);
    put(&mut params, "auto_publish", args.auto_publish);
    put_list(&mut params, "repositories", &args.repositories);

    let report = ctx.engine().run(&plan(), params, args.state.into())?;
    log::info!("content view: {}", report.outcome);
    report::emit(&report, ctx.diff);
    Ok(())
}

/// Publish a new version of an existing content view. Publishing is
/// asynchronous server-side; the spawned task is awaited.
pub fn publish(ctx: &Context, args: PublishArgs) -> Result<()> {
    let engine = ctx.engine();
    let resolver = engine.resolver();

    let organization = resolver.require_one(
        "organizations",
        &SearchQuery::new().eq("name", &args.organization),
        &Scope::new(),
        Detail::Thin,
    )?;
    let scope = Scope::new().param("organization_id", organization["id"].clone());
    let content_view = resolver.require_one(
        "content_views",
        &SearchQuery::new().eq("name", &args.name),
        &scope,
        Detail::Thin,
    )?;
    let id = diff::id_of(&content_view)?;

    let mut payload = Map::new();
    if let Some(description) = args.description {
        payload.insert("description".to_string(), description.into());
    }
    let mut reconciler = engine.reconciler();
    let task = reconciler.run_action("content_views", &id, "publish", Method::Post, payload)?;

    log::info!("content view {}: published", args.name);
    report::print_result(&json!({
        "changed": true,
        "task": task,
    }));
    Ok(())
}
