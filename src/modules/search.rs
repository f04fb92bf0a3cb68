//! The `search` command.

use anyhow::Result;
use apikit::{Client, Scope};
use serde_json::json;

use crate::Context;
use crate::cli::SearchArgs;
use crate::report;

/// List every entity of a resource matching a search expression. A
/// read-only command; `changed` is always false.
pub fn run(ctx: &Context, args: SearchArgs) -> Result<()> {
    let resources = ctx
        .session
        .list(&args.resource, args.search.as_deref(), &Scope::new())?;
    log::info!("{} {} matched", resources.len(), args.resource);
    report::print_result(&json!({
        "changed": false,
        "resources": resources,
    }));
    Ok(())
}
