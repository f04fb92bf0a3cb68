//! The `ping` command.

use anyhow::Result;
use serde_json::json;

use crate::Context;
use crate::report;

/// Verify connectivity and authentication by fetching the server status.
pub fn run(ctx: &Context) -> Result<()> {
    let status = ctx.session.status()?;
    log::info!("server answered with version {}", status.version);
    report::print_result(&json!({
        "changed": false,
        "status": "ok",
        "version": status.version,
    }));
    Ok(())
}
