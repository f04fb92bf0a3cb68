//! The `lifecycle-environment` command.
//!
//! Lifecycle environments live inside an organization and form a
//! promotion path: every environment names the one prior to it, with
//! the built-in Library at the root. The path is append-only, so
//! `label` and `prior` reject changes on an existing environment.

use anyhow::{Result, bail};
use apikit::{Scope, SearchQuery};
use reconcile::{Detail, EntityPlan, EntitySpec, Field, State};
use serde_json::{Map, Value};

use super::put;
use crate::Context;
use crate::cli::LifecycleEnvironmentArgs;
use crate::report;

fn plan() -> EntityPlan {
    let spec = EntitySpec::builder()
        .field("name", Field::string().required())
        .field("organization", Field::entity("organizations").required())
        .field("description", Field::string())
        .field("label", Field::string())
        .field(
            "prior",
            Field::entity("lifecycle_environments").scoped_by("organization"),
        )
        .build();
    EntityPlan::new("lifecycle_environments", spec).scoped_by("organization")
}

pub fn run(ctx: &Context, args: LifecycleEnvironmentArgs) -> Result<()> {
    let state: State = args.state.into();
    let engine = ctx.engine();
    let resolver = engine.resolver();

    let organization = resolver.require_one(
        "organizations",
        &SearchQuery::new().eq("name", &args.organization),
        &Scope::new(),
        Detail::Thin,
    )?;
    let scope = Scope::new().param("organization_id", organization["id"].clone());
    let detail = if state.wants_present() {
        Detail::Full
    } else {
        Detail::Thin
    };
    let current = resolver.find_by("lifecycle_environments", "name", &args.name, &scope, detail)?;

    if state.wants_present() {
        if let Some(current) = &current {
            check_immutable(&args, current)?;
        }
    }

    let mut params = Map::new();
    params.insert("name".to_string(), args.name.into());
    params.insert("organization".to_string(), organization);
    put(&mut params, "description", args.description);
    put(&mut params, "label", args.label);
    put(&mut params, "prior", args.prior);
    // new environments promote from Library unless told otherwise
    if current.is_none() && state.wants_present() && !params.contains_key("prior") {
        params.insert("prior".to_string(), "Library".into());
    }

    let report = engine.run_with_current(&plan(), params, state, current)?;
    log::info!("lifecycle environment: {}", report.outcome);
    report::emit(&report, ctx.diff);
    Ok(())
}

fn check_immutable(args: &LifecycleEnvironmentArgs, current: &Value) -> Result<()> {
    if let Some(label) = &args.label {
        let current_label = current["label"].as_str().unwrap_or_default();
        if current_label != label {
            bail!("label cannot be changed on an existing lifecycle environment");
        }
    }
    if let Some(prior) = &args.prior {
        let current_prior = current["prior"]["name"].as_str().unwrap_or_default();
        if current_prior != prior {
            bail!("prior cannot be changed on an existing lifecycle environment");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::StateArg;
    use serde_json::json;

    fn args() -> LifecycleEnvironmentArgs {
        LifecycleEnvironmentArgs {
            name: "Dev".to_string(),
            organization: "ACME".to_string(),
            description: None,
            label: None,
            prior: None,
            state: StateArg::Present,
        }
    }

    #[test]
    fn test_plan_scopes_by_organization() {
        let plan = plan();
        assert_eq!(plan.resource(), "lifecycle_environments");
        assert_eq!(plan.spec().wire_name("prior"), "prior_id");
    }

    #[test]
    fn test_check_immutable_accepts_matching_values() {
        let mut args = args();
        args.label = Some("dev".to_string());
        args.prior = Some("Library".to_string());
        let current = json!({
            "id": 3,
            "label": "dev",
            "prior": {"id": 1, "name": "Library"},
        });
        assert!(check_immutable(&args, &current).is_ok());
    }

    #[test]
    fn test_check_immutable_rejects_label_change() {
        let mut args = args();
        args.label = Some("development".to_string());
        let current = json!({"id": 3, "label": "dev"});
        let err = check_immutable(&args, &current).unwrap_err();
        assert!(err.to_string().contains("label"));
    }

    #[test]
    fn test_check_immutable_rejects_prior_change() {
        let mut args = args();
        args.prior = Some("QA".to_string());
        let current = json!({
            "id": 3,
            "label": "dev",
            "prior": {"id": 1, "name": "Library"},
        });
        let err = check_immutable(&args, &current).unwrap_err();
        assert!(err.to_string().contains("prior"));
    }

    #[test]
    fn test_check_immutable_ignores_omitted_flags() {
        let current = json!({"id": 3, "label": "dev", "prior": {"name": "Library"}});
        assert!(check_immutable(&args(), &current).is_ok());
    }
}
