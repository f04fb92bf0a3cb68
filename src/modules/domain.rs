//! The `domain` command.

use anyhow::Result;
use reconcile::{EntityPlan, EntitySpec, Field, params};
use serde_json::{Map, Value};

use super::{parameters_from, put, put_list};
use crate::Context;
use crate::cli::DomainArgs;
use crate::report;

fn plan() -> EntityPlan {
    let spec = EntitySpec::builder()
        .field("name", Field::string().required())
        .field("updated_name", Field::string().search_only())
        // the server calls the description of a domain its fullname
        .field(
            "description",
            Field::string().alias("fullname").flat_name("fullname"),
        )
        .field("dns_proxy", Field::entity("smart_proxies").flat_name("dns_id"))
        .field("locations", Field::entity_list("locations"))
        .field("organizations", Field::entity_list("organizations"))
        .field("parameters", Field::nested_list(params::parameter_spec()))
        .build();
    EntityPlan::new("domains", spec)
}

pub fn run(ctx: &Context, args: DomainArgs) -> Result<()> {
    let mut params = Map::new();
    params.insert("name".to_string(), args.name.into());
    put(&mut params, "updated_name", args.updated_name);
    put(&mut params, "description", args.description);
    put(&mut params, "fullname", args.fullname);
    put(&mut params, "dns_proxy", args.dns_proxy);
    put_list(&mut params, "locations", &args.locations);
    put_list(&mut params, "organizations", &args.organizations);
    if !args.parameters.is_empty() {
        params.insert("parameters".to_string(), parameters_from(&args.parameters)?);
    } else if args.clear_parameters {
        params.insert("parameters".to_string(), Value::Array(Vec::new()));
    }

    let report = ctx.engine().run(&plan(), params, args.state.into())?;
    log::info!("domain: {}", report.outcome);
    report::emit(&report, ctx.diff);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_wire_names() {
        let plan = plan();
        assert_eq!(plan.spec().wire_name("description"), "fullname");
        assert_eq!(plan.spec().wire_name("dns_proxy"), "dns_id");
        assert_eq!(plan.spec().wire_name("locations"), "location_ids");
    }

    #[test]
    fn test_plan_accepts_fullname_alias() {
        let mut raw = Map::new();
        raw.insert("name".to_string(), "example.com".into());
        raw.insert("fullname".to_string(), "Example domain".into());
        let desired = plan().spec().desired_state(raw).unwrap();
        assert_eq!(
            desired.get("description"),
            Some(&Value::String("Example domain".to_string()))
        );
    }
}
