//! Static routing table mapping resource types to API mount points.
//!
//! Plain Foreman resources live under `/api`; Katello resources under
//! `/katello/api` (sometimes with a different path segment); foreman_tasks
//! under its own plugin mount. Nested resources such as parameters are
//! routed under their parent via [`Scope::route_parent`].

use crate::client::Scope;

pub(crate) struct Route<'a> {
    pub prefix: &'static str,
    pub segment: &'a str,
}

pub(crate) fn route_for(resource: &str) -> Route<'_> {
    match resource {
        "content_views" | "content_view_versions" | "content_view_filters" | "products"
        | "repositories" | "activation_keys" | "host_collections" | "sync_plans"
        | "content_credentials" | "subscriptions" => Route {
            prefix: "/katello/api",
            segment: resource,
        },
        "lifecycle_environments" => Route {
            prefix: "/katello/api",
            segment: "environments",
        },
        "foreman_tasks" => Route {
            prefix: "/foreman_tasks/api",
            segment: "tasks",
        },
        _ => Route {
            prefix: "/api",
            segment: resource,
        },
    }
}

pub(crate) fn collection_path(resource: &str, scope: &Scope) -> String {
    let route = route_for(resource);
    match scope.route_parent() {
        Some((parent, id)) => {
            let parent_route = route_for(parent);
            format!(
                "{}/{}/{id}/{}",
                parent_route.prefix, parent_route.segment, route.segment
            )
        }
        None => format!("{}/{}", route.prefix, route.segment),
    }
}

pub(crate) fn member_path(resource: &str, id: &str, scope: &Scope) -> String {
    format!("{}/{id}", collection_path(resource, scope))
}

pub(crate) fn action_path(resource: &str, id: &str, action: &str) -> String {
    let route = route_for(resource);
    format!("{}/{}/{id}/{action}", route.prefix, route.segment)
}
