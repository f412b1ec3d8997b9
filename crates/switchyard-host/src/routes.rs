//! Route table.
//!
//! Routes are matched on their path without leading or trailing slashes.
//! The empty route is the host's own dashboard; every other route either
//! names a fragment from settings or is unknown.

use std::collections::BTreeMap;

use switchyard_loader::FragmentRef;
use switchyard_settings::RouteSettings;

/// The dashboard route, rendered by the host itself.
pub const DASHBOARD_ROUTE: &str = "";

/// What a route points to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteTarget {
    /// Rendered by the host.
    Local,
    /// Owned by a fragment.
    Fragment(FragmentRef),
}

/// Route path to target.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    fragments: BTreeMap<String, FragmentRef>,
}

impl RouteTable {
    /// Build from the `fragments.routes` settings section.
    pub fn from_settings(routes: &BTreeMap<String, RouteSettings>) -> Self {
        let fragments = routes
            .iter()
            .map(|(path, route)| {
                (
                    normalize_route(path).to_string(),
                    FragmentRef::new(route.remote_entry.clone(), route.exposed_module.clone()),
                )
            })
            .collect();
        Self { fragments }
    }

    /// Target of `route`, if known.
    pub fn resolve(&self, route: &str) -> Option<RouteTarget> {
        let route = normalize_route(route);
        if route == DASHBOARD_ROUTE {
            return Some(RouteTarget::Local);
        }
        self.fragments.get(route).cloned().map(RouteTarget::Fragment)
    }

    /// Fragment routes in path order.
    pub fn fragment_routes(&self) -> impl Iterator<Item = (&str, &FragmentRef)> {
        self.fragments.iter().map(|(path, r)| (path.as_str(), r))
    }

    /// Number of fragment routes.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Whether no fragment routes are configured.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Route path without surrounding slashes.
pub fn normalize_route(route: &str) -> &str {
    route.trim().trim_matches('/')
}
