/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Static role table. A token carries role descriptions; the permissions
 * behind them are resolved here on every request.
 */

use super::permissions::consts::*;
use lazy_static::lazy_static;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Role definition with associated permissions
#[derive(Debug, Clone)]
pub struct Role {
    pub name: &'static str,
    pub description: &'static str,
    pub permissions: Vec<&'static str>,
}

lazy_static! {
    pub static ref ROLES: HashMap<&'static str, Role> = {
        let mut roles = HashMap::new();

        roles.insert(
            "ADMIN",
            Role {
                name: "ADMIN",
                description: "Administrator with full access",
                permissions: vec!["*"],
            },
        );

        roles.insert(
            "BRANCH",
            Role {
                name: "BRANCH",
                description: "Branch staff: stock and outgoing/incoming movements",
                permissions: vec![
                    "products:*",
                    MOVEMENTS_CREATE,
                    MOVEMENTS_READ,
                    MOVEMENTS_RECEIVE,
                    BRANCHES_READ,
                ],
            },
        );

        roles.insert(
            "DRIVER",
            Role {
                name: "DRIVER",
                description: "Driver: picks up and delivers movements",
                permissions: vec![MOVEMENTS_DELIVER, BRANCHES_READ, ROUTES_READ],
            },
        );

        roles
    };
}

/// Check if a granted permission covers a required one.
/// Supports `*` and `resource:*`.
pub fn permission_matches(granted: &str, required: &str) -> bool {
    if granted == "*" || granted == required {
        return true;
    }
    match granted.strip_suffix(":*") {
        Some(resource) => required
            .split_once(':')
            .map(|(req_resource, _)| req_resource == resource)
            .unwrap_or(false),
        None => false,
    }
}

/// Union of the permissions behind the given role names
pub fn permissions_for_roles(role_names: &[String]) -> Vec<String> {
    let mut permissions = BTreeSet::new();
    for role_name in role_names {
        match ROLES.get(role_name.as_str()) {
            Some(role) => permissions.extend(role.permissions.iter().map(|p| p.to_string())),
            None => warn!("Role not found: {}", role_name),
        }
    }
    permissions.into_iter().collect()
}
