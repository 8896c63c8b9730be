/*!
 * # Permissions Module
 *
 * Permission strings are `resource:action`. Routes require exactly one of them.
 */

/// Permission string constants used by the route table
pub mod consts {
    // Users
    pub const USERS_CREATE: &str = "users:create";
    pub const USERS_READ: &str = "users:read";
    pub const USERS_UPDATE: &str = "users:update";

    // Products
    pub const PRODUCTS_CREATE: &str = "products:create";
    pub const PRODUCTS_READ: &str = "products:read";
    pub const PRODUCTS_UPDATE: &str = "products:update";

    // Movements
    pub const MOVEMENTS_CREATE: &str = "movements:create";
    pub const MOVEMENTS_READ: &str = "movements:read";
    /// Driver side of the workflow: queue, start, end
    pub const MOVEMENTS_DELIVER: &str = "movements:deliver";
    /// Destination side of the workflow: finish
    pub const MOVEMENTS_RECEIVE: &str = "movements:receive";

    // Branches
    pub const BRANCHES_READ: &str = "branches:read";
    pub const ROUTES_READ: &str = "routes:read";
}

/// Every permission known to the system
pub fn all() -> Vec<&'static str> {
    use consts::*;
    vec![
        USERS_CREATE,
        USERS_READ,
        USERS_UPDATE,
        PRODUCTS_CREATE,
        PRODUCTS_READ,
        PRODUCTS_UPDATE,
        MOVEMENTS_CREATE,
        MOVEMENTS_READ,
        MOVEMENTS_DELIVER,
        MOVEMENTS_RECEIVE,
        BRANCHES_READ,
        ROUTES_READ,
    ]
}
