//! Path classification and route pattern checks.
//!
//! # Responsibilities
//! - Match the reserved admin prefix (case-sensitive)
//! - Decide whether a stored page route can be mounted as a literal path
//! - Decide whether a static subdirectory name can become a path prefix
//!
//! # Design Decisions
//! - Stored routes are mounted literally, so anything the router would
//!   read as a parameter or wildcard is rejected instead of escaped
//! - No regex; every check is a single pass over the string

/// Every path under this prefix requires authentication.
pub const ADMIN_PREFIX: &str = "/admin";

/// Case-sensitive: `/Admin` is not reserved.
pub fn is_admin_path(path: &str) -> bool {
    path.starts_with(ADMIN_PREFIX)
}

/// True if `route` can be registered as a literal GET path.
pub fn is_mappable_route(route: &str) -> bool {
    if !route.starts_with('/') {
        return false;
    }
    if route
        .chars()
        .any(|c| matches!(c, '{' | '}' | '*' | '?' | '#') || c.is_whitespace() || c.is_control())
    {
        return false;
    }
    // Legacy parameter syntax is rejected by the router.
    !route.split('/').any(|segment| segment.starts_with(':'))
}

/// True if a static subdirectory called `name` can be served at `/<name>/`.
pub fn is_servable_dir_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
