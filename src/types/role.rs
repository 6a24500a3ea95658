use std::collections::BTreeSet;

/// Roles are capability tokens stored as plain strings in grants.
pub type Role = String;

/// The effective role set of a principal.
pub type RoleSet = BTreeSet<Role>;

/// Baseline role of a request without credentials.
pub const ANONYMOUS: &str = "anonymous";
/// Baseline role of any principal with a username.
pub const AUTHENTICATED: &str = "authenticated";
pub const READER: &str = "reader";
pub const MANAGER: &str = "manager";
/// Implicit role of a distribution's recorded owner.
pub const OWNER: &str = "owner";
/// Permits registering new distributions.
pub const ADD_DISTRO: &str = "add-distro";

/// Roles that may read a distribution, its files, and its indexes.
pub const READ_ROLES: &[&str] = &[READER, MANAGER, OWNER];
/// Roles that may change a distribution.
pub const MANAGE_ROLES: &[&str] = &[OWNER, MANAGER];
/// Roles that may register a new distribution.
pub const CREATE_ROLES: &[&str] = &[ADD_DISTRO, MANAGER];

/// Returns true if `roles` holds at least one of `required`.
#[must_use]
pub fn holds_any(roles: &RoleSet, required: &[&str]) -> bool {
    required.iter().any(|r| roles.contains(*r))
}

/// Parses a whitespace or comma separated role list into a set.
#[must_use]
pub fn parse_role_list(s: &str) -> RoleSet {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}
