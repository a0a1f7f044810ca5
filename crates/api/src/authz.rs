//! API-side authorization guard.
//!
//! Commands are checked at the command boundary (before dispatch) so domain
//! aggregates and infra stay auth-agnostic; read-only views with a role
//! requirement go through [`require`].

use libram_auth::{authorize, AuthzError, CommandAuthorization, Permission, Principal, Role};

use crate::context::PrincipalContext;

/// Check authorization for a command in the current request context.
///
/// Intended to be called **before** dispatching the command.
pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    for perm in command.required_permissions() {
        require(principal, perm)?;
    }
    Ok(())
}

/// Check a single permission for the current request context.
pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), AuthzError> {
    let resolved = Principal {
        principal_id: principal.principal_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };
    authorize(&resolved, permission)
}

/// Role → permission mapping.
///
/// Three roles: `member` (authenticated reader), `staff` (restocking
/// workflow), `admin` (owner; everything). Kept in code until a real policy
/// source exists.
fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r.as_str() == "admin") {
        return vec![Permission::new("*")];
    }

    if roles.iter().any(|r| r.as_str() == "staff") {
        return vec![
            Permission::new("catalog.restock"),
            Permission::new("supply.workflow"),
        ];
    }

    Vec::new()
}
