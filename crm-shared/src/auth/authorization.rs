/// Role and ownership checks.
///
/// Roles are an explicit allow-list per endpoint. There is no hierarchy:
/// an endpoint that allows only `admin` rejects a `manager`.

use super::authentication::AuthContext;
use crate::models::{user::Role, OwnerScope};

/// Only administrators.
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("You do not have permission to perform this action")]
    Forbidden,
}

/// Passes the caller through if their role is in `allowed`.
pub fn authorize<'a>(ctx: &'a AuthContext, allowed: &[Role]) -> Result<&'a AuthContext, AuthzError> {
    if allowed.contains(&ctx.role()) {
        Ok(ctx)
    } else {
        tracing::debug!(user_id = ctx.user_id(), role = ctx.role().as_str(), "Role not permitted");
        Err(AuthzError::Forbidden)
    }
}

/// Rows the caller may address by id: their own, or any for an admin.
pub fn ownership_scope(ctx: &AuthContext) -> OwnerScope {
    match ctx.role() {
        Role::Admin => OwnerScope::Any,
        Role::Manager | Role::User => OwnerScope::Owner(ctx.user_id()),
    }
}
