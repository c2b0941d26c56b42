/// Resolves a bearer token to the caller's identity.
///
/// A token is only as good as the account behind it: after the signature and
/// expiry check the subject is looked up, so a token issued to a since-deleted
/// user is rejected just like a forged one.

use sqlx::PgPool;
use tracing::debug;

use super::jwt::TokenSettings;
use crate::models::user::{Role, User};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    MissingCredentials,

    #[error("Could not validate credentials")]
    InvalidCredentials,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The authenticated caller, attached to each request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
}

impl AuthContext {
    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively. A missing header, another scheme,
/// or an empty token is [`AuthError::MissingCredentials`].
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingCredentials)?.trim();
    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MissingCredentials)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingCredentials);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}

/// Decodes `token` and loads its subject.
///
/// # Errors
///
/// - [`AuthError::InvalidCredentials`] if decoding fails or the user no longer exists
/// - [`AuthError::Database`] if the lookup fails
pub async fn authenticate(
    pool: &PgPool,
    tokens: &TokenSettings,
    token: &str,
) -> Result<AuthContext, AuthError> {
    let claims = tokens.decode(token).map_err(|_| AuthError::InvalidCredentials)?;

    let user = User::find_by_id(pool, claims.sub).await?.ok_or_else(|| {
        debug!(user_id = claims.sub, "Token subject no longer exists");
        AuthError::InvalidCredentials
    })?;

    Ok(AuthContext { user })
}
