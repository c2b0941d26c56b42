/// Bearer token and role gates
///
/// `require_auth` resolves the `Authorization` header to an [`AuthContext`]
/// and stores it in the request extensions, where handlers pick it up with
/// `Extension<AuthContext>`. `require_admin` must run after it.

use crate::{app::AppState, error::ApiError};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use crm_shared::auth::{
    authentication::{authenticate, bearer_token, AuthContext},
    authorization::{authorize, ADMIN_ONLY},
};

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = bearer_token(header)?;
    let ctx = authenticate(&state.db, &state.tokens, token).await?;

    tracing::debug!(user_id = ctx.user_id(), "Authenticated request");
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let ctx = req
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;
    authorize(ctx, ADMIN_ONLY)?;

    Ok(next.run(req).await)
}
