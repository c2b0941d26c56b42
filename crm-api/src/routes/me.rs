/// Self-service profile endpoints
///
/// - `GET /me`
/// - `PATCH /me` - name, email and password; the role is never self-assigned
/// - `DELETE /me` - removes the account and everything it owns

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidJson,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use crm_shared::{
    auth::{authentication::AuthContext, password},
    models::user::{normalize_email, UpdateUser, User, UserProfile},
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
}

pub async fn get_me(Extension(ctx): Extension<AuthContext>) -> Json<UserProfile> {
    Json(UserProfile::from(ctx.user))
}

/// # Errors
///
/// - `400 Bad Request`: validation failed or the new email is taken
pub async fn update_me(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    ValidJson(req): ValidJson<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    let hashed_password = match req.password {
        Some(plain) => Some(password::hash_password_blocking(plain, state.config.auth.hash_cost).await?),
        None => None,
    };

    let update = UpdateUser {
        name: req.name.map(|n| n.trim().to_string()),
        email: req.email.as_deref().map(normalize_email),
        hashed_password,
        role: None,
    };

    let user = User::update(&state.db, ctx.user_id(), update)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    info!(user_id = user.id, "Profile updated");
    Ok(Json(UserProfile::from(user)))
}

pub async fn delete_me(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    if !User::delete(&state.db, ctx.user_id()).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    info!(user_id = ctx.user_id(), "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}
