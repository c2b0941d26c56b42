/// User administration (admin role only)
///
/// - `GET /admin/users` - paginated listing over all users
/// - `GET /admin/users/:id`
/// - `PATCH /admin/users/:id` - name, email, password and role
/// - `DELETE /admin/users/:id`
///
/// The listing rejects sort fields outside `id, name, email, created_at, role`
/// with 400 instead of falling back.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiQuery, ValidJson},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use crm_shared::{
    auth::password,
    models::user::{normalize_email, Role, UpdateUser, User, UserFilter, UserProfile},
    query::{Page, PageParams, DEFAULT_LIMIT},
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub role: Option<Role>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    /// Matches name or email
    pub q: Option<String>,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl UserListQuery {
    fn into_parts(self) -> (PageParams, UserFilter) {
        (
            PageParams {
                skip: self.skip,
                limit: self.limit,
                sort_by: self.sort_by,
                sort_order: self.sort_order,
                q: self.q,
            },
            UserFilter { role: self.role },
        )
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,

    pub role: Option<Role>,
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> ApiResult<Json<Page<UserProfile>>> {
    let (params, filter) = query.into_parts();
    let page = User::list(&state.db, &filter, &params).await?;

    Ok(Json(Page {
        total: page.total,
        items: page.items.into_iter().map(UserProfile::from).collect(),
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserProfile>> {
    let user = User::find_by_id(&state.db, id).await?.ok_or_else(user_not_found)?;
    Ok(Json(UserProfile::from(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ValidJson(req): ValidJson<AdminUpdateUserRequest>,
) -> ApiResult<Json<UserProfile>> {
    let hashed_password = match req.password {
        Some(plain) => Some(password::hash_password_blocking(plain, state.config.auth.hash_cost).await?),
        None => None,
    };

    let update = UpdateUser {
        name: req.name.map(|n| n.trim().to_string()),
        email: req.email.as_deref().map(normalize_email),
        hashed_password,
        role: req.role,
    };

    let user = User::update(&state.db, id, update).await?.ok_or_else(user_not_found)?;

    info!(user_id = user.id, role = user.role.as_str(), "User updated by admin");
    Ok(Json(UserProfile::from(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !User::delete(&state.db, id).await? {
        return Err(user_not_found());
    }

    info!(user_id = id, "User deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}
