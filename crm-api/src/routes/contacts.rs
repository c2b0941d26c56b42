/// Contact endpoints
///
/// - `POST /contacts` (201)
/// - `GET /contacts` - the caller's contacts; filters `status`, `source`,
///   `start_date`, `end_date` (inclusive, independent); `q` searches name and email
/// - `GET|PUT|DELETE /contacts/:id`
///
/// By-id access is limited to the owner, except for admins. Anything outside
/// the caller's scope is reported as 404.

use super::Deleted;
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiQuery, ValidJson},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use crm_shared::{
    auth::{authentication::AuthContext, authorization::ownership_scope},
    models::contact::{Contact, ContactFilter, ContactSource, ContactStatus, CreateContact, UpdateContact},
    query::{Page, PageParams, DEFAULT_LIMIT},
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct ContactListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub q: Option<String>,
    pub status: Option<ContactStatus>,
    pub source: Option<ContactSource>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl ContactListQuery {
    fn into_parts(self) -> (PageParams, ContactFilter) {
        (
            PageParams {
                skip: self.skip,
                limit: self.limit,
                sort_by: self.sort_by,
                sort_order: self.sort_order,
                q: self.q,
            },
            ContactFilter {
                status: self.status.map(|s| s.as_str().to_string()),
                source: self.source.map(|s| s.as_str().to_string()),
                start_date: self.start_date,
                end_date: self.end_date,
            },
        )
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Contact not found".to_string())
}

pub async fn create_contact(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    ValidJson(req): ValidJson<CreateContact>,
) -> ApiResult<(StatusCode, Json<Contact>)> {
    let contact = Contact::create(&state.db, ctx.user_id(), req).await?;

    info!(contact_id = contact.id, owner_id = contact.owner_id, "Contact created");
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<ContactListQuery>,
) -> ApiResult<Json<Page<Contact>>> {
    let (params, filter) = query.into_parts();
    let page = Contact::list(&state.db, ctx.user_id(), &filter, &params).await?;
    Ok(Json(page))
}

pub async fn get_contact(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Contact>> {
    let contact = Contact::find(&state.db, id, ownership_scope(&ctx))
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(contact))
}

pub async fn update_contact(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidJson(req): ValidJson<UpdateContact>,
) -> ApiResult<Json<Contact>> {
    let contact = Contact::update(&state.db, id, ownership_scope(&ctx), req)
        .await?
        .ok_or_else(not_found)?;

    info!(contact_id = id, user_id = ctx.user_id(), "Contact updated");
    Ok(Json(contact))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Deleted>> {
    if !Contact::delete(&state.db, id, ownership_scope(&ctx)).await? {
        return Err(not_found());
    }

    info!(contact_id = id, user_id = ctx.user_id(), "Contact deleted");
    Ok(Deleted::new("Contact deleted"))
}
