/// Lead endpoints
///
/// - `POST /leads` (201)
/// - `GET /leads` - the caller's leads; filters `status`, `source`,
///   `created_after` (timestamp, inclusive), `created_before` (calendar day,
///   inclusive; a timestamp is cut down to its UTC day); `q` searches name
///   and notes
/// - `GET|PUT|DELETE /leads/:id`

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
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use crm_shared::{
    auth::{authentication::AuthContext, authorization::ownership_scope},
    models::lead::{CreateLead, Lead, LeadFilter, LeadSource, LeadStatus, UpdateLead},
    query::{Page, PageParams, DEFAULT_LIMIT},
};
use serde::{de, Deserialize, Deserializer};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct LeadListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub q: Option<String>,
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "day_or_timestamp")]
    pub created_before: Option<NaiveDate>,
}

fn day_or_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_day(&raw)
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("expected a date or timestamp, got `{raw}`")))
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    raw.parse::<NaiveDate>()
        .ok()
        .or_else(|| raw.parse::<DateTime<Utc>>().ok().map(|ts| ts.date_naive()))
        .or_else(|| raw.parse::<NaiveDateTime>().ok().map(|ts| ts.date()))
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl LeadListQuery {
    fn into_parts(self) -> (PageParams, LeadFilter) {
        (
            PageParams {
                skip: self.skip,
                limit: self.limit,
                sort_by: self.sort_by,
                sort_order: self.sort_order,
                q: self.q,
            },
            LeadFilter {
                status: self.status.map(|s| s.as_str().to_string()),
                source: self.source.map(|s| s.as_str().to_string()),
                created_after: self.created_after,
                created_before: self.created_before,
            },
        )
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Lead not found".to_string())
}

pub async fn create_lead(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    ValidJson(req): ValidJson<CreateLead>,
) -> ApiResult<(StatusCode, Json<Lead>)> {
    let lead = Lead::create(&state.db, ctx.user_id(), req).await?;

    info!(lead_id = lead.id, owner_id = lead.owner_id, status = %lead.status, "Lead created");
    Ok((StatusCode::CREATED, Json(lead)))
}

pub async fn list_leads(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<LeadListQuery>,
) -> ApiResult<Json<Page<Lead>>> {
    let (params, filter) = query.into_parts();
    Ok(Json(Lead::list(&state.db, ctx.user_id(), &filter, &params).await?))
}

pub async fn get_lead(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Lead>> {
    Lead::find(&state.db, id, ownership_scope(&ctx))
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

pub async fn update_lead(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidJson(req): ValidJson<UpdateLead>,
) -> ApiResult<Json<Lead>> {
    let lead = Lead::update(&state.db, id, ownership_scope(&ctx), req)
        .await?
        .ok_or_else(not_found)?;

    info!(lead_id = id, user_id = ctx.user_id(), "Lead updated");
    Ok(Json(lead))
}

pub async fn delete_lead(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Deleted>> {
    if !Lead::delete(&state.db, id, ownership_scope(&ctx)).await? {
        return Err(not_found());
    }

    info!(lead_id = id, user_id = ctx.user_id(), "Lead deleted");
    Ok(Deleted::new("Lead deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_date_bounds() {
        let query: LeadListQuery = serde_json::from_value(serde_json::json!({
            "created_after": "2024-03-01T08:00:00Z",
            "created_before": "2024-03-31",
            "source": "cold_call"
        }))
        .unwrap();
        let (_, filter) = query.into_parts();

        assert_eq!(filter.created_before, NaiveDate::from_ymd_opt(2024, 3, 31));
        assert_eq!(filter.source.as_deref(), Some("cold_call"));
        assert!(filter.status.is_none());
    }

    #[test]
    fn test_created_before_accepts_timestamps() {
        let day = NaiveDate::from_ymd_opt(2024, 4, 1);

        for raw in ["2024-04-01", "2024-04-01T10:00:00", "2024-04-01T10:00:00.250", "2024-04-01T22:00:00Z"] {
            let query: LeadListQuery =
                serde_json::from_value(serde_json::json!({ "created_before": raw })).unwrap();
            assert_eq!(query.created_before, day, "{raw}");
        }

        // Offsets are normalized to UTC before taking the day.
        assert_eq!(parse_day("2024-04-01T23:30:00-02:00"), NaiveDate::from_ymd_opt(2024, 4, 2));
    }

    #[test]
    fn test_created_before_rejects_garbage() {
        let result: Result<LeadListQuery, _> =
            serde_json::from_value(serde_json::json!({ "created_before": "last tuesday" }));
        assert!(result.is_err());

        let query: LeadListQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(query.created_before.is_none());
    }
}
