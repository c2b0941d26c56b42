/// Sales leads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use super::OwnerScope;
use crate::query::{Filter, ListQuery, Listing, Page, PageParams, QueryError, SortPolicy};

const COLUMNS: &str = "id, name, status, source, notes, owner_id, created_at";

pub static LEAD_LISTING: Listing = Listing {
    table: "leads",
    columns: COLUMNS,
    sortable: &["id", "name", "status", "source", "created_at"],
    searchable: &["name", "notes"],
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Unqualified,
    Converted,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Unqualified => "unqualified",
            LeadStatus::Converted => "converted",
            LeadStatus::Lost => "lost",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Referral,
    Ad,
    Webform,
    ColdCall,
    Email,
    SocialMedia,
    Other,
}

impl LeadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::Referral => "referral",
            LeadSource::Ad => "ad",
            LeadSource::Webform => "webform",
            LeadSource::ColdCall => "cold_call",
            LeadSource::Email => "email",
            LeadSource::SocialMedia => "social_media",
            LeadSource::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLead {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    /// Defaults to `new`
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateLead {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    pub status: Option<LeadStatus>,
    pub source: Option<LeadSource>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub status: Option<String>,
    pub source: Option<String>,
    /// Inclusive lower bound on `created_at`
    pub created_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the calendar day of `created_at`
    pub created_before: Option<NaiveDate>,
}

impl Lead {
    pub async fn create(pool: &PgPool, owner_id: i64, data: CreateLead) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Lead>(&format!(
            "INSERT INTO leads (name, status, source, notes, owner_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, NOW())) \
             RETURNING {COLUMNS}"
        ))
        .bind(data.name)
        .bind(data.status.unwrap_or_default().as_str())
        .bind(data.source.map(|s| s.as_str()))
        .bind(data.notes)
        .bind(owner_id)
        .bind(data.created_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: i64, scope: OwnerScope) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM leads WHERE id = "));
        qb.push_bind(id);
        scope.push_predicate(&mut qb);

        qb.build_query_as::<Lead>().fetch_optional(pool).await
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        scope: OwnerScope,
        data: UpdateLead,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE leads SET ");
        let mut changed = false;
        {
            let mut set = qb.separated(", ");
            if let Some(name) = data.name {
                set.push("name = ").push_bind_unseparated(name);
                changed = true;
            }
            if let Some(status) = data.status {
                set.push("status = ").push_bind_unseparated(status.as_str());
                changed = true;
            }
            if let Some(source) = data.source {
                set.push("source = ").push_bind_unseparated(source.as_str());
                changed = true;
            }
            if let Some(notes) = data.notes {
                set.push("notes = ").push_bind_unseparated(notes);
                changed = true;
            }
            if let Some(created_at) = data.created_at {
                set.push("created_at = ").push_bind_unseparated(created_at);
                changed = true;
            }
        }

        if !changed {
            return Self::find(pool, id, scope).await;
        }

        qb.push(" WHERE id = ").push_bind(id);
        scope.push_predicate(&mut qb);
        qb.push(" RETURNING ").push(COLUMNS);

        qb.build_query_as::<Lead>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: i64, scope: OwnerScope) -> Result<bool, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM leads WHERE id = ");
        qb.push_bind(id);
        scope.push_predicate(&mut qb);

        Ok(qb.build().execute(pool).await?.rows_affected() > 0)
    }

    pub async fn list(
        pool: &PgPool,
        owner_id: i64,
        filter: &LeadFilter,
        params: &PageParams,
    ) -> Result<Page<Self>, QueryError> {
        ListQuery::new(&LEAD_LISTING, params, SortPolicy::Fallback)?
            .owned_by(owner_id)
            .filter_opt(filter.status.clone().map(|v| Filter::Text("status", v)))
            .filter_opt(filter.source.clone().map(|v| Filter::Text("source", v)))
            .filter_opt(filter.created_after.map(Filter::CreatedFrom))
            .filter_opt(filter.created_before.map(Filter::CreatedOnOrBefore))
            .fetch(pool)
            .await
    }
}
