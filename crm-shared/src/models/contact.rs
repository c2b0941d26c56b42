/// Contacts: people a user keeps in their address book.
///
/// `status` and `source` are constrained enums on input but stored as open
/// text, so filters compare against plain strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use super::OwnerScope;
use crate::query::{Filter, ListQuery, Listing, Page, PageParams, QueryError, SortPolicy};

const COLUMNS: &str = "id, name, email, phone, company, source, status, notes, owner_id, created_at";

pub static CONTACT_LISTING: Listing = Listing {
    table: "contacts",
    columns: COLUMNS,
    sortable: &["id", "name", "email", "phone", "company", "source", "status", "created_at"],
    searchable: &["name", "email"],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    New,
    Contacted,
    Won,
    Lost,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Contacted => "contacted",
            ContactStatus::Won => "won",
            ContactStatus::Lost => "lost",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactSource {
    Referral,
    Ad,
    Webform,
}

impl ContactSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactSource::Referral => "referral",
            ContactSource::Ad => "ad",
            ContactSource::Webform => "webform",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateContact {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(email(message = "invalid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<ContactSource>,
    pub status: Option<ContactStatus>,
    pub notes: Option<String>,
    /// Defaults to now; settable for imports
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial update; absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateContact {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "invalid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub source: Option<ContactSource>,
    pub status: Option<ContactStatus>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pub status: Option<String>,
    pub source: Option<String>,
    /// Inclusive lower bound on `created_at`
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub end_date: Option<DateTime<Utc>>,
}

impl Contact {
    pub async fn create(
        pool: &PgPool,
        owner_id: i64,
        data: CreateContact,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Contact>(&format!(
            "INSERT INTO contacts (name, email, phone, company, source, status, notes, owner_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, NOW())) \
             RETURNING {COLUMNS}"
        ))
        .bind(data.name)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.company)
        .bind(data.source.map(|s| s.as_str()))
        .bind(data.status.map(|s| s.as_str()))
        .bind(data.notes)
        .bind(owner_id)
        .bind(data.created_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: i64, scope: OwnerScope) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM contacts WHERE id = "));
        qb.push_bind(id);
        scope.push_predicate(&mut qb);

        qb.build_query_as::<Contact>().fetch_optional(pool).await
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        scope: OwnerScope,
        data: UpdateContact,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE contacts SET ");
        let mut changed = false;
        {
            let mut set = qb.separated(", ");
            if let Some(name) = data.name {
                set.push("name = ").push_bind_unseparated(name);
                changed = true;
            }
            if let Some(email) = data.email {
                set.push("email = ").push_bind_unseparated(email);
                changed = true;
            }
            if let Some(phone) = data.phone {
                set.push("phone = ").push_bind_unseparated(phone);
                changed = true;
            }
            if let Some(company) = data.company {
                set.push("company = ").push_bind_unseparated(company);
                changed = true;
            }
            if let Some(source) = data.source {
                set.push("source = ").push_bind_unseparated(source.as_str());
                changed = true;
            }
            if let Some(status) = data.status {
                set.push("status = ").push_bind_unseparated(status.as_str());
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

        qb.build_query_as::<Contact>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: i64, scope: OwnerScope) -> Result<bool, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM contacts WHERE id = ");
        qb.push_bind(id);
        scope.push_predicate(&mut qb);

        let result = qb.build().execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Lists contacts owned by `owner_id`. Unknown sort fields fall back to `id`.
    pub async fn list(
        pool: &PgPool,
        owner_id: i64,
        filter: &ContactFilter,
        params: &PageParams,
    ) -> Result<Page<Self>, QueryError> {
        ListQuery::new(&CONTACT_LISTING, params, SortPolicy::Fallback)?
            .owned_by(owner_id)
            .filter_opt(filter.status.clone().map(|v| Filter::Text("status", v)))
            .filter_opt(filter.source.clone().map(|v| Filter::Text("source", v)))
            .filter_opt(filter.start_date.map(Filter::CreatedFrom))
            .filter_opt(filter.end_date.map(Filter::CreatedUntil))
            .fetch(pool)
            .await
    }
}
