/// Tasks. `team_id`, `assigned_to` and `reporter` are free-form integers
/// without referential checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use super::OwnerScope;
use crate::query::{Filter, ListQuery, Listing, Page, PageParams, QueryError, SortPolicy};

const COLUMNS: &str =
    "id, head, description, status, team_id, assigned_to, reporter, owner_id, created_at";

pub static TASK_LISTING: Listing = Listing {
    table: "tasks",
    columns: COLUMNS,
    sortable: &["id", "head", "status", "team_id", "assigned_to", "created_at"],
    searchable: &["head", "description"],
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "inprogress",
            TaskStatus::Review => "review",
            TaskStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub head: String,
    pub description: Option<String>,
    pub status: String,
    pub team_id: Option<i64>,
    pub assigned_to: Option<i64>,
    pub reporter: Option<i64>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTask {
    #[validate(length(min = 1, message = "head must not be empty"))]
    pub head: String,
    pub description: Option<String>,
    /// Defaults to `todo`
    pub status: Option<TaskStatus>,
    pub team_id: Option<i64>,
    pub assigned_to: Option<i64>,
    pub reporter: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTask {
    #[validate(length(min = 1, message = "head must not be empty"))]
    pub head: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub team_id: Option<i64>,
    pub assigned_to: Option<i64>,
    pub reporter: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<String>,
    pub team_id: Option<i64>,
    pub assigned_to: Option<i64>,
}

impl Task {
    pub async fn create(pool: &PgPool, owner_id: i64, data: CreateTask) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (head, description, status, team_id, assigned_to, reporter, owner_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, NOW())) \
             RETURNING {COLUMNS}"
        ))
        .bind(data.head)
        .bind(data.description)
        .bind(data.status.unwrap_or_default().as_str())
        .bind(data.team_id)
        .bind(data.assigned_to)
        .bind(data.reporter)
        .bind(owner_id)
        .bind(data.created_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: i64, scope: OwnerScope) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM tasks WHERE id = "));
        qb.push_bind(id);
        scope.push_predicate(&mut qb);

        qb.build_query_as::<Task>().fetch_optional(pool).await
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        scope: OwnerScope,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE tasks SET ");
        let mut changed = false;
        {
            let mut set = qb.separated(", ");
            if let Some(head) = data.head {
                set.push("head = ").push_bind_unseparated(head);
                changed = true;
            }
            if let Some(description) = data.description {
                set.push("description = ").push_bind_unseparated(description);
                changed = true;
            }
            if let Some(status) = data.status {
                set.push("status = ").push_bind_unseparated(status.as_str());
                changed = true;
            }
            if let Some(team_id) = data.team_id {
                set.push("team_id = ").push_bind_unseparated(team_id);
                changed = true;
            }
            if let Some(assigned_to) = data.assigned_to {
                set.push("assigned_to = ").push_bind_unseparated(assigned_to);
                changed = true;
            }
            if let Some(reporter) = data.reporter {
                set.push("reporter = ").push_bind_unseparated(reporter);
                changed = true;
            }
        }

        if !changed {
            return Self::find(pool, id, scope).await;
        }

        qb.push(" WHERE id = ").push_bind(id);
        scope.push_predicate(&mut qb);
        qb.push(" RETURNING ").push(COLUMNS);

        qb.build_query_as::<Task>().fetch_optional(pool).await
    }

    pub async fn delete(pool: &PgPool, id: i64, scope: OwnerScope) -> Result<bool, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM tasks WHERE id = ");
        qb.push_bind(id);
        scope.push_predicate(&mut qb);

        Ok(qb.build().execute(pool).await?.rows_affected() > 0)
    }

    pub async fn list(
        pool: &PgPool,
        owner_id: i64,
        filter: &TaskFilter,
        params: &PageParams,
    ) -> Result<Page<Self>, QueryError> {
        ListQuery::new(&TASK_LISTING, params, SortPolicy::Fallback)?
            .owned_by(owner_id)
            .filter_opt(filter.status.clone().map(|v| Filter::Text("status", v)))
            .filter_opt(filter.team_id.map(|v| Filter::Int("team_id", v)))
            .filter_opt(filter.assigned_to.map(|v| Filter::Int("assigned_to", v)))
            .fetch(pool)
            .await
    }
}
