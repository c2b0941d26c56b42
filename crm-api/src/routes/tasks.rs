/// Task endpoints
///
/// - `POST /tasks` (201)
/// - `GET /tasks` - the caller's tasks; filters `status`, `team_id`,
///   `assigned_to`; `q` searches head and description
/// - `GET|PUT|DELETE /tasks/:id`

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
use crm_shared::{
    auth::{authentication::AuthContext, authorization::ownership_scope},
    models::task::{CreateTask, Task, TaskFilter, TaskStatus, UpdateTask},
    query::{Page, PageParams, DEFAULT_LIMIT},
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub q: Option<String>,
    pub status: Option<TaskStatus>,
    pub team_id: Option<i64>,
    pub assigned_to: Option<i64>,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl TaskListQuery {
    fn into_parts(self) -> (PageParams, TaskFilter) {
        (
            PageParams {
                skip: self.skip,
                limit: self.limit,
                sort_by: self.sort_by,
                sort_order: self.sort_order,
                q: self.q,
            },
            TaskFilter {
                status: self.status.map(|s| s.as_str().to_string()),
                team_id: self.team_id,
                assigned_to: self.assigned_to,
            },
        )
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Task not found".to_string())
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    ValidJson(req): ValidJson<CreateTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = Task::create(&state.db, ctx.user_id(), req).await?;

    info!(task_id = task.id, owner_id = task.owner_id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<TaskListQuery>,
) -> ApiResult<Json<Page<Task>>> {
    let (params, filter) = query.into_parts();
    Ok(Json(Task::list(&state.db, ctx.user_id(), &filter, &params).await?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Task>> {
    Task::find(&state.db, id, ownership_scope(&ctx))
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidJson(req): ValidJson<UpdateTask>,
) -> ApiResult<Json<Task>> {
    let task = Task::update(&state.db, id, ownership_scope(&ctx), req)
        .await?
        .ok_or_else(not_found)?;

    info!(task_id = id, user_id = ctx.user_id(), status = %task.status, "Task updated");
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Deleted>> {
    if !Task::delete(&state.db, id, ownership_scope(&ctx)).await? {
        return Err(not_found());
    }

    info!(task_id = id, user_id = ctx.user_id(), "Task deleted");
    Ok(Deleted::new("Task deleted"))
}
