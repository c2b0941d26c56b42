/// Liveness and health endpoints
///
/// ```text
/// GET /        -> {"message": "CRM backend is running"}
/// GET /health  -> {"status": "healthy", "version": "0.1.0", "database": "connected"}
/// ```
///
/// `/health` answers 503 with `"degraded"` / `"disconnected"` when the pool
/// cannot run a query.

use crate::app::AppState;
use axum::{extract::State, http::StatusCode, Json};
use crm_shared::db::pool;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "CRM backend is running".to_string(),
    })
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, database) = match pool::ping(&state.db).await {
        Ok(()) => (StatusCode::OK, "healthy", "connected"),
        Err(e) => {
            tracing::warn!(error = %e, "Health check database ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "disconnected")
        }
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: crm_shared::VERSION.to_string(),
            database: database.to_string(),
        }),
    )
}
