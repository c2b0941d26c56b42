/// API route handlers, one module per resource
///
/// - `health`: liveness banner and database health
/// - `auth`: registration, login, email verification, password reset
/// - `me`: the caller's own profile
/// - `admin_users`: user administration
/// - `contacts`, `leads`, `tasks`: owner-scoped CRM records

use axum::Json;
use serde::{Deserialize, Serialize};

pub mod admin_users;
pub mod auth;
pub mod contacts;
pub mod health;
pub mod leads;
pub mod me;
pub mod tasks;

/// Body of a successful record delete.
#[derive(Debug, Serialize, Deserialize)]
pub struct Deleted {
    pub detail: String,
}

impl Deleted {
    fn new(detail: &str) -> Json<Self> {
        Json(Self {
            detail: detail.to_string(),
        })
    }
}
