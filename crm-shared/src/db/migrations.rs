/// Embedded schema migrations.
///
/// The SQL files under `crm-shared/migrations/` are compiled into the binary,
/// so a deployed server never needs the directory on disk.

use sqlx::postgres::PgPool;
use tracing::{error, info};

/// Applies every pending migration.
///
/// # Errors
///
/// Returns the `MigrateError` from the first migration that fails; that
/// migration's transaction is rolled back.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Applying database migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("Database schema is up to date");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Number of successfully applied migrations and the newest version.
pub async fn applied_migrations(pool: &PgPool) -> Result<(i64, Option<i64>), sqlx::Error> {
    sqlx::query_as("SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = true")
        .fetch_one(pool)
        .await
}
