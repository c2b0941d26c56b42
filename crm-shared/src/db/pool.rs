/// PostgreSQL connection pool.
///
/// The pool is the only resource shared between requests. Each handler checks a
/// connection out for the duration of a query and sqlx returns it on drop, on
/// success and on error alike.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pool sizing and timeouts.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// PostgreSQL connection URL
    pub url: String,

    /// Upper bound on open connections
    pub max_connections: u32,

    /// Connections kept warm while idle
    pub min_connections: u32,

    /// How long a request waits for a free connection
    pub acquire_timeout: Duration,

    /// Idle connections older than this are closed
    pub idle_timeout: Option<Duration>,

    /// Connections are recycled after this age
    pub max_lifetime: Option<Duration>,
}

impl PoolSettings {
    /// Settings for `url` with the default sizing.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

/// Opens the pool and verifies the database answers before returning it.
///
/// # Errors
///
/// Returns the underlying `sqlx::Error` if the URL is malformed, the server is
/// unreachable, or the liveness probe fails.
pub async fn connect(settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    info!(
        max_connections = settings.max_connections,
        min_connections = settings.min_connections,
        "Opening database pool"
    );

    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .test_before_acquire(true);

    if let Some(idle) = settings.idle_timeout {
        options = options.idle_timeout(idle);
    }
    if let Some(lifetime) = settings.max_lifetime {
        options = options.max_lifetime(lifetime);
    }

    let pool = options.connect(&settings.url).await?;
    ping(&pool).await?;

    info!("Database pool ready");
    Ok(pool)
}

/// Round-trips `SELECT 1`.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    let value: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;

    if value == 1 {
        debug!("Database ping ok");
        Ok(())
    } else {
        warn!(value, "Database ping returned unexpected value");
        Err(sqlx::Error::Protocol("unexpected ping result".into()))
    }
}

/// Closes every connection; call once during shutdown.
pub async fn close(pool: PgPool) {
    info!("Closing database pool");
    pool.close().await;
}
