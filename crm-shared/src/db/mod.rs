/// Database layer: connection pooling and embedded migrations.
///
/// Entity access lives in [`crate::models`]; list/search SQL is assembled by
/// [`crate::query`].
///
/// # Example
///
/// ```no_run
/// use crm_shared::db::pool::{connect, PoolSettings};
/// use crm_shared::db::migrations::run_migrations;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let settings = PoolSettings::new(std::env::var("DATABASE_URL")?);
///     let pool = connect(&settings).await?;
///     run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
