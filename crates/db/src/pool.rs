//! Postgres connection pool.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::DbError;

/// Pool shared by the repositories and [`crate::PgStepStore`].
pub type DbPool = PgPool;

/// Connect to Postgres with at most `max_connections` connections.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    info!(max_connections, "connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Apply the migrations embedded from the workspace `migrations/` directory.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    info!("running database migrations");
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
