//! Persistence backends for the Vestra fulfillment pipeline.
//!
//! Two implementations of the `vestra-core` store/queue traits:
//!
//! - [`postgres`]: the production backend: sqlx on PostgreSQL, queue
//!   claims via `FOR UPDATE SKIP LOCKED`, lease-based visibility timeout.
//! - [`memory`]: an in-process backend with the same semantics, used by
//!   tests and single-node development runs.

pub mod memory;
pub mod postgres;

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
