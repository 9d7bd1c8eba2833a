//! PostgreSQL shadow-database collaborator.
//!
//! Implements [`sqlshadow_core::collaborators::ShadowDatabase`] on top of a
//! `sqlx` connection pool. Each request's isolation scope is a transaction
//! that is always rolled back, so candidate validation can never mutate the
//! shadow data.

pub mod shadow;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub use shadow::PgShadowDatabase;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Create a pool without connecting eagerly. Connections are established on
/// first use; startup does not require the database to be reachable.
pub fn create_pool_lazy(database_url: &str) -> Result<DbPool, sqlx::Error> {
    Ok(PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(database_url)?)
}

/// Round-trip liveness check.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

/// Server version string, for health reporting.
pub async fn server_version(pool: &DbPool) -> Result<String, sqlx::Error> {
    sqlx::query_scalar("SHOW server_version").fetch_one(pool).await
}
