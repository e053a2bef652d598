//! # Database Persistence Layer
//!
//! Postgres persistence for posts and votes via SQLx.
//!
//! The database is **optional**. When `DATABASE_URL` is set, the ledger runs
//! on [`votes::PgVoteStore`]. When absent, the API falls back to the
//! in-memory store (development and tests); state does not survive restarts.

pub mod votes;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the connection pool and run migrations.
///
/// Returns `None` if no URL is configured.
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!(
            "DATABASE_URL not set, running on the in-memory vote store. \
             Votes will not survive restarts."
        );
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Round-trip a trivial query, for the readiness check.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
