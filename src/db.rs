//! Postgres pool, migrations and liveness check.

use std::time::Duration;

use sqlx::{Pool, Postgres, postgres::PgPoolOptions};

use crate::config::Config;

pub type DbPool = Pool<Postgres>;

/// How long a request waits for a free connection before failing with a 500.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect a pool sized by `DATABASE_MAX_CONNECTIONS`.
pub async fn create_pool(config: &Config) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&config.database_url)
        .await
}

/// Apply pending files from `migrations/`, tracked in `_sqlx_migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Round-trip a trivial query.
pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
