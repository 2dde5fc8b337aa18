//! Postgres connection pool and migration runner: wires
//! `sqlx::postgres::PgPoolOptions` and `sqlx::migrate!` before serving.

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::Result;

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Builds a pool without connecting eagerly; the first real connection is
/// opened lazily on first use. Useful for wiring a pool into components (e.g.
/// `AcceptanceMemory`) in tests that never exercise the memory-read path.
pub fn connect_lazy(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new().connect_lazy(database_url)?;
    Ok(pool)
}

/// Runs every migration under `migrations/` at the workspace root. Idempotent
/// across restarts; sqlx tracks applied versions in `_sqlx_migrations`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
