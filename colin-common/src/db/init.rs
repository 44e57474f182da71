//! Database initialization
//!
//! The COLIN extract database is read-only for the flows except for the
//! `corp_processing` tracker table, which lives alongside the extract so the
//! batch selection query can join against it.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::{debug, info};

use super::table_schemas::{
    create_colin_extract_tables, create_lear_tables, create_tracker_table,
};

/// Open a connection pool
///
/// `url` is any sqlx SQLite URL, e.g. `sqlite://path/colin.db?mode=rwc`.
pub async fn connect_pool(url: &str, max_connections: u32) -> Result<SqlitePool> {
    debug!("Connecting to database: {}", url);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(url)
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory pool
///
/// The connection is never recycled, so the database lives as long as the pool.
pub async fn memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    Ok(pool)
}

/// Prepare the COLIN-side database: tracker table only
pub async fn init_colin_database(pool: &SqlitePool) -> Result<()> {
    create_tracker_table(pool).await?;
    info!("Tracker table initialized (corp_processing)");
    Ok(())
}

/// Create the legacy extract schema plus tracker (local fixtures and tests)
pub async fn init_colin_fixture_database(pool: &SqlitePool) -> Result<()> {
    create_colin_extract_tables(pool).await?;
    create_tracker_table(pool).await?;
    Ok(())
}

/// Prepare the LEAR target database
pub async fn init_lear_database(pool: &SqlitePool) -> Result<()> {
    create_lear_tables(pool).await?;
    info!("LEAR tables initialized");
    Ok(())
}
