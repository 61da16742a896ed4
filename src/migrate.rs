//! Schema creation. Every statement is idempotent.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the data tables and the error log, each in its own database file.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db).await?;
    apply_data(&pool).await?;
    pool.close().await;

    let log_pool = db::connect_error_log(&config.db).await?;
    apply_error_log(&log_pool).await?;
    log_pool.close().await;
    Ok(())
}

/// Create both tables on a single pool. Used with in-memory databases.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    apply_data(pool).await?;
    apply_error_log(pool).await
}

/// Create the `employee` table.
pub async fn apply_data(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employee (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            department TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Create the `error_logs` table and its indexes.
pub async fn apply_error_log(pool: &SqlitePool) -> Result<()> {
    // Append-only: rows are inserted by the error pipeline and never updated.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS error_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            error_code TEXT NOT NULL,
            error_message TEXT NOT NULL,
            source TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_error_logs_created_at ON error_logs(created_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_error_logs_code ON error_logs(error_code)")
        .execute(pool)
        .await?;

    Ok(())
}
