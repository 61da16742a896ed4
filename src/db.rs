//! SQLite database connection management.
//!
//! The pool is created once at startup and shared by every request.
//! WAL mode lets readers proceed while a writer holds the lock; the busy
//! timeout bounds how long a write waits for a competing writer before it
//! fails with `database is locked`.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::config::DbConfig;

/// Create a connection pool to the configured SQLite database.
///
/// Creates the database file and its parent directories if they don't exist.
pub async fn connect(config: &DbConfig) -> Result<SqlitePool> {
    open(&config.path, config).await
}

/// Create a connection pool to the error log database (`[db].error_log_path`).
///
/// SQLite locks a whole file, so the log gets its own file and pool: a
/// transaction holding the data tables cannot stall the append that records
/// its own lock failure.
pub async fn connect_error_log(config: &DbConfig) -> Result<SqlitePool> {
    open(&config.error_log_path(), config).await
}

async fn open(db_path: &Path, config: &DbConfig) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// A single-connection in-memory database, used by tests and dry runs.
///
/// The connection is never recycled, since closing it discards the data.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    Ok(pool)
}
