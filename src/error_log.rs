//! SQLite implementation of the append-only error log (`error_logs` table).

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::{Row, SqlitePool};

use self_healing_core::models::{ErrorEvent, LoggedError};
use self_healing_core::store::ErrorLog;

use crate::config::DbConfig;
use crate::{db, migrate};

#[derive(Clone)]
pub struct SqliteErrorLog {
    pool: SqlitePool,
}

impl SqliteErrorLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `[db].error_log_path` and create the table if needed.
    pub async fn open(config: &DbConfig) -> Result<Self> {
        let pool = db::connect_error_log(config).await?;
        migrate::apply_error_log(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Every logged message with its id as a string, oldest first.
    /// Used to rebuild the similarity index.
    pub async fn all_messages(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT id, error_message FROM error_logs ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: i64 = row.get("id");
                (row.get("error_message"), id.to_string())
            })
            .collect())
    }
}

fn format_ts(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

#[async_trait]
impl ErrorLog for SqliteErrorLog {
    async fn append(&self, event: &ErrorEvent) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO error_logs (error_code, error_message, source, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(event.code.as_str())
        .bind(&event.raw_message)
        .bind(&event.source)
        .bind(event.timestamp.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn recent(&self, limit: Option<i64>) -> Result<Vec<LoggedError>> {
        // SQLite treats a negative LIMIT as unbounded.
        let rows = sqlx::query(
            "SELECT id, error_code, error_message, source, created_at FROM error_logs ORDER BY id DESC LIMIT ?",
        )
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| LoggedError {
                id: row.get("id"),
                error_code: row.get("error_code"),
                error_message: row.get("error_message"),
                source: row.get("source"),
                created_at: format_ts(row.get("created_at")),
            })
            .collect())
    }

    async fn counts_by_code(&self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT error_code, COUNT(*) AS n FROM error_logs GROUP BY error_code ORDER BY n DESC, error_code ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use self_healing_core::models::ErrorCode;

    async fn log() -> SqliteErrorLog {
        let pool = db::connect_in_memory().await.unwrap();
        migrate::apply(&pool).await.unwrap();
        SqliteErrorLog::new(pool)
    }

    #[tokio::test]
    async fn test_append_and_recent_newest_first() {
        let log = log().await;
        let a = log
            .append(&ErrorEvent::new("first", ErrorCode::DuplicateKey, "add_employee"))
            .await
            .unwrap();
        let b = log
            .append(&ErrorEvent::new("second", ErrorCode::LockNotAvailable, "add_employee"))
            .await
            .unwrap();
        assert!(b > a);

        let rows = log.recent(None).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].error_message, "second");
        assert_eq!(rows[0].error_code, "LOCK_NOT_AVAILABLE");
        assert!(rows[0].created_at.contains('T'));

        assert_eq!(log.recent(Some(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_counts_and_all_messages() {
        let log = log().await;
        for msg in ["dup a", "dup b"] {
            log.append(&ErrorEvent::new(msg, ErrorCode::DuplicateKey, "add_employee"))
                .await
                .unwrap();
        }
        log.append(&ErrorEvent::new("boom", ErrorCode::UnexpectedException, "add_employee"))
            .await
            .unwrap();

        let counts = log.counts_by_code().await.unwrap();
        assert_eq!(counts[0], ("DUPLICATE_KEY".to_string(), 2));
        assert_eq!(counts[1], ("UNEXPECTED_EXCEPTION".to_string(), 1));

        let all = log.all_messages().await.unwrap();
        assert_eq!(all[0], ("dup a".to_string(), "1".to_string()));
        assert_eq!(all.len(), 3);
    }
}
