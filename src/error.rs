//! Typed failures of data mutations.
//!
//! Every failed write is mapped to a [`MutationError`], which fixes both the
//! HTTP status returned to the caller and the [`ErrorCode`] logged by the
//! error pipeline.

use axum::http::StatusCode;
use thiserror::Error;

use self_healing_core::models::{ErrorCode, ErrorEvent};

/// Primary SQLite result codes that mean another connection holds a lock.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Debug, Error)]
pub enum MutationError {
    /// A unique index rejected the write.
    #[error("{0}")]
    DuplicateKey(String),
    /// The write gave up waiting for a lock held by another transaction.
    #[error("Table lock detected: {0}")]
    LockContention(String),
    #[error("{0}")]
    Unexpected(String),
}

impl MutationError {
    pub fn status(&self) -> StatusCode {
        match self {
            MutationError::DuplicateKey(_) => StatusCode::CONFLICT,
            MutationError::LockContention(_) => StatusCode::SERVICE_UNAVAILABLE,
            MutationError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            MutationError::DuplicateKey(_) => ErrorCode::DuplicateKey,
            MutationError::LockContention(_) => ErrorCode::LockNotAvailable,
            MutationError::Unexpected(_) => ErrorCode::UnexpectedException,
        }
    }

    /// Message returned to the HTTP caller.
    pub fn public_message(&self) -> String {
        match self {
            MutationError::DuplicateKey(_) => "Duplicate email. Logged in error_logs.".to_string(),
            MutationError::LockContention(_) => {
                "Table is locked by another transaction.".to_string()
            }
            MutationError::Unexpected(msg) => format!("Unexpected error: {}", msg),
        }
    }

    /// The event handed to the error pipeline for this failure.
    pub fn to_event(&self, source: &str) -> ErrorEvent {
        ErrorEvent::new(self.to_string(), self.code(), source)
    }
}

impl From<sqlx::Error> for MutationError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return MutationError::DuplicateKey(err.to_string());
            }
            let primary_code = db_err
                .code()
                .and_then(|c| c.parse::<i32>().ok())
                .map(|c| c & 0xff);
            if matches!(primary_code, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED)) {
                return MutationError::LockContention(err.to_string());
            }
        }
        MutationError::Unexpected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_code_mapping() {
        let dup = MutationError::DuplicateKey("UNIQUE constraint failed".into());
        assert_eq!(dup.status(), StatusCode::CONFLICT);
        assert_eq!(dup.code(), ErrorCode::DuplicateKey);

        let lock = MutationError::LockContention("database is locked".into());
        assert_eq!(lock.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(lock.code(), ErrorCode::LockNotAvailable);
        assert_eq!(lock.to_string(), "Table lock detected: database is locked");

        let other = MutationError::Unexpected("disk I/O error".into());
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(other.public_message(), "Unexpected error: disk I/O error");
    }

    #[test]
    fn test_event_carries_raw_message() {
        let lock = MutationError::LockContention("database is locked".into());
        let event = lock.to_event("add_employee");
        assert_eq!(event.raw_message, "Table lock detected: database is locked");
        assert_eq!(event.code, ErrorCode::LockNotAvailable);
        assert_eq!(event.source, "add_employee");
    }

    #[test]
    fn test_non_database_sqlx_error_is_unexpected() {
        let err = MutationError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, MutationError::Unexpected(_)));
    }
}
