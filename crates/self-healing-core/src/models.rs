//! Core data models that flow through the error pipeline.
//!
//! [`ErrorEvent`]s are produced by failed mutations, [`Classification`]s are
//! derived from them on demand, [`KnowledgeEntry`]s live in the similarity
//! index, and [`Explanation`]s are produced once per pipeline run.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provisional code attached to a failed mutation when it is caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DuplicateKey,
    LockNotAvailable,
    UnexpectedException,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DuplicateKey => "DUPLICATE_KEY",
            ErrorCode::LockNotAvailable => "LOCK_NOT_AVAILABLE",
            ErrorCode::UnexpectedException => "UNEXPECTED_EXCEPTION",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DUPLICATE_KEY" => Ok(ErrorCode::DuplicateKey),
            "LOCK_NOT_AVAILABLE" => Ok(ErrorCode::LockNotAvailable),
            "UNEXPECTED_EXCEPTION" => Ok(ErrorCode::UnexpectedException),
            other => anyhow::bail!("unknown error code: {}", other),
        }
    }
}

/// A failed data mutation, as caught by the HTTP layer.
///
/// Immutable once created. The error log persists it as an append-only row.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub raw_message: String,
    pub code: ErrorCode,
    /// The operation that failed (e.g. `"add_employee"`).
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEvent {
    pub fn new(raw_message: impl Into<String>, code: ErrorCode, source: impl Into<String>) -> Self {
        Self {
            raw_message: raw_message.into(),
            code,
            source: source.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A row read back from the error log.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedError {
    pub id: i64,
    pub error_code: String,
    pub error_message: String,
    pub source: String,
    /// ISO 8601 timestamp.
    pub created_at: String,
}

/// Failure class assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    DuplicateData,
    ConnectionIssue,
    LockContention,
    PermissionError,
    QuerySyntax,
    ConstraintViolation,
    ResourceExhaustion,
    Unknown,
}

impl ErrorCategory {
    /// Every category, in declaration order.
    pub const ALL: [ErrorCategory; 8] = [
        ErrorCategory::DuplicateData,
        ErrorCategory::ConnectionIssue,
        ErrorCategory::LockContention,
        ErrorCategory::PermissionError,
        ErrorCategory::QuerySyntax,
        ErrorCategory::ConstraintViolation,
        ErrorCategory::ResourceExhaustion,
        ErrorCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::DuplicateData => "DUPLICATE_DATA",
            ErrorCategory::ConnectionIssue => "CONNECTION_ISSUE",
            ErrorCategory::LockContention => "LOCK_CONTENTION",
            ErrorCategory::PermissionError => "PERMISSION_ERROR",
            ErrorCategory::QuerySyntax => "QUERY_SYNTAX",
            ErrorCategory::ConstraintViolation => "CONSTRAINT_VIOLATION",
            ErrorCategory::ResourceExhaustion => "RESOURCE_EXHAUSTION",
            ErrorCategory::Unknown => "UNKNOWN",
        }
    }

    /// Severity assigned to every error of this category.
    pub fn severity(&self) -> Severity {
        match self {
            ErrorCategory::DuplicateData => Severity::Low,
            ErrorCategory::ConnectionIssue => Severity::High,
            ErrorCategory::LockContention => Severity::Medium,
            ErrorCategory::PermissionError => Severity::High,
            ErrorCategory::QuerySyntax => Severity::Medium,
            ErrorCategory::ConstraintViolation => Severity::Medium,
            ErrorCategory::ResourceExhaustion => Severity::High,
            ErrorCategory::Unknown => Severity::Medium,
        }
    }

    /// Whether errors of this category plausibly permit automated remediation.
    pub fn auto_fixable(&self) -> bool {
        match self {
            ErrorCategory::DuplicateData | ErrorCategory::ConnectionIssue => true,
            ErrorCategory::LockContention
            | ErrorCategory::PermissionError
            | ErrorCategory::QuerySyntax
            | ErrorCategory::ConstraintViolation
            | ErrorCategory::ResourceExhaustion
            | ErrorCategory::Unknown => false,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`classify`](crate::classify::classify). Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub auto_fixable: bool,
}

impl From<ErrorCategory> for Classification {
    fn from(category: ErrorCategory) -> Self {
        Self {
            category,
            severity: category.severity(),
            auto_fixable: category.auto_fixable(),
        }
    }
}

/// Metadata stored alongside each knowledge entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Identifier of the originating error (error log row id, or the
    /// failing operation's name when the log write failed).
    pub source_id: String,
}

/// A past error message held by the similarity index. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub text: String,
    pub metadata: EntryMetadata,
    /// Embedding vector, present when an embedding provider was configured
    /// at the time the entry was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// A stored passage returned by a retrieval call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub text: String,
    pub source_id: String,
    /// Relevance score in `[0.0, 1.0]`.
    pub score: f64,
}

/// Explanation produced once per pipeline run. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCategory::DuplicateData).unwrap();
        assert_eq!(json, "\"DUPLICATE_DATA\"");
        for c in ErrorCategory::ALL {
            let json = serde_json::to_string(&c).unwrap();
            assert_eq!(json, format!("\"{}\"", c.as_str()));
        }
    }

    #[test]
    fn test_error_code_from_str() {
        for code in [
            ErrorCode::DuplicateKey,
            ErrorCode::LockNotAvailable,
            ErrorCode::UnexpectedException,
        ] {
            assert_eq!(code.as_str().parse::<ErrorCode>().unwrap(), code);
        }
        assert!("NOPE".parse::<ErrorCode>().is_err());
    }

    #[test]
    fn test_classification_from_category() {
        let c = Classification::from(ErrorCategory::ResourceExhaustion);
        assert_eq!(c.severity, Severity::High);
        assert!(!c.auto_fixable);
    }
}
