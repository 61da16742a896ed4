//! Rule-based error classifier.
//!
//! Maps a raw database error message to a [`Classification`] by testing an
//! ordered list of lower-case substring rules. The first matching rule wins;
//! a message matching no rule is [`ErrorCategory::Unknown`].
//!
//! Rule order is a priority list. A message such as
//! `"permission denied while waiting for lock"` matches both the lock rule and
//! the permission rule and resolves to whichever is listed first
//! ([`ErrorCategory::LockContention`]).

use crate::models::{Classification, ErrorCategory};

/// A single classification rule: any of `patterns` selects `category`.
struct Rule {
    category: ErrorCategory,
    patterns: &'static [&'static str],
}

/// Classification rules in priority order.
const RULES: &[Rule] = &[
    Rule {
        category: ErrorCategory::DuplicateData,
        patterns: &["duplicate key", "unique constraint"],
    },
    Rule {
        category: ErrorCategory::ConnectionIssue,
        patterns: &[
            "connection refused",
            "connection reset",
            "could not connect",
            "connection timed out",
            "server closed the connection",
            "unable to open database",
        ],
    },
    Rule {
        category: ErrorCategory::LockContention,
        patterns: &["lock"],
    },
    Rule {
        category: ErrorCategory::PermissionError,
        patterns: &[
            "permission denied",
            "access denied",
            "not authorized",
            "readonly database",
            "read-only",
        ],
    },
    Rule {
        category: ErrorCategory::QuerySyntax,
        patterns: &[
            "syntax error",
            "no such column",
            "no such table",
            "does not exist",
            "unrecognized token",
        ],
    },
    Rule {
        category: ErrorCategory::ConstraintViolation,
        patterns: &["constraint", "not null", "foreign key", "violates check"],
    },
    Rule {
        category: ErrorCategory::ResourceExhaustion,
        patterns: &[
            "out of memory",
            "disk full",
            "database or disk is full",
            "too many connections",
            "disk i/o",
        ],
    },
];

/// Classify a raw error message. Total: never fails.
pub fn classify(message: &str) -> Classification {
    let lowered = message.to_lowercase();

    RULES
        .iter()
        .find(|rule| rule.patterns.iter().any(|p| lowered.contains(p)))
        .map(|rule| Classification::from(rule.category))
        .unwrap_or_else(|| Classification::from(ErrorCategory::Unknown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    fn triple(message: &str) -> (ErrorCategory, Severity, bool) {
        let c = classify(message);
        (c.category, c.severity, c.auto_fixable)
    }

    #[test]
    fn test_duplicate_key_postgres() {
        assert_eq!(
            triple(
                "duplicate key value violates unique constraint \"employee_email_key\"\n\
                 DETAIL:  Key (email)=(a@b.com) already exists."
            ),
            (ErrorCategory::DuplicateData, Severity::Low, true)
        );
    }

    #[test]
    fn test_duplicate_key_sqlite() {
        assert_eq!(
            triple("error returned from database: UNIQUE constraint failed: employee.email"),
            (ErrorCategory::DuplicateData, Severity::Low, true)
        );
    }

    #[test]
    fn test_lock_contention() {
        assert_eq!(
            triple("Table lock detected: database is locked"),
            (ErrorCategory::LockContention, Severity::Medium, false)
        );
        assert_eq!(
            triple("could not obtain LOCK on relation \"employee\""),
            (ErrorCategory::LockContention, Severity::Medium, false)
        );
    }

    #[test]
    fn test_lock_precedes_permission() {
        assert_eq!(
            classify("permission denied while waiting for lock").category,
            ErrorCategory::LockContention
        );
    }

    #[test]
    fn test_duplicate_precedes_lock() {
        assert_eq!(
            classify("duplicate key while holding lock").category,
            ErrorCategory::DuplicateData
        );
    }

    #[test]
    fn test_connection_issue() {
        assert_eq!(
            triple("could not connect to server: Connection refused"),
            (ErrorCategory::ConnectionIssue, Severity::High, true)
        );
        assert_eq!(
            classify("unable to open database file").category,
            ErrorCategory::ConnectionIssue
        );
    }

    #[test]
    fn test_permission_error() {
        assert_eq!(
            triple("permission denied for table employee"),
            (ErrorCategory::PermissionError, Severity::High, false)
        );
        assert_eq!(
            classify("attempt to write a readonly database").category,
            ErrorCategory::PermissionError
        );
    }

    #[test]
    fn test_query_syntax() {
        assert_eq!(
            triple("near \"SELEC\": syntax error"),
            (ErrorCategory::QuerySyntax, Severity::Medium, false)
        );
        assert_eq!(
            classify("no such table: employees").category,
            ErrorCategory::QuerySyntax
        );
    }

    #[test]
    fn test_constraint_violation() {
        assert_eq!(
            triple("NOT NULL constraint failed: employee.name"),
            (ErrorCategory::ConstraintViolation, Severity::Medium, false)
        );
        assert_eq!(
            classify("FOREIGN KEY constraint failed").category,
            ErrorCategory::ConstraintViolation
        );
    }

    #[test]
    fn test_resource_exhaustion() {
        assert_eq!(
            triple("database or disk is full"),
            (ErrorCategory::ResourceExhaustion, Severity::High, false)
        );
        assert_eq!(
            classify("FATAL: sorry, too many connections for role").category,
            ErrorCategory::ResourceExhaustion
        );
    }

    #[test]
    fn test_unknown_default() {
        assert_eq!(
            triple("something odd happened"),
            (ErrorCategory::Unknown, Severity::Medium, false)
        );
        assert_eq!(
            triple(""),
            (ErrorCategory::Unknown, Severity::Medium, false)
        );
    }

    #[test]
    fn test_total_over_arbitrary_input() {
        for input in ["\u{0}", "ß∂ƒ©", "   ", "LOCK", "Duplicate Key", "💥"] {
            let c = classify(input);
            assert_eq!(c.severity, c.category.severity());
            assert_eq!(c.auto_fixable, c.category.auto_fixable());
        }
    }

    #[test]
    fn test_every_rule_category_is_distinct() {
        let mut seen = Vec::new();
        for rule in RULES {
            assert!(!seen.contains(&rule.category));
            assert!(!rule.patterns.is_empty());
            seen.push(rule.category);
        }
        assert!(!seen.contains(&ErrorCategory::Unknown));
    }
}
