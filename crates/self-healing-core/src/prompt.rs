//! Category-specific instruction templates for the explainer.
//!
//! Each [`ErrorCategory`] has exactly one template. Every template assigns a
//! persona for its failure class, embeds the verbatim error message at the
//! `{error}` placeholder, and lists the five required answer elements
//! ([`REQUIRED_ELEMENTS`]).

use crate::models::ErrorCategory;

/// Placeholder replaced by the raw error message.
const ERROR_PLACEHOLDER: &str = "{error}";

/// Elements every explanation must cover, in the order templates list them.
pub const REQUIRED_ELEMENTS: [&str; 5] = [
    "Root cause",
    "Immediate fix",
    "Prevention",
    "Operational impact",
    "Practical example",
];

pub const DUPLICATE_DATA_PROMPT: &str = r#"You are a senior database engineer who specialises in data integrity and deduplication.

An insert or update was rejected because it would create a duplicate of an existing unique value.

ERROR:
{error}

Respond with exactly these five sections:
1. Root cause: which unique key or index was violated and why the incoming value collided with an existing row.
2. Immediate fix: the concrete steps or SQL to resolve this request (e.g. reuse, update, or reject the existing record).
3. Prevention: application-side checks, upserts, or validation that stop this from recurring.
4. Operational impact: who is affected and whether data is at risk.
5. Practical example: a short SQL or code snippet showing the corrected operation."#;

pub const CONNECTION_ISSUE_PROMPT: &str = r#"You are a site reliability engineer responsible for database connectivity and connection pooling.

The application could not establish or keep a connection to its database.

ERROR:
{error}

Respond with exactly these five sections:
1. Root cause: the most likely reason the connection failed (network, credentials, server state, file path).
2. Immediate fix: what to check and restart to restore connectivity right now.
3. Prevention: health checks, retries with backoff, and pool settings that make this survivable.
4. Operational impact: which requests fail while the database is unreachable.
5. Practical example: a configuration or code snippet that demonstrates a resilient connection setup."#;

pub const LOCK_CONTENTION_PROMPT: &str = r#"You are a database performance specialist focused on concurrency, transactions, and locking.

A statement could not acquire a lock because another transaction held it.

ERROR:
{error}

Respond with exactly these five sections:
1. Root cause: which transaction pattern most likely holds the lock and why this statement waited.
2. Immediate fix: how to identify and release the blocking transaction, and whether to retry this request.
3. Prevention: transaction scoping, lock timeouts, and ordering rules that reduce contention.
4. Operational impact: latency and failed writes users will observe while contention persists.
5. Practical example: a short SQL or code snippet showing a safer transaction or retry."#;

pub const PERMISSION_ERROR_PROMPT: &str = r#"You are a database security administrator who manages roles, grants, and file permissions.

A statement was refused because the current role or process lacks the required privilege.

ERROR:
{error}

Respond with exactly these five sections:
1. Root cause: which privilege is missing and for which object.
2. Immediate fix: the minimal grant or permission change that unblocks this operation safely.
3. Prevention: least-privilege role design and deployment checks that catch this earlier.
4. Operational impact: which features are unavailable until access is restored.
5. Practical example: the exact GRANT statement or permission command to apply."#;

pub const QUERY_SYNTAX_PROMPT: &str = r#"You are an expert SQL reviewer who diagnoses malformed queries and schema mismatches.

A statement failed to parse or referenced a table or column that does not exist.

ERROR:
{error}

Respond with exactly these five sections:
1. Root cause: the syntax mistake or schema mismatch in the failing statement.
2. Immediate fix: the corrected statement.
3. Prevention: parameterised queries, migrations, and tests that keep queries and schema in sync.
4. Operational impact: which endpoints or jobs depend on this statement.
5. Practical example: the corrected SQL next to the failing form."#;

pub const CONSTRAINT_VIOLATION_PROMPT: &str = r#"You are a data modelling expert who designs schemas, constraints, and validation rules.

A write was rejected because it violated a NOT NULL, CHECK, or FOREIGN KEY constraint.

ERROR:
{error}

Respond with exactly these five sections:
1. Root cause: which constraint failed and which input value caused it.
2. Immediate fix: how to correct the payload or the referenced data so the write succeeds.
3. Prevention: request validation and schema design that reject bad input before it reaches the database.
4. Operational impact: whether partial writes or orphaned data are possible.
5. Practical example: a valid payload or SQL statement that satisfies the constraint."#;

pub const RESOURCE_EXHAUSTION_PROMPT: &str = r#"You are a database capacity planner who handles storage, memory, and connection limits.

The database ran out of a finite resource such as disk, memory, or connections.

ERROR:
{error}

Respond with exactly these five sections:
1. Root cause: which resource was exhausted and what likely consumed it.
2. Immediate fix: how to free or extend the resource to restore service now.
3. Prevention: monitoring thresholds, limits, and cleanup jobs that keep headroom.
4. Operational impact: how widely the outage spreads while the resource stays exhausted.
5. Practical example: a command or configuration change that reclaims or raises the limit."#;

pub const UNKNOWN_PROMPT: &str = r#"You are an experienced backend engineer who debugs unfamiliar database failures.

The application hit a database error that does not match any known failure class.

ERROR:
{error}

Respond with exactly these five sections:
1. Root cause: your best diagnosis of what went wrong, stating any assumptions.
2. Immediate fix: the first steps to confirm the diagnosis and restore the operation.
3. Prevention: logging, validation, or tests that would catch this class of failure.
4. Operational impact: the likely blast radius for users and data.
5. Practical example: a short snippet illustrating the fix or the diagnostic query."#;

/// Return the instruction template for a category.
pub fn template_for(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::DuplicateData => DUPLICATE_DATA_PROMPT,
        ErrorCategory::ConnectionIssue => CONNECTION_ISSUE_PROMPT,
        ErrorCategory::LockContention => LOCK_CONTENTION_PROMPT,
        ErrorCategory::PermissionError => PERMISSION_ERROR_PROMPT,
        ErrorCategory::QuerySyntax => QUERY_SYNTAX_PROMPT,
        ErrorCategory::ConstraintViolation => CONSTRAINT_VIOLATION_PROMPT,
        ErrorCategory::ResourceExhaustion => RESOURCE_EXHAUSTION_PROMPT,
        ErrorCategory::Unknown => UNKNOWN_PROMPT,
    }
}

/// Build the explainer prompt for `category` with `message` embedded verbatim.
pub fn build_prompt(category: ErrorCategory, message: &str) -> String {
    template_for(category).replace(ERROR_PLACEHOLDER, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_template_embeds_message_and_elements() {
        let message = "UNIQUE constraint failed: employee.email";
        for category in ErrorCategory::ALL {
            let prompt = build_prompt(category, message);
            assert!(prompt.contains(message), "{} missing message", category);
            assert!(!prompt.contains(ERROR_PLACEHOLDER));
            for element in REQUIRED_ELEMENTS {
                assert!(
                    prompt.contains(element),
                    "{} template missing element '{}'",
                    category,
                    element
                );
            }
        }
    }

    #[test]
    fn test_templates_are_distinct() {
        for (i, a) in ErrorCategory::ALL.iter().enumerate() {
            for b in ErrorCategory::ALL.iter().skip(i + 1) {
                assert_ne!(template_for(*a), template_for(*b));
            }
        }
    }

    #[test]
    fn test_message_with_placeholder_text_is_verbatim() {
        let message = "weird {error} text with {braces}";
        let prompt = build_prompt(ErrorCategory::Unknown, message);
        assert!(prompt.contains(message));
    }

    #[test]
    fn test_multiline_message_verbatim() {
        let message = "duplicate key value violates unique constraint\nDETAIL: Key (email)=(x) already exists.";
        let prompt = build_prompt(ErrorCategory::DuplicateData, message);
        assert!(prompt.contains(message));
    }
}
