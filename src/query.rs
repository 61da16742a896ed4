//! Read-only SQL queries over the service database.
//!
//! [`validate_read_only`] admits a single `SELECT` statement with no
//! data- or schema-changing keyword anywhere in it. Rows come back as JSON
//! objects keyed by column name.

use base64::Engine;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use thiserror::Error;

const DENYLIST: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "REPLACE", "ATTACH",
    "DETACH", "PRAGMA", "VACUUM", "REINDEX", "GRANT", "REVOKE",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryRejection {
    #[error("query is empty")]
    Empty,
    #[error("only SELECT queries are allowed")]
    NotSelect,
    #[error("forbidden keyword in query: {0}")]
    ForbiddenKeyword(String),
    #[error("multiple statements are not allowed")]
    MultipleStatements,
}

/// Words of `sql`, split on anything that cannot appear in an identifier.
fn words(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
}

/// Check that `sql` is a single read-only statement. Returns it trimmed.
pub fn validate_read_only(sql: &str) -> Result<&str, QueryRejection> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(QueryRejection::Empty);
    }

    let starts_with_select = trimmed
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("SELECT"))
        && !trimmed[6..].starts_with(|c: char| c.is_alphanumeric() || c == '_');
    if !starts_with_select {
        return Err(QueryRejection::NotSelect);
    }

    if let Some(pos) = trimmed.find(';') {
        if !trimmed[pos + 1..].trim().is_empty() {
            return Err(QueryRejection::MultipleStatements);
        }
    }

    for word in words(trimmed) {
        if let Some(kw) = DENYLIST.iter().find(|kw| word.eq_ignore_ascii_case(kw)) {
            return Err(QueryRejection::ForbiddenKeyword(kw.to_string()));
        }
    }

    Ok(trimmed)
}

/// Run a validated statement and return each row as a JSON object.
pub async fn run_read_only(pool: &SqlitePool, sql: &str) -> sqlx::Result<Vec<Map<String, Value>>> {
    let rows = sqlx::query(sql).fetch_all(pool).await?;
    rows.iter().map(row_to_json).collect()
}

fn row_to_json(row: &SqliteRow) -> sqlx::Result<Map<String, Value>> {
    let mut map = Map::new();

    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => Value::from(row.try_get_unchecked::<i64, _>(i)?),
                "REAL" => serde_json::Number::from_f64(row.try_get_unchecked::<f64, _>(i)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "BLOB" => Value::String(
                    base64::engine::general_purpose::STANDARD
                        .encode(row.try_get_unchecked::<Vec<u8>, _>(i)?),
                ),
                _ => Value::String(row.try_get_unchecked::<String, _>(i)?),
            }
        };
        map.insert(column.name().to_string(), value);
    }

    Ok(map)
}
