//! Employee records: the demo table the service mutates.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::error::MutationError;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub department: String,
}

/// Body of `POST /add-employee`. Fields are optional here so that a missing
/// field is reported as a validation error rather than a JSON rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEmployee {
    pub name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
}

/// A [`NewEmployee`] whose required fields are all present and non-blank.
#[derive(Debug, Clone)]
pub struct ValidEmployee {
    pub name: String,
    pub email: String,
    pub department: String,
}

impl NewEmployee {
    pub fn validate(self) -> Result<ValidEmployee, String> {
        fn required(value: Option<String>, field: &str) -> Result<String, String> {
            match value {
                Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
                _ => Err(format!("'{}' is required", field)),
            }
        }

        Ok(ValidEmployee {
            name: required(self.name, "name")?,
            email: required(self.email, "email")?,
            department: required(self.department, "department")?,
        })
    }
}

pub async fn list_employees(pool: &SqlitePool) -> sqlx::Result<Vec<Employee>> {
    sqlx::query_as::<_, Employee>("SELECT id, name, email, department FROM employee ORDER BY id")
        .fetch_all(pool)
        .await
}

/// Insert one employee, returning the new row id.
pub async fn add_employee(pool: &SqlitePool, e: &ValidEmployee) -> Result<i64, MutationError> {
    let result = sqlx::query("INSERT INTO employee (name, email, department) VALUES (?, ?, ?)")
        .bind(&e.name)
        .bind(&e.email)
        .bind(&e.department)
        .execute(pool)
        .await?;

    Ok(result.last_insert_rowid())
}

pub async fn count_employees(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM employee")
        .fetch_one(pool)
        .await
}
