//! Read-only query tool over the travel database.

use crate::RegistryError;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::path::Path;
use tokio::sync::Mutex;

/// Keywords that open a read statement. Anything else is rejected before it
/// reaches the database.
const READ_KEYWORDS: [&str; 2] = ["SELECT", "WITH"];

/// SQLite-backed travel data store accepting exactly one read statement per
/// call.
pub struct TravelStore {
    conn: Mutex<Connection>,
}

impl TravelStore {
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        Ok(Self {
            conn: Mutex::new(Connection::open(path)?),
        })
    }

    pub fn open_in_memory() -> Result<Self, RegistryError> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    /// Validate and execute a read query, returning `{"results": [row, ...]}`.
    ///
    /// Only the first `;`-delimited statement is dispatched; trailing
    /// statements are never executed.
    pub async fn query(&self, statement: &str) -> Result<Value, RegistryError> {
        let statement = validate_read_only(statement)?;

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(statement)?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = stmt.query([])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Map::new();
            for (index, name) in column_names.iter().enumerate() {
                record.insert(name.clone(), column_value(row.get_ref(index)?));
            }
            results.push(Value::Object(record));
        }

        tracing::debug!(rows = results.len(), "travel data query executed");
        Ok(json!({ "results": results }))
    }
}

fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::from(v),
        ValueRef::Real(v) => Value::from(v),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

/// Reject anything but a single leading read statement and return it.
fn validate_read_only(statement: &str) -> Result<&str, RegistryError> {
    let trimmed = statement.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::QueryRejected(
            "statement is empty".to_string(),
        ));
    }

    let first = trimmed
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();
    let keyword = first
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    if !READ_KEYWORDS.contains(&keyword.as_str()) {
        return Err(RegistryError::QueryRejected(format!(
            "only read statements are allowed, got '{keyword}'"
        )));
    }

    Ok(first)
}
