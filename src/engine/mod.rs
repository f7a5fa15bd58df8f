//! Storage boundary
//!
//! The driver talks to the embedded engine only through [`NativeEngine`]:
//! run a statement, fetch rows, control transactions, and read the schema
//! pragmas used for catalog validation.

mod functions;
mod sqlite;

pub use functions::{date_add, date_format, decode_cast_error, encode_cast_error, raise_message};
pub(crate) use sqlite::unique_columns;
pub use sqlite::SqliteEngine;

use crate::catalog::quote_native;
use crate::error::Result;
use crate::types::Value;

/// Rows fetched from the engine, columns in native order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row, if any.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|r| r.first())
    }
}

/// One column as the native schema pragma reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeColumn {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

pub trait NativeEngine {
    /// Run one statement; returns the number of rows it changed.
    fn execute_native(&self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Run one query and fetch all rows.
    fn query_native(&self, sql: &str, params: &[Value]) -> Result<RowSet>;

    /// Run several parameterless statements.
    fn execute_script(&self, sql: &str) -> Result<()>;

    fn last_insert_rowid(&self) -> i64;

    /// Native `schema_version`; changes whenever any connection alters the schema.
    fn schema_version(&self) -> Result<i64>;

    /// Column list of a native table, for catalog validation.
    fn table_columns(&self, schema: &str, table: &str) -> Result<Vec<NativeColumn>>;

    /// Index names of a native table, for catalog validation.
    fn index_names(&self, schema: &str, table: &str) -> Result<Vec<String>>;

    /// Whether a native table exists.
    fn table_exists(&self, schema: &str, table: &str) -> Result<bool>;

    /// Toggle the switch read by the triggers that enforce foreign keys.
    fn set_foreign_key_checks(&self, enabled: bool) -> Result<()>;

    /// Cast problems reported by engine-side conversions since the last call.
    fn take_cast_warnings(&self) -> Vec<crate::error::CastError>;

    fn begin(&self) -> Result<()> {
        self.execute_script("BEGIN")
    }

    fn commit(&self) -> Result<()> {
        self.execute_script("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.execute_script("ROLLBACK")
    }

    fn savepoint(&self, name: &str) -> Result<()> {
        self.execute_script(&format!("SAVEPOINT {}", quote_native(name)))
    }

    fn release(&self, name: &str) -> Result<()> {
        self.execute_script(&format!("RELEASE SAVEPOINT {}", quote_native(name)))
    }

    fn rollback_to(&self, name: &str) -> Result<()> {
        self.execute_script(&format!("ROLLBACK TO SAVEPOINT {}", quote_native(name)))
    }
}
