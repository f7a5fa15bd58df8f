//! rusqlite-backed [`NativeEngine`]

use super::functions::{self, decode_cast_error, decode_raise, from_value_ref, to_sql_value, FunctionState};
use super::{NativeColumn, NativeEngine, RowSet};
use crate::cache::PatternCache;
use crate::catalog::quote_native;
use crate::config::DriverConfig;
use crate::error::{CastError, ConstraintKind, DriverError, Result};
use crate::types::Value;
use log::{debug, trace};
use parking_lot::Mutex;
use rusqlite::{ffi, params_from_iter, Connection, ErrorCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct SqliteEngine {
    conn: Connection,
    state: FunctionState,
}

impl SqliteEngine {
    /// Open the file named by `config.path`, or a private in-memory database.
    pub fn open(config: &DriverConfig) -> Result<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;

        let state = FunctionState {
            foreign_key_checks: Arc::new(AtomicBool::new(config.foreign_key_checks)),
            warnings: Arc::new(Mutex::new(Vec::new())),
            patterns: Arc::new(PatternCache::default()),
        };
        functions::register(&conn, &state)?;

        let engine = Self { conn, state };
        // Referential integrity is enforced by generated triggers only
        engine.execute_script("PRAGMA foreign_keys = OFF; PRAGMA recursive_triggers = OFF;")?;
        debug!(
            "opened native database {}",
            config.path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| ":memory:".into())
        );
        Ok(engine)
    }

    pub fn pattern_cache(&self) -> &PatternCache {
        &self.state.patterns
    }

    fn pragma_rows(&self, sql: &str) -> Result<RowSet> {
        self.query_native(sql, &[])
    }
}

impl NativeEngine for SqliteEngine {
    fn execute_native(&self, sql: &str, params: &[Value]) -> Result<usize> {
        trace!("native execute: {}", sql);
        let mut stmt = self.conn.prepare_cached(sql)?;
        let changed = stmt.execute(params_from_iter(params.iter().map(to_sql_value)))?;
        Ok(changed)
    }

    fn query_native(&self, sql: &str, params: &[Value]) -> Result<RowSet> {
        trace!("native query: {}", sql);
        let mut stmt = self.conn.prepare_cached(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut out = RowSet::new(columns);
        let mut rows = stmt.query(params_from_iter(params.iter().map(to_sql_value)))?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(from_value_ref(row.get_ref(i)?));
            }
            out.rows.push(values);
        }
        Ok(out)
    }

    fn execute_script(&self, sql: &str) -> Result<()> {
        trace!("native script: {}", sql);
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    fn schema_version(&self) -> Result<i64> {
        let version = self
            .conn
            .query_row("PRAGMA main.schema_version", [], |row| row.get::<_, i64>(0))?;
        Ok(version)
    }

    fn table_columns(&self, schema: &str, table: &str) -> Result<Vec<NativeColumn>> {
        let rows = self.pragma_rows(&format!(
            "PRAGMA {}.table_info({})",
            quote_native(schema),
            quote_native(table)
        ))?;
        // cid, name, type, notnull, dflt_value, pk
        Ok(rows
            .rows
            .iter()
            .map(|r| NativeColumn {
                name: r.get(1).and_then(Value::to_text).unwrap_or_default(),
                declared_type: r.get(2).and_then(Value::to_text).unwrap_or_default(),
                not_null: r.get(3).and_then(Value::truthy).unwrap_or(false),
                primary_key: r.get(5).and_then(Value::truthy).unwrap_or(false),
            })
            .collect())
    }

    fn index_names(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let rows = self.pragma_rows(&format!(
            "PRAGMA {}.index_list({})",
            quote_native(schema),
            quote_native(table)
        ))?;
        // seq, name, unique, origin, partial
        Ok(rows
            .rows
            .iter()
            .filter_map(|r| r.get(1).and_then(Value::to_text))
            .collect())
    }

    fn table_exists(&self, schema: &str, table: &str) -> Result<bool> {
        let master = if schema.eq_ignore_ascii_case("temp") {
            "sqlite_temp_master"
        } else {
            "sqlite_master"
        };
        let rows = self.query_native(
            &format!("SELECT 1 FROM {} WHERE type = 'table' AND name = ?1 COLLATE NOCASE", master),
            &[Value::text(table)],
        )?;
        Ok(!rows.is_empty())
    }

    fn set_foreign_key_checks(&self, enabled: bool) -> Result<()> {
        self.state.foreign_key_checks.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    fn take_cast_warnings(&self) -> Vec<CastError> {
        std::mem::take(&mut *self.state.warnings.lock())
    }
}

/// Text after `"<prefix>: "` in a native constraint message.
fn detail<'a>(message: &'a str, prefix: &str) -> &'a str {
    message
        .find(prefix)
        .map(|i| message[i + prefix.len()..].trim_start_matches(':').trim())
        .unwrap_or("")
}

/// Column names from `"UNIQUE constraint failed: t.a, t.b"`.
pub(crate) fn unique_columns(message: &str) -> Vec<String> {
    detail(message, "constraint failed")
        .split(',')
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(|c| c.rsplit('.').next().unwrap_or(c).to_string())
        .collect()
}

fn translate_constraint(extended: i32, message: String) -> DriverError {
    match extended {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => DriverError::Constraint {
            kind: ConstraintKind::Unique,
            code: 1062,
            message,
        },
        ffi::SQLITE_CONSTRAINT_NOTNULL => {
            let column = unique_columns(&message).into_iter().next().unwrap_or_default();
            DriverError::Cast(CastError::NotNull { column })
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => DriverError::Constraint {
            kind: ConstraintKind::ForeignKey,
            code: 1452,
            message: "Cannot add or update a child row: a foreign key constraint fails".into(),
        },
        ffi::SQLITE_CONSTRAINT_CHECK => {
            let name = detail(&message, "constraint failed").to_string();
            DriverError::Constraint {
                kind: ConstraintKind::Check,
                code: 3819,
                message: format!("Check constraint '{}' is violated.", name),
            }
        }
        _ => DriverError::native(extended, message),
    }
}

impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, msg) => {
                let message = msg.unwrap_or_else(|| e.to_string());
                if let Some(cast) = decode_cast_error(&message) {
                    return DriverError::Cast(cast);
                }
                if let Some((code, text)) = decode_raise(&message) {
                    let kind = match code {
                        1451 | 1452 => ConstraintKind::ForeignKey,
                        3819 => ConstraintKind::Check,
                        _ => ConstraintKind::Unique,
                    };
                    return DriverError::Constraint {
                        kind,
                        code,
                        message: text,
                    };
                }
                match e.code {
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => DriverError::Busy(message),
                    ErrorCode::ConstraintViolation => translate_constraint(e.extended_code, message),
                    _ => DriverError::native(e.extended_code, message),
                }
            }
            rusqlite::Error::UserFunctionError(inner) => {
                let message = inner.to_string();
                match decode_cast_error(&message) {
                    Some(cast) => DriverError::Cast(cast),
                    None => DriverError::native(ffi::SQLITE_ERROR, message),
                }
            }
            other => DriverError::native(-1, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::ColumnTarget;
    use crate::error::ErrorCategory;
    use crate::session::SqlMode;
    use crate::types::DataType;

    fn engine() -> SqliteEngine {
        SqliteEngine::open(&DriverConfig::in_memory("app")).unwrap()
    }

    fn target_json(name: &str, ty: DataType, nullable: bool) -> String {
        serde_json::to_string(&ColumnTarget {
            name: name.into(),
            data_type: ty,
            nullable,
        })
        .unwrap()
    }

    #[test]
    fn test_query_roundtrip_values() {
        let e = engine();
        e.execute_script("CREATE TABLE t(a INTEGER, b TEXT, c REAL, d BLOB)").unwrap();
        let n = e
            .execute_native(
                "INSERT INTO t VALUES (?1, ?2, ?3, ?4)",
                &[Value::Integer(1), Value::text("x"), Value::Float(1.5), Value::Bytes(vec![1, 2])],
            )
            .unwrap();
        assert_eq!(n, 1);
        let rows = e.query_native("SELECT a, b, c, d FROM t", &[]).unwrap();
        assert_eq!(rows.columns, vec!["a", "b", "c", "d"]);
        assert_eq!(
            rows.rows[0],
            vec![Value::Integer(1), Value::text("x"), Value::Float(1.5), Value::Bytes(vec![1, 2])]
        );
    }

    #[test]
    fn test_unique_violation_translated() {
        let e = engine();
        e.execute_script("CREATE TABLE t(a INTEGER UNIQUE)").unwrap();
        e.execute_native("INSERT INTO t VALUES (1)", &[]).unwrap();
        let err = e.execute_native("INSERT INTO t VALUES (1)", &[]).unwrap_err();
        assert_eq!(err.code(), 1062);
        assert_eq!(err.category(), ErrorCategory::IntegrityViolation);
        if let DriverError::Constraint { message, .. } = &err {
            assert_eq!(unique_columns(message), vec!["a"]);
        } else {
            panic!("unexpected error {:?}", err);
        }
    }

    #[test]
    fn test_check_violation_names_constraint() {
        let e = engine();
        e.execute_script("CREATE TABLE t(a INTEGER, CONSTRAINT t_chk_1 CHECK (a > 0))").unwrap();
        let err = e.execute_native("INSERT INTO t VALUES (0)", &[]).unwrap_err();
        assert_eq!(err.code(), 3819);
        assert_eq!(err.to_string(), "Check constraint 't_chk_1' is violated.");
    }

    #[test]
    fn test_cast_function_errors_surface_as_cast_errors() {
        let e = engine();
        let strict = SqlMode::parse(crate::config::DEFAULT_SQL_MODE).unwrap();
        let target = target_json("n", DataType::from_parts("TINYINT", &[], Vec::new()).unwrap(), true);
        let err = e
            .query_native(
                "SELECT _mysqlite_cast(?1, ?2, ?3, 1)",
                &[Value::Integer(1000), Value::text(target.clone()), Value::Integer(strict.bits())],
            )
            .unwrap_err();
        assert_eq!(err.code(), 1264);
        assert_eq!(err.to_string(), "Out of range value for column 'n' at row 1");

        let relaxed = SqlMode::default();
        let rows = e
            .query_native(
                "SELECT _mysqlite_cast(?1, ?2, ?3, 1)",
                &[Value::Integer(1000), Value::text(target), Value::Integer(relaxed.bits())],
            )
            .unwrap();
        assert_eq!(rows.scalar(), Some(&Value::Integer(127)));
        assert_eq!(e.take_cast_warnings().len(), 1);
        assert!(e.take_cast_warnings().is_empty());
    }

    #[test]
    fn test_raised_constraint_decoded() {
        let e = engine();
        let message = functions::raise_message(1452, "Cannot add or update a child row");
        e.execute_script(&format!(
            "CREATE TABLE t(a INTEGER); CREATE TRIGGER t_guard BEFORE INSERT ON t BEGIN SELECT RAISE(ABORT, '{}'); END;",
            message
        ))
        .unwrap();
        let err = e.execute_native("INSERT INTO t VALUES (1)", &[]).unwrap_err();
        assert_eq!(err.code(), 1452);
        assert_eq!(err.to_string(), "Cannot add or update a child row");
    }

    #[test]
    fn test_regexp_and_like_functions() {
        let e = engine();
        let rows = e
            .query_native(
                "SELECT 'Hello' REGEXP '^h', _mysqlite_regexp_bin('^h', 'Hello'), _mysqlite_like('abc%', 'abc\\%', '\\', 1), _mysqlite_like('abcd', 'abc\\%', '\\', 1)",
                &[],
            )
            .unwrap();
        assert_eq!(
            rows.rows[0],
            vec![Value::Integer(1), Value::Integer(0), Value::Integer(1), Value::Integer(0)]
        );
    }

    #[test]
    fn test_schema_pragmas() {
        let e = engine();
        let before = e.schema_version().unwrap();
        e.execute_script("CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT NOT NULL); CREATE INDEX t__name ON t(name);")
            .unwrap();
        assert!(e.schema_version().unwrap() > before);
        let cols = e.table_columns("main", "t").unwrap();
        assert_eq!(cols.len(), 2);
        assert!(cols[0].primary_key);
        assert!(cols[1].not_null);
        assert_eq!(e.index_names("main", "t").unwrap(), vec!["t__name"]);
        assert!(e.table_exists("main", "T").unwrap());
        assert!(!e.table_exists("temp", "t").unwrap());
    }

    #[test]
    fn test_savepoints() {
        let e = engine();
        e.execute_script("CREATE TABLE t(a INTEGER)").unwrap();
        e.begin().unwrap();
        e.execute_native("INSERT INTO t VALUES (1)", &[]).unwrap();
        e.savepoint("sp 1").unwrap();
        e.execute_native("INSERT INTO t VALUES (2)", &[]).unwrap();
        e.rollback_to("sp 1").unwrap();
        e.release("sp 1").unwrap();
        e.commit().unwrap();
        let rows = e.query_native("SELECT count(*) FROM t", &[]).unwrap();
        assert_eq!(rows.scalar(), Some(&Value::Integer(1)));
    }
}
