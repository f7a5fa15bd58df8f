//! Per-connection session state
//!
//! Everything a statement may read or change about "the connection" lives in
//! one explicit [`Session`] value owned by the driver.

mod sql_mode;
mod transaction;

pub use sql_mode::SqlMode;
pub use transaction::{TransactionState, TxAction};

use crate::config::DriverConfig;
use crate::error::{CastError, DriverError, Result};
use crate::formatter::ColumnMeta;
use crate::sql::LexerOptions;
use crate::types::Value;
use ahash::AHashMap;

/// How a system variable's value is validated and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarKind {
    /// ON/OFF, reported as 1/0 by `@@name`
    Bool,
    Integer,
    Text,
    ReadOnly,
}

struct VarSpec {
    name: &'static str,
    kind: VarKind,
    default: fn(&DriverConfig) -> String,
}

macro_rules! var {
    ($name:literal, $kind:ident, $value:literal) => {
        VarSpec {
            name: $name,
            kind: VarKind::$kind,
            default: |_| $value.to_string(),
        }
    };
    ($name:literal, $kind:ident, |$c:ident| $value:expr) => {
        VarSpec {
            name: $name,
            kind: VarKind::$kind,
            default: |$c| $value,
        }
    };
}

/// Known system variables, sorted by name.
static SYSTEM_VARIABLES: &[VarSpec] = &[
    var!("auto_increment_increment", ReadOnly, "1"),
    var!("auto_increment_offset", ReadOnly, "1"),
    var!("autocommit", Bool, "1"),
    var!("big_tables", Bool, "0"),
    var!("character_set_client", Text, |c| c.default_charset.clone()),
    var!("character_set_connection", Text, |c| c.default_charset.clone()),
    var!("character_set_database", Text, |c| c.default_charset.clone()),
    var!("character_set_results", Text, |c| c.default_charset.clone()),
    var!("character_set_server", Text, |c| c.default_charset.clone()),
    var!("character_set_system", ReadOnly, "utf8mb3"),
    var!("collation_connection", Text, |c| c.default_collation.clone()),
    var!("collation_database", Text, |c| c.default_collation.clone()),
    var!("collation_server", Text, |c| c.default_collation.clone()),
    var!("default_storage_engine", Text, "InnoDB"),
    var!("default_week_format", Integer, "0"),
    var!("div_precision_increment", Integer, "4"),
    var!("explicit_defaults_for_timestamp", Bool, "1"),
    var!("foreign_key_checks", Bool, |c| bool_text(c.foreign_key_checks)),
    var!("group_concat_max_len", Integer, "1024"),
    var!("have_ssl", ReadOnly, "DISABLED"),
    var!("hostname", ReadOnly, "localhost"),
    var!("init_connect", Text, ""),
    var!("innodb_strict_mode", Bool, "1"),
    var!("interactive_timeout", Integer, "28800"),
    var!("license", ReadOnly, "GPL"),
    var!("lock_wait_timeout", Integer, |c| (c.busy_timeout_ms / 1000).max(1).to_string()),
    var!("lower_case_table_names", ReadOnly, "2"),
    var!("max_allowed_packet", Integer, "67108864"),
    var!("max_connections", ReadOnly, "1"),
    var!("net_buffer_length", Integer, "16384"),
    var!("net_read_timeout", Integer, "30"),
    var!("net_write_timeout", Integer, "60"),
    var!("performance_schema", ReadOnly, "0"),
    var!("port", ReadOnly, "0"),
    var!("query_cache_size", ReadOnly, "0"),
    var!("query_cache_type", ReadOnly, "OFF"),
    var!("sql_auto_is_null", Bool, "0"),
    var!("sql_mode", Text, |c| c.sql_mode.clone()),
    var!("sql_notes", Bool, "1"),
    var!("sql_quote_show_create", Bool, "1"),
    var!("sql_safe_updates", Bool, "0"),
    var!("sql_select_limit", Integer, "18446744073709551615"),
    var!("sql_warnings", Bool, "0"),
    var!("storage_engine", Text, "InnoDB"),
    var!("system_time_zone", ReadOnly, "UTC"),
    var!("time_zone", Text, "+00:00"),
    var!("transaction_isolation", Text, "REPEATABLE-READ"),
    var!("transaction_read_only", Bool, "0"),
    var!("tx_isolation", Text, "REPEATABLE-READ"),
    var!("tx_read_only", Bool, "0"),
    var!("unique_checks", Bool, "1"),
    var!("version", ReadOnly, |c| c.server_version.clone()),
    var!("version_comment", ReadOnly, "mysqlite"),
    var!("version_compile_machine", ReadOnly, "x86_64"),
    var!("version_compile_os", ReadOnly, "Linux"),
    var!("wait_timeout", Integer, "28800"),
];

fn bool_text(b: bool) -> String {
    if b { "1" } else { "0" }.to_string()
}

fn spec(name: &str) -> Option<&'static VarSpec> {
    SYSTEM_VARIABLES
        .binary_search_by(|v| v.name.cmp(name))
        .ok()
        .map(|i| &SYSTEM_VARIABLES[i])
}

/// Session state a `SET` changed that the driver must act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    Autocommit(bool),
    ForeignKeyChecks(bool),
    SqlMode,
    None,
}

/// One `SHOW WARNINGS` row.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub level: &'static str,
    pub code: u16,
    pub message: String,
}

impl From<&CastError> for Warning {
    fn from(err: &CastError) -> Self {
        Warning {
            level: "Warning",
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Connection-scoped state.
#[derive(Debug)]
pub struct Session {
    pub connection_id: u64,
    pub current_database: Option<String>,
    pub sql_mode: SqlMode,
    pub autocommit: bool,
    pub foreign_key_checks: bool,
    pub transaction: TransactionState,
    /// `LAST_INSERT_ID()`: first generated id of the last insert that made one
    pub last_insert_id: u64,
    /// `ROW_COUNT()`: affected rows, -1 after a result set
    pub last_row_count: i64,
    /// `FOUND_ROWS()`
    pub found_rows: u64,
    pub last_columns: Vec<ColumnMeta>,
    pub warnings: Vec<Warning>,
    user_variables: AHashMap<String, Value>,
    /// Session overrides of system variables (canonical text)
    overrides: AHashMap<String, String>,
    defaults: DriverConfig,
}

impl Session {
    pub fn new(config: &DriverConfig, connection_id: u64) -> Result<Self> {
        Ok(Self {
            connection_id,
            current_database: Some(config.database.clone()),
            sql_mode: SqlMode::parse(&config.sql_mode)?,
            autocommit: true,
            foreign_key_checks: config.foreign_key_checks,
            transaction: TransactionState::Idle,
            last_insert_id: 0,
            last_row_count: -1,
            found_rows: 0,
            last_columns: Vec::new(),
            warnings: Vec::new(),
            user_variables: AHashMap::new(),
            overrides: AHashMap::new(),
            defaults: config.clone(),
        })
    }

    pub fn lexer_options(&self) -> LexerOptions {
        LexerOptions {
            no_backslash_escapes: self.sql_mode.no_backslash_escapes,
            server_version: self.defaults.version_number(),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.defaults
    }

    /// `@name`; unset variables read as NULL.
    pub fn user_variable(&self, name: &str) -> Value {
        self.user_variables
            .get(&name.to_ascii_lowercase())
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn set_user_variable(&mut self, name: &str, value: Value) {
        self.user_variables.insert(name.to_ascii_lowercase(), value);
    }

    /// `@@name`, typed the way the server reports it.
    pub fn system_variable(&self, name: &str) -> Result<Value> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "last_insert_id" | "identity" => return Ok(Value::Unsigned(self.last_insert_id)),
            "warning_count" => return Ok(Value::Integer(self.warnings.len() as i64)),
            "error_count" => return Ok(Value::Integer(0)),
            "pseudo_thread_id" => return Ok(Value::Unsigned(self.connection_id)),
            _ => {}
        }
        let spec = spec(&lower).ok_or_else(|| DriverError::UnknownVariable(name.to_string()))?;
        let text = self.variable_text(spec);
        Ok(match spec.kind {
            VarKind::Bool => Value::Integer(text.parse().unwrap_or(0)),
            VarKind::Integer => match text.parse::<i64>() {
                Ok(i) => Value::Integer(i),
                Err(_) => text.parse::<u64>().map(Value::Unsigned).unwrap_or(Value::Text(text)),
            },
            VarKind::Text | VarKind::ReadOnly => Value::Text(text),
        })
    }

    fn variable_text(&self, spec: &'static VarSpec) -> String {
        match spec.name {
            "autocommit" => bool_text(self.autocommit),
            "foreign_key_checks" => bool_text(self.foreign_key_checks),
            "sql_mode" => self.sql_mode.to_string(),
            name => self
                .overrides
                .get(name)
                .cloned()
                .unwrap_or_else(|| (spec.default)(&self.defaults)),
        }
    }

    /// `SET [SESSION|GLOBAL] name = value`. There is one connection, so both
    /// scopes land on the session.
    pub fn set_system_variable(&mut self, name: &str, value: &Value) -> Result<SessionChange> {
        let lower = name.to_ascii_lowercase();
        let spec = spec(&lower).ok_or_else(|| DriverError::UnknownVariable(name.to_string()))?;
        let wrong = || DriverError::WrongVariableValue {
            name: spec.name.to_string(),
            value: value.to_text().unwrap_or_else(|| "NULL".into()),
        };

        match spec.kind {
            VarKind::ReadOnly => Err(DriverError::ReadOnlyVariable(spec.name.to_string())),
            VarKind::Bool => {
                let on = parse_switch(value).ok_or_else(wrong)?;
                match spec.name {
                    "autocommit" => {
                        self.autocommit = on;
                        Ok(SessionChange::Autocommit(on))
                    }
                    "foreign_key_checks" => {
                        self.foreign_key_checks = on;
                        Ok(SessionChange::ForeignKeyChecks(on))
                    }
                    name => {
                        self.overrides.insert(name.to_string(), bool_text(on));
                        Ok(SessionChange::None)
                    }
                }
            }
            VarKind::Integer => {
                let text = value.to_text().ok_or_else(wrong)?;
                let trimmed = text.trim();
                if trimmed.parse::<i64>().is_err() && trimmed.parse::<u64>().is_err() {
                    return Err(wrong());
                }
                self.overrides.insert(spec.name.to_string(), trimmed.to_string());
                Ok(SessionChange::None)
            }
            VarKind::Text => {
                if spec.name == "sql_mode" {
                    let text = match value {
                        Value::Null => return Err(wrong()),
                        v => v.to_text().unwrap_or_default(),
                    };
                    self.sql_mode = SqlMode::parse(&text)?;
                    return Ok(SessionChange::SqlMode);
                }
                let text = value.to_text().ok_or_else(wrong)?;
                self.overrides.insert(spec.name.to_string(), text);
                Ok(SessionChange::None)
            }
        }
    }

    /// `SET name = DEFAULT`
    pub fn reset_system_variable(&mut self, name: &str) -> Result<SessionChange> {
        let lower = name.to_ascii_lowercase();
        let spec = spec(&lower).ok_or_else(|| DriverError::UnknownVariable(name.to_string()))?;
        let default = Value::Text((spec.default)(&self.defaults));
        self.overrides.remove(spec.name);
        self.set_system_variable(spec.name, &default)
    }

    /// `SET NAMES charset [COLLATE collation]`
    pub fn set_names(&mut self, charset: &str, collation: Option<&str>) {
        let charset = charset.to_ascii_lowercase();
        for var in ["character_set_client", "character_set_connection", "character_set_results"] {
            self.overrides.insert(var.to_string(), charset.clone());
        }
        let collation = collation
            .map(|c| c.to_ascii_lowercase())
            .unwrap_or_else(|| crate::catalog::default_collation(&charset));
        self.overrides.insert("collation_connection".to_string(), collation);
    }

    /// Every variable as `SHOW VARIABLES` lists it.
    pub fn variables(&self) -> Vec<(String, String)> {
        SYSTEM_VARIABLES
            .iter()
            .map(|spec| {
                let text = self.variable_text(spec);
                let shown = if spec.kind == VarKind::Bool {
                    if text == "1" { "ON" } else { "OFF" }.to_string()
                } else {
                    text
                };
                (spec.name.to_string(), shown)
            })
            .collect()
    }

    /// Reset per-statement diagnostics before a new statement runs.
    pub fn begin_statement(&mut self) {
        self.warnings.clear();
    }
}

fn parse_switch(value: &Value) -> Option<bool> {
    match value {
        Value::Integer(0) => Some(false),
        Value::Integer(1) => Some(true),
        Value::Unsigned(0) => Some(false),
        Value::Unsigned(1) => Some(true),
        Value::Text(s) => match s.to_ascii_uppercase().as_str() {
            "ON" | "TRUE" | "1" => Some(true),
            "OFF" | "FALSE" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(&DriverConfig::default(), 1).unwrap()
    }

    #[test]
    fn test_variable_table_sorted() {
        for pair in SYSTEM_VARIABLES.windows(2) {
            assert!(pair[0].name < pair[1].name, "{} >= {}", pair[0].name, pair[1].name);
        }
    }

    #[test]
    fn test_system_variable_defaults() {
        let s = session();
        assert_eq!(s.system_variable("autocommit").unwrap(), Value::Integer(1));
        assert_eq!(s.system_variable("VERSION").unwrap(), Value::text("8.0.38"));
        assert_eq!(
            s.system_variable("max_allowed_packet").unwrap(),
            Value::Integer(67_108_864)
        );
        assert!(matches!(
            s.system_variable("no_such_thing"),
            Err(DriverError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_set_switches() {
        let mut s = session();
        assert_eq!(
            s.set_system_variable("autocommit", &Value::text("OFF")).unwrap(),
            SessionChange::Autocommit(false)
        );
        assert!(!s.autocommit);
        assert_eq!(
            s.set_system_variable("FOREIGN_KEY_CHECKS", &Value::Integer(0)).unwrap(),
            SessionChange::ForeignKeyChecks(false)
        );
        assert!(s.set_system_variable("autocommit", &Value::Integer(2)).is_err());
        assert!(matches!(
            s.set_system_variable("version", &Value::text("9")),
            Err(DriverError::ReadOnlyVariable(_))
        ));
    }

    #[test]
    fn test_set_sql_mode() {
        let mut s = session();
        s.set_system_variable("sql_mode", &Value::text("NO_BACKSLASH_ESCAPES"))
            .unwrap();
        assert!(s.sql_mode.no_backslash_escapes);
        assert!(!s.sql_mode.is_strict());
        assert!(s.lexer_options().no_backslash_escapes);

        s.reset_system_variable("sql_mode").unwrap();
        assert!(s.sql_mode.is_strict());
    }

    #[test]
    fn test_user_variables_case_insensitive() {
        let mut s = session();
        assert_eq!(s.user_variable("x"), Value::Null);
        s.set_user_variable("Total", Value::Integer(3));
        assert_eq!(s.user_variable("TOTAL"), Value::Integer(3));
    }

    #[test]
    fn test_show_variables_reports_switches() {
        let mut s = session();
        s.set_system_variable("wait_timeout", &Value::Integer(10)).unwrap();
        let vars = s.variables();
        let get = |n: &str| vars.iter().find(|(k, _)| k == n).map(|(_, v)| v.clone());
        assert_eq!(get("autocommit").as_deref(), Some("ON"));
        assert_eq!(get("wait_timeout").as_deref(), Some("10"));
    }

    #[test]
    fn test_set_names() {
        let mut s = session();
        s.set_names("latin1", None);
        assert_eq!(
            s.system_variable("character_set_client").unwrap(),
            Value::text("latin1")
        );
        assert_eq!(
            s.system_variable("collation_connection").unwrap(),
            Value::text("latin1_swedish_ci")
        );
    }
}
