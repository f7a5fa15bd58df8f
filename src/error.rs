//! Error types for the mysqlite driver
//!
//! Every error carries the MySQL error number and SQLSTATE the emulated server
//! would report, plus a coarse [`ErrorCategory`] so callers can branch without
//! matching on message text.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DriverError>;

/// Coarse status category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed statement (SQLSTATE class 42000)
    Syntax,
    /// Unknown database or table (42S02, 42000)
    ObjectNotFound,
    /// Unknown column (42S22)
    ColumnNotFound,
    /// Duplicate table, column, index or constraint (42S01, 42S21)
    AlreadyExists,
    /// Permission problem (42000 / access violation)
    AccessViolation,
    /// NOT NULL, UNIQUE, CHECK or FOREIGN KEY failure (23000)
    IntegrityViolation,
    /// Value could not be coerced (22xxx)
    DataException,
    /// Engine busy/locked; the caller may retry
    LockContention,
    /// Transaction or savepoint state problem
    Transaction,
    /// Statement shape the driver does not emulate
    NotSupported,
    /// Anything else
    General,
}

/// Failures while turning text into a statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("You have an error in your SQL syntax; {message} at line {line} column {column}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Identifier '{0}' contains non-ASCII characters, which are not supported")]
    NonAsciiIdentifier(String),

    #[error("Multiple statements in a single query are not supported")]
    MultipleStatements,

    #[error("Query was empty")]
    Empty,

    #[error("This version of MySQL doesn't yet support '{0}'")]
    Unsupported(String),
}

impl ParseError {
    pub fn syntax(message: impl Into<String>, line: usize, column: usize) -> Self {
        ParseError::Syntax {
            message: message.into(),
            line,
            column,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            ParseError::Empty => 1065,
            ParseError::Unsupported(_) => 1235,
            _ => 1064,
        }
    }
}

/// Schema catalog violations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Unknown database '{0}'")]
    UnknownDatabase(String),

    #[error("Can't create database '{0}'; database exists")]
    DatabaseExists(String),

    #[error("No database selected")]
    NoDatabaseSelected,

    #[error("Table '{database}.{table}' doesn't exist")]
    NoSuchTable { database: String, table: String },

    #[error("Unknown table '{database}.{table}'")]
    UnknownTable { database: String, table: String },

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Not unique table/alias: '{0}'")]
    NotUniqueAlias(String),

    #[error("Unknown column '{column}' in '{context}'")]
    NoSuchColumn { column: String, context: String },

    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("Column '{column}' in {clause} is ambiguous")]
    AmbiguousColumn { column: String, clause: String },

    #[error("Duplicate key name '{0}'")]
    DuplicateKeyName(String),

    #[error("Multiple primary key defined")]
    MultiplePrimaryKey,

    #[error("Can't DROP '{0}'; check that column/key exists")]
    CantDrop(String),

    #[error("Key '{key}' doesn't exist in table '{table}'")]
    NoSuchKey { key: String, table: String },

    #[error("Key column '{0}' doesn't exist in table")]
    KeyColumnMissing(String),

    #[error("Duplicate {kind} constraint name '{name}'")]
    DuplicateConstraint { kind: &'static str, name: String },

    #[error("Table has multiple constraints with the name '{0}'. Please use constraint specific 'drop' clause")]
    AmbiguousConstraint(String),

    #[error("Incorrect table name '{0}'")]
    ReservedName(String),

    #[error("Incorrect {kind} name '{name}'")]
    InvalidName { kind: &'static str, name: String },

    #[error("Incorrect column specifier for column '{0}'")]
    AutoIncrementType(String),

    #[error("Incorrect table definition; there can be only one auto column and it must be defined as a key")]
    WrongAutoKey,

    #[error("You can't delete all columns with ALTER TABLE; use DROP TABLE instead")]
    CantRemoveAllColumns,

    #[error("Invalid default value for '{0}'")]
    InvalidDefault(String),

    #[error("Failed to open the referenced table '{0}'")]
    ReferencedTableMissing(String),

    #[error("Failed to add the foreign key constraint. Missing column '{column}' for constraint '{constraint}' in the referenced table '{table}'")]
    ReferencedColumnMissing {
        constraint: String,
        column: String,
        table: String,
    },

    #[error("Cannot drop table '{table}' referenced by a foreign key constraint '{constraint}' on table '{child}'.")]
    ReferencedByForeignKey {
        table: String,
        constraint: String,
        child: String,
    },

    #[error("Unknown table '{table}' in {clause}")]
    UnknownTarget { table: String, clause: String },

    #[error("Cannot drop index '{0}': needed in a foreign key constraint")]
    IndexNeededByForeignKey(String),

    #[error("Cannot drop column '{column}': needed in a foreign key constraint '{constraint}'")]
    ColumnNeededByForeignKey { column: String, constraint: String },

    #[error("BLOB/TEXT column '{0}' used in key specification without a key length")]
    KeyLengthRequired(String),

    #[error("Constraint '{0}' does not exist.")]
    NoSuchConstraint(String),

    #[error("Incorrect foreign key definition for '{0}': Key reference and table reference don't match")]
    ForeignKeyArity(String),

    #[error("Column count doesn't match value count at row {0}")]
    ColumnCountMismatch(usize),

    #[error("Column '{0}' specified twice")]
    ColumnSpecifiedTwice(String),

    #[error("The used SELECT statements have a different number of columns")]
    UnionArity,

    #[error("Can't drop database '{0}'; database doesn't exist")]
    DatabaseMissing(String),

    #[error("Cannot truncate a table referenced in a foreign key constraint ({0})")]
    TruncateReferenced(String),

    #[error("Unknown character set: '{0}'")]
    UnknownCharset(String),

    #[error("Unknown collation: '{0}'")]
    UnknownCollation(String),

    #[error("Invalid ON UPDATE clause for '{0}' column")]
    InvalidOnUpdate(String),
}

impl CatalogError {
    pub fn code(&self) -> u16 {
        match self {
            CatalogError::UnknownDatabase(_) => 1049,
            CatalogError::DatabaseExists(_) => 1007,
            CatalogError::NoDatabaseSelected => 1046,
            CatalogError::NoSuchTable { .. } => 1146,
            CatalogError::UnknownTable { .. } => 1051,
            CatalogError::TableExists(_) => 1050,
            CatalogError::NotUniqueAlias(_) => 1066,
            CatalogError::NoSuchColumn { .. } => 1054,
            CatalogError::DuplicateColumn(_) => 1060,
            CatalogError::AmbiguousColumn { .. } => 1052,
            CatalogError::DuplicateKeyName(_) => 1061,
            CatalogError::MultiplePrimaryKey => 1068,
            CatalogError::CantDrop(_) => 1091,
            CatalogError::NoSuchKey { .. } => 1176,
            CatalogError::KeyColumnMissing(_) => 1072,
            CatalogError::DuplicateConstraint { kind, .. } => match *kind {
                "FOREIGN KEY" => 1826,
                _ => 3822,
            },
            CatalogError::AmbiguousConstraint(_) => 3939,
            CatalogError::ReservedName(_) => 1103,
            CatalogError::InvalidName { .. } => 1103,
            CatalogError::AutoIncrementType(_) => 1063,
            CatalogError::WrongAutoKey => 1075,
            CatalogError::CantRemoveAllColumns => 1090,
            CatalogError::InvalidDefault(_) => 1067,
            CatalogError::ReferencedTableMissing(_) => 1824,
            CatalogError::ReferencedColumnMissing { .. } => 1822,
            CatalogError::ReferencedByForeignKey { .. } => 3730,
            CatalogError::UnknownTarget { .. } => 1109,
            CatalogError::IndexNeededByForeignKey(_) => 1553,
            CatalogError::ColumnNeededByForeignKey { .. } => 1828,
            CatalogError::KeyLengthRequired(_) => 1170,
            CatalogError::NoSuchConstraint(_) => 3940,
            CatalogError::ForeignKeyArity(_) => 1239,
            CatalogError::ColumnCountMismatch(_) => 1136,
            CatalogError::ColumnSpecifiedTwice(_) => 1110,
            CatalogError::UnionArity => 1222,
            CatalogError::DatabaseMissing(_) => 1008,
            CatalogError::TruncateReferenced(_) => 1701,
            CatalogError::UnknownCharset(_) => 1115,
            CatalogError::UnknownCollation(_) => 1273,
            CatalogError::InvalidOnUpdate(_) => 1294,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CatalogError::UnknownDatabase(_)
            | CatalogError::NoDatabaseSelected
            | CatalogError::NoSuchTable { .. }
            | CatalogError::UnknownTable { .. }
            | CatalogError::NoSuchKey { .. }
            | CatalogError::CantDrop(_)
            | CatalogError::ReferencedTableMissing(_)
            | CatalogError::UnknownTarget { .. }
            | CatalogError::NoSuchConstraint(_)
            | CatalogError::DatabaseMissing(_)
            | CatalogError::UnknownCharset(_)
            | CatalogError::UnknownCollation(_) => ErrorCategory::ObjectNotFound,
            CatalogError::NoSuchColumn { .. }
            | CatalogError::KeyColumnMissing(_)
            | CatalogError::ReferencedColumnMissing { .. } => ErrorCategory::ColumnNotFound,
            CatalogError::DatabaseExists(_)
            | CatalogError::TableExists(_)
            | CatalogError::DuplicateColumn(_)
            | CatalogError::DuplicateKeyName(_)
            | CatalogError::DuplicateConstraint { .. }
            | CatalogError::MultiplePrimaryKey => ErrorCategory::AlreadyExists,
            CatalogError::AmbiguousColumn { .. } => ErrorCategory::IntegrityViolation,
            CatalogError::ReferencedByForeignKey { .. }
            | CatalogError::IndexNeededByForeignKey(_)
            | CatalogError::ColumnNeededByForeignKey { .. }
            | CatalogError::TruncateReferenced(_) => ErrorCategory::IntegrityViolation,
            _ => ErrorCategory::Syntax,
        }
    }

    fn sql_state(&self) -> &'static str {
        match self {
            CatalogError::NoSuchTable { .. } | CatalogError::UnknownTable { .. } => "42S02",
            CatalogError::TableExists(_) => "42S01",
            CatalogError::ColumnCountMismatch(_) => "21S01",
            CatalogError::UnionArity => "21000",
            CatalogError::NoSuchColumn { .. } | CatalogError::KeyColumnMissing(_) => "42S22",
            CatalogError::DuplicateColumn(_) => "42S21",
            CatalogError::AmbiguousColumn { .. } => "23000",
            CatalogError::NoDatabaseSelected => "3D000",
            CatalogError::DatabaseExists(_)
            | CatalogError::AmbiguousConstraint(_)
            | CatalogError::ReferencedTableMissing(_)
            | CatalogError::ReferencedColumnMissing { .. }
            | CatalogError::ReferencedByForeignKey { .. }
            | CatalogError::IndexNeededByForeignKey(_)
            | CatalogError::ColumnNeededByForeignKey { .. }
            | CatalogError::NoSuchConstraint(_)
            | CatalogError::DatabaseMissing(_)
            | CatalogError::UnknownCollation(_) => "HY000",
            CatalogError::TruncateReferenced(_) => "42000",
            _ => "42000",
        }
    }
}

/// Value coercion failures (raised in strict mode, or always for NULL into NOT NULL).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CastError {
    #[error("Column '{column}' cannot be null")]
    NotNull { column: String },

    #[error("Field '{column}' doesn't have a default value")]
    NoDefault { column: String },

    #[error("Out of range value for column '{column}' at row {row}")]
    OutOfRange { column: String, row: usize },

    #[error("Incorrect {type_name} value: '{value}' for column '{column}' at row {row}")]
    IncorrectValue {
        type_name: &'static str,
        value: String,
        column: String,
        row: usize,
    },

    #[error("Incorrect {type_name} value: '{value}' for column '{column}' at row {row}")]
    IncorrectTemporal {
        type_name: &'static str,
        value: String,
        column: String,
        row: usize,
    },

    #[error("Data truncated for column '{column}' at row {row}")]
    Truncated { column: String, row: usize },

    #[error("Data too long for column '{column}' at row {row}")]
    TooLong { column: String, row: usize },

    #[error("Invalid JSON text: \"{reason}\" in value for column '{column}'.")]
    InvalidJson { reason: String, column: String },
}

impl CastError {
    pub fn code(&self) -> u16 {
        match self {
            CastError::NotNull { .. } => 1048,
            CastError::NoDefault { .. } => 1364,
            CastError::OutOfRange { .. } => 1264,
            CastError::IncorrectValue { .. } => 1366,
            CastError::IncorrectTemporal { .. } => 1292,
            CastError::Truncated { .. } => 1265,
            CastError::TooLong { .. } => 1406,
            CastError::InvalidJson { .. } => 3140,
        }
    }

    fn sql_state(&self) -> &'static str {
        match self {
            CastError::NotNull { .. } => "23000",
            CastError::NoDefault { .. } | CastError::IncorrectValue { .. } => "HY000",
            CastError::OutOfRange { .. } => "22003",
            CastError::IncorrectTemporal { .. } => "22007",
            CastError::Truncated { .. } => "01000",
            CastError::TooLong { .. } => "22001",
            CastError::InvalidJson { .. } => "22032",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CastError::NotNull { .. } | CastError::NoDefault { .. } => {
                ErrorCategory::IntegrityViolation
            }
            _ => ErrorCategory::DataException,
        }
    }
}

/// Kind of a native constraint failure after translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    NotNull,
    Unique,
    ForeignKey,
    Check,
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cast(#[from] CastError),

    #[error("{message}")]
    Constraint {
        kind: ConstraintKind,
        code: u16,
        message: String,
    },

    #[error("Access denied for user '{user}' to database '{database}'")]
    Permission { user: String, database: String },

    #[error("Database is locked: {0}")]
    Busy(String),

    #[error("SAVEPOINT {0} does not exist")]
    NoSuchSavepoint(String),

    #[error("Unknown system variable '{0}'")]
    UnknownVariable(String),

    #[error("Variable '{name}' can't be set to the value of '{value}'")]
    WrongVariableValue { name: String, value: String },

    #[error("Variable '{0}' is a read only variable")]
    ReadOnlyVariable(String),

    #[error("This version of MySQL doesn't yet support '{0}'")]
    NotSupported(String),

    #[error("Incorrect arguments to {0}")]
    IncorrectArguments(String),

    #[error("Native engine error ({code}): {message}")]
    Native { code: i32, message: String },

    #[error("Catalog serialization error: {0}")]
    Serialization(String),
}

impl DriverError {
    pub fn native(code: i32, message: impl Into<String>) -> Self {
        DriverError::Native {
            code,
            message: message.into(),
        }
    }

    /// MySQL error number.
    pub fn code(&self) -> u16 {
        match self {
            DriverError::Parse(e) => e.code(),
            DriverError::Catalog(e) => e.code(),
            DriverError::Cast(e) => e.code(),
            DriverError::Constraint { code, .. } => *code,
            DriverError::Permission { .. } => 1044,
            DriverError::Busy(_) => 1205,
            DriverError::NoSuchSavepoint(_) => 1305,
            DriverError::UnknownVariable(_) => 1193,
            DriverError::WrongVariableValue { .. } => 1231,
            DriverError::ReadOnlyVariable(_) => 1238,
            DriverError::NotSupported(_) => 1235,
            DriverError::IncorrectArguments(_) => 1210,
            DriverError::Native { .. } | DriverError::Serialization(_) => 1105,
        }
    }

    /// Five-character SQLSTATE.
    pub fn sql_state(&self) -> &'static str {
        match self {
            DriverError::Parse(_) => "42000",
            DriverError::Catalog(e) => e.sql_state(),
            DriverError::Cast(e) => e.sql_state(),
            DriverError::Constraint { .. } => "23000",
            DriverError::Permission { .. } => "42000",
            DriverError::Busy(_) => "HY000",
            DriverError::NoSuchSavepoint(_) => "42000",
            DriverError::UnknownVariable(_) | DriverError::WrongVariableValue { .. } => "42000",
            DriverError::ReadOnlyVariable(_) => "HY000",
            DriverError::NotSupported(_) => "42000",
            DriverError::IncorrectArguments(_) => "HY000",
            DriverError::Native { .. } | DriverError::Serialization(_) => "HY000",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DriverError::Parse(ParseError::Unsupported(_)) => ErrorCategory::NotSupported,
            DriverError::Parse(_) => ErrorCategory::Syntax,
            DriverError::Catalog(e) => e.category(),
            DriverError::Cast(e) => e.category(),
            DriverError::Constraint { .. } => ErrorCategory::IntegrityViolation,
            DriverError::Permission { .. } => ErrorCategory::AccessViolation,
            DriverError::Busy(_) => ErrorCategory::LockContention,
            DriverError::NoSuchSavepoint(_) => ErrorCategory::Transaction,
            DriverError::UnknownVariable(_)
            | DriverError::WrongVariableValue { .. }
            | DriverError::ReadOnlyVariable(_)
            | DriverError::IncorrectArguments(_) => ErrorCategory::Syntax,
            DriverError::NotSupported(_) => ErrorCategory::NotSupported,
            DriverError::Native { .. } | DriverError::Serialization(_) => ErrorCategory::General,
        }
    }

    /// Lock contention is the only condition worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DriverError::Busy(_))
    }
}

impl From<bincode::Error> for DriverError {
    fn from(err: bincode::Error) -> Self {
        DriverError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_states() {
        let err: DriverError = CatalogError::NoSuchTable {
            database: "app".into(),
            table: "t".into(),
        }
        .into();
        assert_eq!(err.code(), 1146);
        assert_eq!(err.sql_state(), "42S02");
        assert_eq!(err.category(), ErrorCategory::ObjectNotFound);
        assert_eq!(err.to_string(), "Table 'app.t' doesn't exist");
    }

    #[test]
    fn test_busy_is_retryable() {
        let err = DriverError::Busy("database is locked".into());
        assert!(err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::LockContention);

        let err: DriverError = ParseError::MultipleStatements.into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_cast_error_category() {
        let err: DriverError = CastError::NotNull { column: "c".into() }.into();
        assert_eq!(err.category(), ErrorCategory::IntegrityViolation);
        assert_eq!(err.code(), 1048);

        let err: DriverError = CastError::TooLong {
            column: "c".into(),
            row: 1,
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::DataException);
        assert_eq!(err.sql_state(), "22001");
    }
}
