//! mysqlite: MySQL-dialect compatibility driver over embedded SQLite
//!
//! Application code written for MySQL runs unmodified against a single-file
//! SQLite database. Statements are parsed in the MySQL dialect, compiled
//! against a shadow catalog and executed natively; introspection (SHOW,
//! DESCRIBE, `information_schema`) answers from the catalog in MySQL's shape.
//!
//! ## Architecture
//! - `sql`: lexer and parser for the MySQL dialect
//! - `catalog`: databases, tables, indexes and constraints, persisted in the
//!   storage file next to the data
//! - `cast`, `session`: MySQL coercion rules and per-connection state
//! - `compiler`: statement + catalog + session -> plan
//! - `engine`: the native SQLite connection and its helper functions
//! - `formatter`: native rows -> MySQL-shaped results
//! - `driver`: the execution facade tying them together

pub mod cache;
pub mod cast;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod driver;
pub mod engine;
pub mod formatter;
pub mod session;
pub mod sql;
pub mod types;

mod error;

pub use config::DriverConfig;
pub use driver::Driver;
pub use error::{CastError, CatalogError, ConstraintKind, DriverError, ErrorCategory, ParseError, Result};
pub use formatter::{ColumnMeta, QueryResult};
pub use session::{Session, Warning};
pub use types::{DataType, Value};
