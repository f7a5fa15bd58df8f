//! Statement compiler
//!
//! Turns one parsed statement, the catalog and the session into a [`Plan`]:
//! native statements with bound parameters, catalog mutations paired with
//! the native DDL that projects them, reads of catalog state, or session
//! changes. Compilation never touches the engine; the driver runs the plan.
//!
//! ## Layout
//! - `render`: expressions, operators and function translation
//! - `scope`: name resolution for FROM lists, aliases and SELECT labels
//! - `select`, `dml`: queries and row changes
//! - `ddl`, `native_schema`: catalog mutations and their native projection
//! - `introspection`: SHOW / DESCRIBE / `information_schema`
//! - `admin`: USE, SET, transaction control, LOCK TABLES

mod admin;
mod ddl;
mod dml;
mod introspection;
mod native_schema;
mod render;
mod scope;
mod select;

pub use native_schema::{NativeTrigger, trigger_set};
pub(crate) use native_schema::{index_set, schema_of};

use crate::catalog::information_schema::Filter;
use crate::catalog::{Catalog, Mutation, TableSchema, INFORMATION_SCHEMA};
use crate::engine::RowSet;
use crate::error::{CastError, CatalogError, DriverError, Result};
use crate::formatter::ColumnMeta;
use crate::session::{Session, Warning};
use crate::sql::ast::{ObjectName, Statement};
use crate::types::temporal::{now_utc, DateTime};
use crate::types::Value;
use log::debug;
use std::cell::RefCell;

/// Name of the per-statement savepoint the driver wraps row changes in.
pub const STATEMENT_SAVEPOINT: &str = "_mysqlite_stmt";

/// Reported as `USER()` and in permission errors.
pub const SESSION_USER: &str = "root@localhost";

/// One statement for the native engine.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeStatement {
    pub sql: String,
    /// Values for `?1`, `?2`, ...
    pub params: Vec<Value>,
    pub role: Role,
    /// Conversions of literal values that succeeded with a warning
    pub warnings: Vec<CastError>,
    /// Row values known at compile time, used to word duplicate-key errors
    pub keys: Option<DuplicateContext>,
}

impl NativeStatement {
    pub fn internal(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            role: Role::Internal,
            warnings: Vec::new(),
            keys: None,
        }
    }
}

/// What the driver does with a statement's outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    /// Result set with these columns
    Rows(Vec<ColumnMeta>),
    /// Changed rows count toward the affected rows
    Affected,
    Insert(InsertInfo),
    /// `SQL_CALC_FOUND_ROWS` companion count
    FoundRows,
    /// Bookkeeping; result ignored
    Internal,
}

/// Which inserted rows got an engine-generated AUTO_INCREMENT value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Generated {
    #[default]
    None,
    /// Every inserted row
    All,
    /// Some rows; the first generated id is approximated by the last one
    Some,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertInfo {
    pub generated: Generated,
}

/// Context for "Duplicate entry 'v' for key 't.k'" messages.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateContext {
    pub database: String,
    pub table: String,
    /// Known column values per row, in row order
    pub rows: Vec<Vec<(String, Value)>>,
}

/// Catalog mutations plus the native statements projecting them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DdlPlan {
    pub mutations: Vec<Mutation>,
    pub statements: Vec<NativeStatement>,
    /// Only connection-scoped tables are touched: no implicit commit
    pub temporary: bool,
    /// Notes such as "table already exists" for IF [NOT] EXISTS
    pub notes: Vec<Warning>,
}

/// Where a virtual table's rows come from.
#[derive(Debug, Clone, PartialEq)]
pub enum VirtualSource {
    InformationSchema { view: String, filter: Filter },
    /// `SHOW CREATE TABLE`, rendered with live AUTO_INCREMENT state
    ShowCreateTable { database: String, table: String },
    Rows(RowSet),
}

/// Catalog state materialized into a scratch table for one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualTable {
    /// Native name inside the `temp` schema
    pub name: String,
    pub source: VirtualSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRead {
    pub sources: Vec<VirtualTable>,
    pub plan: Box<Plan>,
}

/// Value of one `SET` assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Default,
    Literal(Value),
    /// `SELECT <expr>` evaluated by the engine
    Query(NativeStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetAction {
    User { name: String, value: SetValue },
    System { name: String, value: SetValue },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionPlan {
    Use(String),
    Set(Vec<SetAction>),
    SetNames { charset: String, collation: Option<String> },
    /// Accepted without effect (SET TRANSACTION, LOCK/UNLOCK TABLES)
    Noop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionControl {
    Begin,
    Commit,
    Rollback,
    Savepoint(String),
    Release(String),
    RollbackTo(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Direct(NativeStatement),
    Composite(Vec<Plan>),
    Ddl(DdlPlan),
    CatalogRead(CatalogRead),
    Session(SessionPlan),
    Transaction(TransactionControl),
}

impl Plan {
    /// Short description for logs.
    pub fn summary(&self) -> String {
        match self {
            Plan::Direct(s) => format!("direct: {}", s.sql),
            Plan::Composite(plans) => format!("composite of {}", plans.len()),
            Plan::Ddl(d) => format!(
                "ddl: {} mutations, {} native statements",
                d.mutations.len(),
                d.statements.len()
            ),
            Plan::CatalogRead(r) => format!("catalog read over {} sources, {}", r.sources.len(), r.plan.summary()),
            Plan::Session(s) => format!("session: {:?}", s),
            Plan::Transaction(t) => format!("transaction: {:?}", t),
        }
    }
}

/// Parameters and warnings collected while rendering one native statement.
#[derive(Debug, Default)]
pub(crate) struct Emit {
    pub params: Vec<Value>,
    pub warnings: Vec<CastError>,
    /// Render values as literals (stored schema objects take no parameters)
    pub inline: bool,
}

impl Emit {
    pub fn inline() -> Self {
        Self {
            inline: true,
            ..Default::default()
        }
    }

    /// Bind a value, returning the SQL that refers to it.
    pub fn bind(&mut self, value: Value) -> String {
        if self.inline {
            return render::literal_sql(&value);
        }
        self.params.push(value);
        format!("?{}", self.params.len())
    }

    pub fn finish(self, sql: String, role: Role) -> NativeStatement {
        NativeStatement {
            sql,
            params: self.params,
            role,
            warnings: self.warnings,
            keys: None,
        }
    }
}

/// Compile one statement. `args` are the values of `?` placeholders.
pub fn compile(statement: &Statement, session: &Session, catalog: &Catalog, args: &[Value]) -> Result<Plan> {
    Compiler::new(catalog, session, args).compile(statement)
}

pub struct Compiler<'a> {
    pub(crate) catalog: &'a Catalog,
    pub(crate) session: &'a Session,
    pub(crate) args: &'a [Value],
    /// Statement timestamp: every NOW() of one statement agrees
    pub(crate) now: DateTime,
    virtuals: RefCell<Vec<VirtualTable>>,
}

impl<'a> Compiler<'a> {
    pub fn new(catalog: &'a Catalog, session: &'a Session, args: &'a [Value]) -> Self {
        Self {
            catalog,
            session,
            args,
            now: now_utc(),
            virtuals: RefCell::new(Vec::new()),
        }
    }

    pub fn compile(&self, statement: &Statement) -> Result<Plan> {
        let plan = match statement {
            Statement::Select(query) => self.compile_select(query)?,
            Statement::Insert(stmt) => self.compile_insert(stmt)?,
            Statement::Update(stmt) => self.compile_update(stmt)?,
            Statement::Delete(stmt) => self.compile_delete(stmt)?,
            Statement::CreateTable(stmt) => self.compile_create_table(stmt)?,
            Statement::AlterTable(stmt) => self.compile_alter_table(stmt)?,
            Statement::DropTable(stmt) => self.compile_drop_table(stmt)?,
            Statement::RenameTable(pairs) => self.compile_rename_table(pairs)?,
            Statement::TruncateTable(name) => self.compile_truncate(name)?,
            Statement::CreateIndex(stmt) => self.compile_create_index(stmt)?,
            Statement::DropIndex { name, table } => self.compile_drop_index(name, table)?,
            Statement::CreateDatabase(stmt) => self.compile_create_database(stmt)?,
            Statement::DropDatabase { name, if_exists } => self.compile_drop_database(name, *if_exists)?,
            Statement::Use(name) => self.compile_use(name)?,
            Statement::Set(assignments) => self.compile_set(assignments)?,
            Statement::SetNames { charset, collation } => Plan::Session(SessionPlan::SetNames {
                charset: charset.clone(),
                collation: collation.clone(),
            }),
            Statement::SetTransaction => Plan::Session(SessionPlan::Noop),
            Statement::Show(show) => self.compile_show(show)?,
            Statement::Describe { table, column } => self.compile_describe(table, column.as_deref())?,
            Statement::Begin => Plan::Transaction(TransactionControl::Begin),
            Statement::Commit => Plan::Transaction(TransactionControl::Commit),
            Statement::Rollback => Plan::Transaction(TransactionControl::Rollback),
            Statement::Savepoint(name) => Plan::Transaction(TransactionControl::Savepoint(name.clone())),
            Statement::ReleaseSavepoint(name) => Plan::Transaction(TransactionControl::Release(name.clone())),
            Statement::RollbackToSavepoint(name) => {
                Plan::Transaction(TransactionControl::RollbackTo(name.clone()))
            }
            Statement::LockTables(targets) => self.compile_lock_tables(targets)?,
            Statement::UnlockTables => Plan::Session(SessionPlan::Noop),
        };

        let sources = self.virtuals.take();
        let plan = if sources.is_empty() {
            plan
        } else {
            Plan::CatalogRead(CatalogRead {
                sources,
                plan: Box::new(plan),
            })
        };
        debug!("compiled {}", plan.summary());
        Ok(plan)
    }

    /// Database a statement works in when it names none.
    pub(crate) fn current_database(&self) -> Result<&str> {
        self.session
            .current_database
            .as_deref()
            .ok_or_else(|| CatalogError::NoDatabaseSelected.into())
    }

    pub(crate) fn database_of(&self, name: &ObjectName) -> Result<String> {
        match &name.database {
            Some(db) => Ok(db.clone()),
            None => self.current_database().map(str::to_string),
        }
    }

    pub(crate) fn is_information_schema(&self, name: &ObjectName) -> bool {
        match &name.database {
            Some(db) => db.eq_ignore_ascii_case(INFORMATION_SCHEMA),
            None => self
                .session
                .current_database
                .as_deref()
                .map_or(false, |db| db.eq_ignore_ascii_case(INFORMATION_SCHEMA)),
        }
    }

    /// Writes to `information_schema` fail before anything else happens.
    pub(crate) fn deny_information_schema(&self, name: &ObjectName) -> Result<()> {
        if self.is_information_schema(name) {
            return Err(permission_denied());
        }
        Ok(())
    }

    /// Table named by a statement; temporary tables shadow persistent ones.
    pub(crate) fn table(&self, name: &ObjectName) -> Result<&'a TableSchema> {
        let database = self.database_of(name)?;
        if !self.catalog.has_database(&database) {
            return Err(CatalogError::UnknownDatabase(database).into());
        }
        self.catalog
            .lookup_table(&database, &name.name, true)
            .ok_or_else(|| {
                CatalogError::NoSuchTable {
                    database,
                    table: name.name.clone(),
                }
                .into()
            })
    }

    /// Register a scratch table filled from catalog state; returns its native name.
    pub(crate) fn add_virtual(&self, source: VirtualSource) -> String {
        let mut virtuals = self.virtuals.borrow_mut();
        let name = format!("_mysqlite_tmp_v{}", virtuals.len() + 1);
        virtuals.push(VirtualTable {
            name: name.clone(),
            source,
        });
        name
    }
}

pub(crate) fn permission_denied() -> DriverError {
    let (user, host) = SESSION_USER.split_once('@').unwrap_or((SESSION_USER, "localhost"));
    DriverError::Permission {
        user: format!("{}'@'{}", user, host),
        database: INFORMATION_SCHEMA.to_string(),
    }
}

/// A note-level diagnostic.
pub(crate) fn note(code: u16, message: String) -> Warning {
    Warning {
        level: "Note",
        code,
        message,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::DriverConfig;
    use crate::sql::parse;

    pub fn session() -> Session {
        Session::new(&DriverConfig::in_memory("app"), 1).unwrap()
    }

    pub fn plan(catalog: &Catalog, session: &Session, sql: &str) -> Result<Plan> {
        let parsed = parse(sql, session.lexer_options())?;
        compile(&parsed.statement, session, catalog, &[])
    }

    /// Catalog built by running CREATE statements through the compiler.
    pub fn catalog(ddl: &[&str]) -> Catalog {
        let session = session();
        let mut catalog = Catalog::new("app", "utf8mb4", "utf8mb4_0900_ai_ci");
        for sql in ddl {
            let Plan::Ddl(ddl) = plan(&catalog, &session, sql).unwrap() else {
                panic!("not a DDL statement: {}", sql);
            };
            for mutation in &ddl.mutations {
                catalog.apply(mutation).unwrap();
            }
        }
        catalog
    }

    pub fn direct(plan: Result<Plan>) -> NativeStatement {
        match plan.unwrap() {
            Plan::Direct(stmt) => stmt,
            other => panic!("expected a single statement, got {}", other.summary()),
        }
    }
}
