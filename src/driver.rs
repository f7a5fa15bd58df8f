//! Execution facade
//!
//! [`Driver`] owns one native connection, the schema registry and the
//! session. `execute` parses a statement, compiles it against the current
//! catalog and runs the plan. Row changes run under a statement savepoint,
//! so a failing statement leaves nothing behind even inside a transaction.
//! DDL runs in its own native transaction together with the rewrite of the
//! persisted catalog.

use crate::catalog::information_schema::{query_information_schema, TableStats};
use crate::catalog::{
    is_internal_table, quote_native, show_create_table, Catalog, Mutation, SchemaRegistry, TableSchema,
    INFORMATION_SCHEMA,
};
use crate::compiler::{
    compile, index_set, schema_of, trigger_set, DdlPlan, DuplicateContext, Generated, NativeStatement, Plan, Role,
    SessionPlan, SetAction, SetValue, TransactionControl, VirtualSource, VirtualTable, STATEMENT_SAVEPOINT,
};
use crate::config::DriverConfig;
use crate::engine::{unique_columns, NativeEngine, RowSet, SqliteEngine};
use crate::error::{CatalogError, ConstraintKind, DriverError, Result};
use crate::formatter::{format_rows, render_value, ColumnMeta, QueryResult};
use crate::session::{Session, SessionChange, TxAction, Warning};
use crate::sql::ast::{ShowStmt, Statement};
use crate::sql::parse;
use crate::types::Value;
use ahash::AHashSet;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// What running one plan produced.
#[derive(Debug, Default)]
struct Outcome {
    columns: Option<Vec<ColumnMeta>>,
    rows: Vec<Vec<Option<String>>>,
    affected: u64,
    /// First AUTO_INCREMENT id generated by the statement
    insert_id: Option<u64>,
    found_rows: Option<u64>,
    warnings: Vec<Warning>,
}

/// Row counts and AUTO_INCREMENT positions read from the engine.
struct LiveStats<'a> {
    engine: &'a dyn NativeEngine,
    catalog: &'a Catalog,
}

impl TableStats for LiveStats<'_> {
    fn row_count(&self, table: &TableSchema) -> Option<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.catalog.native_ref(table));
        let rows = self.engine.query_native(&sql, &[]).ok()?;
        Some(count(rows.scalar()))
    }

    fn next_auto_increment(&self, table: &TableSchema) -> Option<u64> {
        table.auto_increment_column()?;
        let schema = schema_of(table);
        let fallback = table.auto_increment.unwrap_or(1);
        if !self.engine.table_exists(schema, "sqlite_sequence").ok()? {
            return Some(fallback);
        }
        let sql = format!(
            "SELECT seq FROM {}.\"sqlite_sequence\" WHERE name = ?1",
            quote_native(schema)
        );
        let rows = self
            .engine
            .query_native(&sql, &[Value::text(self.catalog.native_name(table))])
            .ok()?;
        match rows.scalar() {
            Some(seq) if !seq.is_null() => Some(count(Some(seq)) + 1),
            _ => Some(fallback),
        }
    }
}

fn count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Integer(n)) => (*n).max(0) as u64,
        Some(Value::Unsigned(n)) => *n,
        _ => 0,
    }
}

/// A MySQL-dialect connection over an embedded SQLite file.
///
/// # Examples
///
/// ```no_run
/// use mysqlite::{Driver, DriverConfig};
///
/// # fn main() -> mysqlite::Result<()> {
/// let mut driver = Driver::open(DriverConfig::in_memory("shop"))?;
/// driver.execute("CREATE TABLE users (id INT AUTO_INCREMENT PRIMARY KEY, name VARCHAR(40) NOT NULL)")?;
/// driver.execute("INSERT INTO users (name) VALUES ('alice')")?;
/// assert_eq!(driver.last_insert_id(), 1);
///
/// let result = driver.execute("SELECT name FROM users")?;
/// assert_eq!(result.get(0, "name"), Some("alice"));
/// # Ok(())
/// # }
/// ```
pub struct Driver {
    engine: Box<dyn NativeEngine>,
    registry: SchemaRegistry,
    session: Session,
    /// Catalog as of BEGIN, for undoing temporary-table DDL on ROLLBACK
    begin_catalog: Option<Catalog>,
    /// Catalog as of each open savepoint, oldest first
    savepoint_catalogs: Vec<(String, Catalog)>,
}

impl Driver {
    // ---- lifecycle --------------------------------------------------------

    /// Open the file named by `config.path`, or a private in-memory database.
    pub fn open(config: DriverConfig) -> Result<Self> {
        let engine = SqliteEngine::open(&config)?;
        Self::with_engine(Box::new(engine), config)
    }

    /// Run on an already opened native engine.
    pub fn with_engine(engine: Box<dyn NativeEngine>, config: DriverConfig) -> Result<Self> {
        let registry = SchemaRegistry::open(engine.as_ref(), &config)?;
        let session = Session::new(&config, NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))?;
        engine.set_foreign_key_checks(session.foreign_key_checks)?;
        let driver = Self {
            engine,
            registry,
            session,
            begin_catalog: None,
            savepoint_catalogs: Vec::new(),
        };
        info!(
            "connection {} opened, database {}",
            driver.session.connection_id, config.database
        );
        if config.validate_schema_on_open {
            driver.validate_schema()?;
        }
        Ok(driver)
    }

    // ---- statements -------------------------------------------------------

    /// Run one statement.
    pub fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        self.execute_with_params(sql, &[])
    }

    /// Run one statement, binding `params` to its `?` placeholders in order.
    pub fn execute_with_params(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        match self.run_statement(sql, params) {
            Ok(result) => Ok(result),
            Err(err) => {
                debug!("statement failed ({}): {}", err.code(), err);
                self.session.warnings = vec![Warning {
                    level: "Error",
                    code: err.code(),
                    message: err.to_string(),
                }];
                Err(err)
            }
        }
    }

    fn run_statement(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.registry.reload_if_stale(self.engine.as_ref())?;
        let parsed = parse(sql, self.session.lexer_options())?;
        if parsed.placeholders != params.len() {
            return Err(DriverError::IncorrectArguments("mysqld_stmt_execute".into()));
        }
        let plan = {
            let catalog = self.registry.read();
            compile(&parsed.statement, &self.session, &catalog, params)?
        };
        // SHOW WARNINGS reports the previous statement's diagnostics
        if !matches!(parsed.statement, Statement::Show(ShowStmt::Warnings)) {
            self.session.begin_statement();
        }
        // leftovers of a statement that failed after converting some values
        self.engine.take_cast_warnings();
        let outcome = self.run(plan)?;
        Ok(self.finish(outcome))
    }

    fn finish(&mut self, outcome: Outcome) -> QueryResult {
        let session = &mut self.session;
        session.warnings.extend(outcome.warnings);
        if let Some(id) = outcome.insert_id {
            session.last_insert_id = id;
        }
        let mut result = match outcome.columns {
            Some(columns) => {
                session.last_row_count = -1;
                session.found_rows = outcome.found_rows.unwrap_or(outcome.rows.len() as u64);
                session.last_columns = columns.clone();
                QueryResult {
                    columns,
                    rows: outcome.rows,
                    ..Default::default()
                }
            }
            None => {
                session.last_row_count = outcome.affected as i64;
                session.last_columns.clear();
                QueryResult {
                    last_insert_id: outcome.insert_id.unwrap_or(0),
                    ..QueryResult::affected(outcome.affected)
                }
            }
        };
        result.warning_count = session.warnings.len();
        result
    }

    fn run(&mut self, plan: Plan) -> Result<Outcome> {
        match plan {
            Plan::Transaction(control) => {
                self.transaction(control)?;
                Ok(Outcome::default())
            }
            Plan::Session(session) => {
                self.session_plan(session)?;
                Ok(Outcome::default())
            }
            Plan::Ddl(ddl) => self.ddl(ddl),
            Plan::CatalogRead(read) => {
                let result = self.materialize(&read.sources).and_then(|()| self.run(*read.plan));
                self.drop_virtuals(&read.sources);
                result
            }
            plan @ (Plan::Direct(_) | Plan::Composite(_)) => {
                self.begin_implicit()?;
                self.guarded(&plan)
            }
        }
    }

    /// Run row statements under the statement savepoint.
    fn guarded(&mut self, plan: &Plan) -> Result<Outcome> {
        self.engine.savepoint(STATEMENT_SAVEPOINT)?;
        let mut outcome = Outcome::default();
        let mut failing = None;
        match self.run_native(plan, &mut outcome, &mut failing) {
            Ok(()) => {
                self.engine.release(STATEMENT_SAVEPOINT)?;
                Ok(outcome)
            }
            Err(err) => {
                let undo = self
                    .engine
                    .rollback_to(STATEMENT_SAVEPOINT)
                    .and_then(|()| self.engine.release(STATEMENT_SAVEPOINT));
                self.engine.take_cast_warnings();
                if let Err(undo) = undo {
                    warn!("could not undo failed statement ({}), rolling back: {}", err, undo);
                    self.abandon_transaction();
                    return Err(undo);
                }
                Err(match failing {
                    Some(keys) => self.describe_duplicate(keys, err),
                    None => err,
                })
            }
        }
    }

    /// Roll back everything once a failed statement could not be undone on
    /// its own, so the statement savepoint does not outlive it.
    fn abandon_transaction(&mut self) {
        self.session.transaction.rollback();
        self.savepoint_catalogs.clear();
        if let Some(catalog) = self.begin_catalog.take() {
            self.registry.restore_temporary(&catalog);
        }
        if let Err(err) = self.engine.rollback() {
            warn!("rollback after failed undo: {}", err);
        }
    }

    fn run_native<'p>(
        &self,
        plan: &'p Plan,
        outcome: &mut Outcome,
        failing: &mut Option<&'p DuplicateContext>,
    ) -> Result<()> {
        match plan {
            Plan::Direct(stmt) => {
                *failing = stmt.keys.as_ref();
                self.run_one(stmt, outcome)?;
                *failing = None;
                Ok(())
            }
            Plan::Composite(plans) => plans.iter().try_for_each(|p| self.run_native(p, outcome, failing)),
            other => Err(DriverError::NotSupported(format!("nested {}", other.summary()))),
        }
    }

    fn run_one(&self, stmt: &NativeStatement, outcome: &mut Outcome) -> Result<()> {
        debug!("native: {}", stmt.sql);
        outcome.warnings.extend(stmt.warnings.iter().map(Warning::from));
        match &stmt.role {
            Role::Rows(columns) => {
                let rows = self.engine.query_native(&stmt.sql, &stmt.params)?;
                outcome.rows = format_rows(columns, rows);
                outcome.columns = Some(columns.clone());
            }
            Role::FoundRows => {
                let rows = self.engine.query_native(&stmt.sql, &stmt.params)?;
                outcome.found_rows = Some(count(rows.scalar()));
            }
            Role::Affected => {
                outcome.affected += self.engine.execute_native(&stmt.sql, &stmt.params)? as u64;
            }
            Role::Insert(info) => {
                let changed = self.engine.execute_native(&stmt.sql, &stmt.params)? as u64;
                outcome.affected += changed;
                if changed > 0 {
                    let last = self.engine.last_insert_rowid().max(0) as u64;
                    match info.generated {
                        // ids of one multi-row insert are consecutive
                        Generated::All => outcome.insert_id = Some(last.saturating_sub(changed - 1)),
                        Generated::Some => outcome.insert_id = Some(last),
                        Generated::None => {}
                    }
                }
            }
            Role::Internal => {
                self.engine.execute_native(&stmt.sql, &stmt.params)?;
            }
        }
        outcome
            .warnings
            .extend(self.engine.take_cast_warnings().iter().map(Warning::from));
        Ok(())
    }

    /// Reword a native unique violation as "Duplicate entry 'v' for key 't.k'".
    /// Runs after the statement was undone, so the table holds its old rows.
    fn describe_duplicate(&self, keys: &DuplicateContext, err: DriverError) -> DriverError {
        let message = match &err {
            DriverError::Constraint {
                kind: ConstraintKind::Unique,
                message,
                ..
            } if message.starts_with("UNIQUE constraint failed") => message.clone(),
            _ => return err,
        };
        let columns = unique_columns(&message);
        let catalog = self.registry.read();
        let Some(table) = catalog.lookup_table(&keys.database, &keys.table, true) else {
            return err;
        };
        let Some(index) = table.indexes.iter().find(|i| {
            i.kind.is_unique() && i.parts.len() == columns.len() && columns.iter().all(|c| i.covers(c))
        }) else {
            return err;
        };
        let entry = self
            .duplicate_entry(&catalog, table, &index.column_names(), &keys.rows)
            .unwrap_or_default();
        DriverError::Constraint {
            kind: ConstraintKind::Unique,
            code: 1062,
            message: format!("Duplicate entry '{}' for key '{}.{}'", entry, table.name, index.name),
        }
    }

    /// Reword a unique violation raised while DDL copied or indexed the rows
    /// of an existing table. The key is looked up in the catalog the DDL would
    /// have produced; the repeated value comes from the restored table.
    fn describe_ddl_duplicate(&self, plan: &DdlPlan, err: DriverError) -> DriverError {
        let message = match &err {
            DriverError::Constraint {
                kind: ConstraintKind::Unique,
                message,
                ..
            } if message.starts_with("UNIQUE constraint failed") => message.clone(),
            _ => return err,
        };
        let Some((database, name)) = plan.mutations.iter().find_map(|m| match m {
            Mutation::AlterTable { database, name, .. } => Some((database.as_str(), name.as_str())),
            _ => None,
        }) else {
            return err;
        };
        let before = self.registry.snapshot();
        let mut after = before.clone();
        if plan.mutations.iter().try_for_each(|m| after.apply(m)).is_err() {
            return err;
        }
        // follow a rename made by the same statement
        let (new_database, new_name) = plan
            .mutations
            .iter()
            .find_map(|m| match m {
                Mutation::RenameTable {
                    database: d,
                    name: n,
                    new_database,
                    new_name,
                } if d.eq_ignore_ascii_case(database) && n.eq_ignore_ascii_case(name) => {
                    Some((new_database.as_str(), new_name.as_str()))
                }
                _ => None,
            })
            .unwrap_or((database, name));
        let Some(table) = after.lookup_table(new_database, new_name, true) else {
            return err;
        };
        let columns = unique_columns(&message);
        let Some(index) = table.indexes.iter().find(|i| {
            i.kind.is_unique() && i.parts.len() == columns.len() && columns.iter().all(|c| i.covers(c))
        }) else {
            return err;
        };
        let entry = before
            .lookup_table(database, name, true)
            .and_then(|old| self.repeated_key(&before, old, &index.column_names()))
            .unwrap_or_default();
        DriverError::Constraint {
            kind: ConstraintKind::Unique,
            code: 1062,
            message: format!("Duplicate entry '{}' for key '{}.{}'", entry, table.name, index.name),
        }
    }

    /// First non-NULL key value stored more than once.
    fn repeated_key(&self, catalog: &Catalog, table: &TableSchema, columns: &[&str]) -> Option<String> {
        let types = columns
            .iter()
            .map(|c| table.column(c).map(|col| col.data_type.clone()))
            .collect::<Option<Vec<_>>>()?;
        let list = columns.iter().map(|c| quote_native(c)).collect::<Vec<_>>().join(", ");
        let present: Vec<String> = columns.iter().map(|c| format!("{} IS NOT NULL", quote_native(c))).collect();
        let sql = format!(
            "SELECT {list} FROM {} WHERE {} GROUP BY {list} HAVING count(*) > 1 LIMIT 1",
            catalog.native_ref(table),
            present.join(" AND ")
        );
        let rows = self.engine.query_native(&sql, &[]).ok()?;
        let row = rows.rows.into_iter().next()?;
        let parts: Vec<String> = row
            .iter()
            .zip(&types)
            .map(|(v, ty)| render_value(v, Some(ty)).unwrap_or_default())
            .collect();
        Some(parts.join("-"))
    }

    /// Key of the first row that collides with a stored row or with an
    /// earlier row of the same statement.
    fn duplicate_entry(
        &self,
        catalog: &Catalog,
        table: &TableSchema,
        columns: &[&str],
        rows: &[Vec<(String, Value)>],
    ) -> Option<String> {
        let filter: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", quote_native(c), i + 1))
            .collect();
        let lookup = format!(
            "SELECT 1 FROM {} WHERE {} LIMIT 1",
            catalog.native_ref(table),
            filter.join(" AND ")
        );
        let mut seen: Vec<Vec<Value>> = Vec::new();
        for row in rows {
            let key: Option<Vec<Value>> = columns
                .iter()
                .map(|c| row.iter().find(|(name, _)| name.eq_ignore_ascii_case(c)).map(|(_, v)| v.clone()))
                .collect();
            let Some(key) = key else { continue };
            if key.iter().any(Value::is_null) {
                continue;
            }
            let stored = self
                .engine
                .query_native(&lookup, &key)
                .map(|r| !r.is_empty())
                .unwrap_or(false);
            if stored || seen.contains(&key) {
                let parts: Vec<String> = key.iter().map(|v| v.to_text().unwrap_or_default()).collect();
                return Some(parts.join("-"));
            }
            seen.push(key);
        }
        None
    }

    // ---- catalog reads ----------------------------------------------------

    /// Fill the scratch tables a statement reads catalog state from.
    fn materialize(&self, sources: &[VirtualTable]) -> Result<()> {
        for source in sources {
            let rows = self.virtual_rows(&source.source)?;
            let table = format!("{}.{}", quote_native("temp"), quote_native(&source.name));
            let columns: Vec<String> = rows.columns.iter().map(|c| quote_native(c)).collect();
            self.engine.execute_script(&format!(
                "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({});",
                columns.join(", ")
            ))?;
            let marks: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
            let insert = format!("INSERT INTO {} VALUES ({})", table, marks.join(", "));
            for row in &rows.rows {
                self.engine.execute_native(&insert, row)?;
            }
            debug!("materialized {} rows into {}", rows.len(), source.name);
        }
        Ok(())
    }

    fn virtual_rows(&self, source: &VirtualSource) -> Result<RowSet> {
        let catalog = self.registry.read();
        let stats = LiveStats {
            engine: self.engine.as_ref(),
            catalog: &catalog,
        };
        match source {
            VirtualSource::InformationSchema { view, filter } => {
                Ok(query_information_schema(&catalog, view, filter, &stats)?)
            }
            VirtualSource::ShowCreateTable { database, table } => {
                let schema = catalog
                    .lookup_table(database, table, true)
                    .ok_or_else(|| CatalogError::NoSuchTable {
                        database: database.clone(),
                        table: table.clone(),
                    })?;
                let ddl = show_create_table(schema, stats.next_auto_increment(schema));
                Ok(RowSet {
                    columns: vec!["Table".to_string(), "Create Table".to_string()],
                    rows: vec![vec![Value::text(schema.name.clone()), Value::text(ddl)]],
                })
            }
            VirtualSource::Rows(rows) => Ok(rows.clone()),
        }
    }

    fn drop_virtuals(&self, sources: &[VirtualTable]) {
        for source in sources {
            let sql = format!(
                "DROP TABLE IF EXISTS {}.{}",
                quote_native("temp"),
                quote_native(&source.name)
            );
            if let Err(err) = self.engine.execute_script(&sql) {
                warn!("could not drop {}: {}", source.name, err);
            }
        }
    }

    // ---- DDL --------------------------------------------------------------

    fn ddl(&mut self, plan: DdlPlan) -> Result<Outcome> {
        if !plan.temporary && self.session.transaction.is_active() {
            debug!("implicit commit before DDL");
            let actions = self.session.transaction.commit();
            self.run_actions(&actions)?;
        }
        // only temporary-table DDL runs inside a transaction
        let nested = self.session.transaction.is_active();
        let snapshot = self.registry.snapshot();
        if nested {
            self.engine.savepoint(STATEMENT_SAVEPOINT)?;
        } else {
            self.engine.begin()?;
        }

        let result = self.apply_ddl(&plan).and_then(|()| {
            if nested {
                self.engine.release(STATEMENT_SAVEPOINT)
            } else {
                self.engine.commit()
            }
        });
        if let Err(err) = result {
            warn!("DDL rolled back: {}", err);
            let undo = if nested {
                self.engine
                    .rollback_to(STATEMENT_SAVEPOINT)
                    .and_then(|()| self.engine.release(STATEMENT_SAVEPOINT))
            } else {
                self.engine.rollback()
            };
            if let Err(undo) = undo.and_then(|()| self.engine.execute_script("PRAGMA legacy_alter_table = OFF")) {
                warn!("could not undo failed DDL: {}", undo);
            }
            self.engine.take_cast_warnings();
            self.registry.restore(snapshot);
            return Err(self.describe_ddl_duplicate(&plan, err));
        }

        self.registry.mark_current(self.engine.as_ref())?;
        info!(
            "applied {} catalog mutations with {} native statements",
            plan.mutations.len(),
            plan.statements.len()
        );

        let dropped = self.session.current_database.as_deref().map_or(false, |db| {
            !db.eq_ignore_ascii_case(INFORMATION_SCHEMA) && !self.registry.read().has_database(db)
        });
        if dropped {
            self.session.current_database = None;
        }

        let mut outcome = Outcome {
            warnings: plan.notes,
            ..Default::default()
        };
        outcome
            .warnings
            .extend(self.engine.take_cast_warnings().iter().map(Warning::from));
        Ok(outcome)
    }

    fn apply_ddl(&self, plan: &DdlPlan) -> Result<()> {
        for stmt in &plan.statements {
            debug!("ddl: {}", stmt.sql);
            self.engine.execute_native(&stmt.sql, &stmt.params)?;
        }
        self.registry.apply(&plan.mutations)?;
        if !plan.temporary {
            self.registry.persist(self.engine.as_ref())?;
        }
        Ok(())
    }

    // ---- transactions -----------------------------------------------------

    fn transaction(&mut self, control: TransactionControl) -> Result<()> {
        if matches!(control, TransactionControl::Savepoint(_)) {
            self.begin_implicit()?;
        }
        let state = &mut self.session.transaction;
        let actions = match &control {
            TransactionControl::Begin => state.begin(),
            TransactionControl::Commit => state.commit(),
            TransactionControl::Rollback => state.rollback(),
            TransactionControl::Savepoint(name) => state.savepoint(name),
            TransactionControl::Release(name) => state.release(name)?,
            TransactionControl::RollbackTo(name) => state.rollback_to(name)?,
        };
        self.run_actions(&actions)
    }

    /// With `autocommit=0` the first statement opens a transaction.
    fn begin_implicit(&mut self) -> Result<()> {
        if self.session.autocommit {
            return Ok(());
        }
        let actions = self.session.transaction.begin_implicit();
        self.run_actions(&actions)
    }

    fn run_actions(&mut self, actions: &[TxAction]) -> Result<()> {
        for action in actions {
            debug!("transaction: {:?}", action);
            match action {
                TxAction::Begin => {
                    self.engine.begin()?;
                    self.begin_catalog = Some(self.registry.snapshot());
                    self.savepoint_catalogs.clear();
                }
                TxAction::Commit => {
                    self.begin_catalog = None;
                    self.savepoint_catalogs.clear();
                    self.engine.commit()?;
                }
                TxAction::Rollback => {
                    self.savepoint_catalogs.clear();
                    if let Some(catalog) = self.begin_catalog.take() {
                        self.registry.restore_temporary(&catalog);
                    }
                    self.engine.rollback()?;
                }
                TxAction::Savepoint(name) => {
                    self.engine.savepoint(name)?;
                    self.savepoint_catalogs.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
                    self.savepoint_catalogs.push((name.clone(), self.registry.snapshot()));
                }
                TxAction::Release(name) => {
                    self.engine.release(name)?;
                    if let Some(pos) = self.savepoint_position(name) {
                        self.savepoint_catalogs.truncate(pos);
                    }
                }
                TxAction::RollbackTo(name) => {
                    self.engine.rollback_to(name)?;
                    if let Some(pos) = self.savepoint_position(name) {
                        self.registry.restore_temporary(&self.savepoint_catalogs[pos].1);
                        self.savepoint_catalogs.truncate(pos + 1);
                    }
                }
            }
        }
        Ok(())
    }

    fn savepoint_position(&self, name: &str) -> Option<usize> {
        self.savepoint_catalogs
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    // ---- session ----------------------------------------------------------

    fn session_plan(&mut self, plan: SessionPlan) -> Result<()> {
        match plan {
            SessionPlan::Use(database) => self.session.current_database = Some(database),
            SessionPlan::Set(actions) => {
                for action in actions {
                    self.assign(action)?;
                }
            }
            SessionPlan::SetNames { charset, collation } => self.session.set_names(&charset, collation.as_deref()),
            SessionPlan::Noop => {}
        }
        Ok(())
    }

    fn assign(&mut self, action: SetAction) -> Result<()> {
        match action {
            SetAction::User { name, value } => {
                let value = match value {
                    SetValue::Literal(v) => v,
                    SetValue::Query(stmt) => self.evaluate(&stmt)?,
                    SetValue::Default => Value::Null,
                };
                self.session.set_user_variable(&name, value);
            }
            SetAction::System { name, value } => {
                let autocommit = self.session.autocommit;
                let change = match value {
                    SetValue::Default => self.session.reset_system_variable(&name)?,
                    SetValue::Literal(v) => self.session.set_system_variable(&name, &v)?,
                    SetValue::Query(stmt) => {
                        let v = self.evaluate(&stmt)?;
                        self.session.set_system_variable(&name, &v)?
                    }
                };
                match change {
                    SessionChange::ForeignKeyChecks(on) => self.engine.set_foreign_key_checks(on)?,
                    // switching autocommit back on commits the open transaction
                    SessionChange::Autocommit(true) if !autocommit => {
                        let actions = self.session.transaction.commit();
                        self.run_actions(&actions)?;
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, stmt: &NativeStatement) -> Result<Value> {
        let rows = self.engine.query_native(&stmt.sql, &stmt.params)?;
        Ok(rows.scalar().cloned().unwrap_or(Value::Null))
    }

    /// Set a variable as `SET` would: `@name` is a user variable, anything
    /// else (optionally `@@`, `session.` or `global.` qualified) a system one.
    pub fn set_session_variable(&mut self, name: &str, value: Value) -> Result<()> {
        let action = match name.strip_prefix('@') {
            Some(user) if !user.starts_with('@') => SetAction::User {
                name: user.to_string(),
                value: SetValue::Literal(value),
            },
            _ => {
                let bare = name.trim_start_matches('@');
                let lower = bare.to_ascii_lowercase();
                let bare = lower
                    .strip_prefix("session.")
                    .or_else(|| lower.strip_prefix("global."))
                    .unwrap_or(&lower);
                self.session.system_variable(bare)?;
                SetAction::System {
                    name: bare.to_string(),
                    value: SetValue::Literal(value),
                }
            }
        };
        self.assign(action)
    }

    /// `USE name`
    pub fn use_database(&mut self, name: &str) -> Result<()> {
        self.registry.reload_if_stale(self.engine.as_ref())?;
        let database = if name.eq_ignore_ascii_case(INFORMATION_SCHEMA) {
            INFORMATION_SCHEMA.to_string()
        } else {
            self.registry
                .read()
                .database(name)
                .map(|db| db.name.clone())
                .ok_or_else(|| CatalogError::UnknownDatabase(name.to_string()))?
        };
        self.session.current_database = Some(database);
        Ok(())
    }

    // ---- accessors --------------------------------------------------------

    /// `LAST_INSERT_ID()`. Generated ids come from the native rowid, so
    /// they always fit.
    pub fn last_insert_id(&self) -> i64 {
        i64::try_from(self.session.last_insert_id).unwrap_or(i64::MAX)
    }

    /// `ROW_COUNT()`: affected rows of the last statement, -1 after a result set.
    pub fn last_row_count(&self) -> i64 {
        self.session.last_row_count
    }

    /// Columns of the last result set; empty after other statements.
    pub fn last_column_metadata(&self) -> &[ColumnMeta] {
        &self.session.last_columns
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.session.warnings
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn in_transaction(&self) -> bool {
        self.session.transaction.is_active()
    }

    // ---- maintenance ------------------------------------------------------

    /// Compare the catalog with the native schema. Each returned line
    /// describes one difference; an empty list means they agree.
    pub fn validate_schema(&self) -> Result<Vec<String>> {
        let catalog = self.registry.read();
        let engine = self.engine.as_ref();
        let mut drift = Vec::new();

        let mut triggers: AHashSet<String> = AHashSet::new();
        for master in ["main.sqlite_master", "sqlite_temp_master"] {
            let rows = engine.query_native(&format!("SELECT name FROM {} WHERE type = 'trigger'", master), &[])?;
            triggers.extend(rows.rows.iter().filter_map(|r| r.first().and_then(Value::to_text)));
        }

        for table in catalog.tables().chain(catalog.temporary_tables()) {
            let schema = schema_of(table);
            let native = catalog.native_name(table);
            let label = format!("{}.{}", table.database, table.name);
            if !engine.table_exists(schema, &native)? {
                drift.push(format!("table {} has no native table {}", label, native));
                continue;
            }

            let expected: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
            let actual: Vec<String> = engine
                .table_columns(schema, &native)?
                .into_iter()
                .map(|c| c.name)
                .collect();
            let same = expected.len() == actual.len()
                && expected.iter().zip(&actual).all(|(e, a)| e.eq_ignore_ascii_case(a));
            if !same {
                drift.push(format!(
                    "table {}: catalog columns ({}) differ from native columns ({})",
                    label,
                    expected.join(", "),
                    actual.join(", ")
                ));
            }

            let indexes = engine.index_names(schema, &native)?;
            for index in index_set(&catalog, table) {
                if !indexes.iter().any(|n| n.eq_ignore_ascii_case(&index.name)) {
                    drift.push(format!("table {}: native index {} is missing", label, index.name));
                }
            }
            for trigger in trigger_set(&catalog, table) {
                if !triggers.contains(&trigger.name) {
                    drift.push(format!("table {}: native trigger {} is missing", label, trigger.name));
                }
            }
        }

        let known: AHashSet<String> = catalog
            .tables()
            .map(|t| catalog.native_name(t).to_ascii_lowercase())
            .collect();
        let rows = engine.query_native(
            "SELECT name FROM main.sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'",
            &[],
        )?;
        for name in rows.rows.iter().filter_map(|r| r.first().and_then(Value::to_text)) {
            if !is_internal_table(&name) && !known.contains(&name.to_ascii_lowercase()) {
                drift.push(format!("native table {} is not in the catalog", name));
            }
        }

        for line in &drift {
            warn!("schema drift: {}", line);
        }
        Ok(drift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> Driver {
        Driver::open(DriverConfig::in_memory("app")).unwrap()
    }

    fn scalar(driver: &mut Driver, sql: &str) -> Option<String> {
        let result = driver.execute(sql).unwrap();
        result.rows[0][0].clone()
    }

    fn column(driver: &mut Driver, sql: &str) -> Vec<Option<String>> {
        let result = driver.execute(sql).unwrap();
        result.rows.into_iter().map(|mut r| r.remove(0)).collect()
    }

    #[test]
    fn test_insert_and_select() {
        let mut d = driver();
        d.execute("CREATE TABLE users (id INT AUTO_INCREMENT PRIMARY KEY, name VARCHAR(40) NOT NULL)")
            .unwrap();
        let result = d.execute("INSERT INTO users (name) VALUES ('alice'), ('bob')").unwrap();
        assert_eq!(result.affected_rows, 2);
        assert_eq!(result.last_insert_id, 1);
        assert_eq!(d.last_insert_id(), 1);
        assert_eq!(d.last_row_count(), 2);

        let result = d.execute("SELECT id, name FROM users ORDER BY id").unwrap();
        assert_eq!(result.labels(), vec!["id", "name"]);
        assert_eq!(result.get(1, "name"), Some("bob"));
        assert_eq!(d.last_row_count(), -1);
        assert_eq!(d.last_column_metadata().len(), 2);
        assert_eq!(scalar(&mut d, "SELECT LAST_INSERT_ID()"), Some("1".into()));
    }

    #[test]
    fn test_drop_primary_keeps_unique() {
        let mut d = driver();
        d.execute(
            "CREATE TABLE t (id INT NOT NULL, code VARCHAR(10) NOT NULL, PRIMARY KEY (id), UNIQUE KEY uk_code (code))",
        )
        .unwrap();
        d.execute("ALTER TABLE t DROP PRIMARY KEY").unwrap();

        let kinds = d
            .execute(
                "SELECT CONSTRAINT_NAME, CONSTRAINT_TYPE FROM information_schema.TABLE_CONSTRAINTS \
                 WHERE TABLE_SCHEMA = 'app' AND TABLE_NAME = 't'",
            )
            .unwrap();
        assert_eq!(kinds.row_count(), 1);
        assert_eq!(kinds.get(0, "CONSTRAINT_NAME"), Some("uk_code"));
        assert_eq!(kinds.get(0, "CONSTRAINT_TYPE"), Some("UNIQUE"));

        d.execute("INSERT INTO t VALUES (1, 'a'), (1, 'b')").unwrap();
        let err = d.execute("INSERT INTO t VALUES (2, 'a')").unwrap_err();
        assert_eq!(err.code(), 1062);
        assert_eq!(err.to_string(), "Duplicate entry 'a' for key 't.uk_code'");
        assert!(d.validate_schema().unwrap().is_empty());
    }

    #[test]
    fn test_omitted_not_null_text_column() {
        let mut strict = driver();
        strict.execute("CREATE TABLE p (id INT, name VARCHAR(20) NOT NULL)").unwrap();
        let err = strict.execute("INSERT INTO p (id) VALUES (1)").unwrap_err();
        assert_eq!(err.code(), 1364);
        assert_eq!(err.to_string(), "Field 'name' doesn't have a default value");
        assert_eq!(scalar(&mut strict, "SELECT COUNT(*) FROM p"), Some("0".into()));

        let mut relaxed = Driver::open(DriverConfig::in_memory("app").relaxed()).unwrap();
        relaxed.execute("CREATE TABLE p (id INT, name VARCHAR(20) NOT NULL)").unwrap();
        let result = relaxed.execute("INSERT INTO p (id) VALUES (1)").unwrap();
        assert_eq!(result.affected_rows, 1);
        assert_eq!(result.warning_count, 1);
        assert_eq!(scalar(&mut relaxed, "SELECT name FROM p"), Some(String::new()));
    }

    #[test]
    fn test_drop_foreign_key_keeps_the_others() {
        let mut d = driver();
        d.execute("CREATE TABLE p (id INT PRIMARY KEY)").unwrap();
        d.execute(
            "CREATE TABLE c (id INT PRIMARY KEY, a INT, b INT, e INT, \
             CONSTRAINT f1 FOREIGN KEY (a) REFERENCES p (id), \
             CONSTRAINT f2 FOREIGN KEY (b) REFERENCES p (id), \
             CONSTRAINT f3 FOREIGN KEY (e) REFERENCES p (id))",
        )
        .unwrap();
        d.execute("ALTER TABLE c DROP FOREIGN KEY f2").unwrap();

        let create = d.execute("SHOW CREATE TABLE c").unwrap();
        let text = create.get(0, "Create Table").unwrap();
        let f1 = text.find("CONSTRAINT `f1`").unwrap();
        let f3 = text.find("CONSTRAINT `f3`").unwrap();
        assert!(f1 < f3);
        assert!(!text.contains("CONSTRAINT `f2`"));

        let names = column(
            &mut d,
            "SELECT CONSTRAINT_NAME FROM information_schema.REFERENTIAL_CONSTRAINTS WHERE TABLE_NAME = 'c'",
        );
        assert_eq!(names, vec![Some("f1".to_string()), Some("f3".to_string())]);

        // f3 is still enforced, f2 is gone
        let err = d.execute("INSERT INTO c VALUES (1, NULL, NULL, 99)").unwrap_err();
        assert_eq!(err.code(), 1452);
        d.execute("INSERT INTO c VALUES (2, NULL, 99, NULL)").unwrap();
    }

    #[test]
    fn test_nested_begin_commits() {
        let mut d = driver();
        d.execute("CREATE TABLE n (a INT)").unwrap();
        d.execute("BEGIN").unwrap();
        d.execute("INSERT INTO n VALUES (1)").unwrap();
        d.execute("BEGIN").unwrap();
        d.execute("INSERT INTO n VALUES (2)").unwrap();
        d.execute("ROLLBACK").unwrap();
        assert!(!d.in_transaction());
        assert_eq!(column(&mut d, "SELECT a FROM n"), vec![Some("1".to_string())]);

        // nothing left to roll back
        d.execute("ROLLBACK").unwrap();
        assert_eq!(column(&mut d, "SELECT a FROM n"), vec![Some("1".to_string())]);
    }

    #[test]
    fn test_like_escaping_follows_sql_mode() {
        let mut d = driver();
        assert_eq!(scalar(&mut d, "SELECT 'a_c' LIKE 'a\\_c' AS m"), Some("1".into()));
        assert_eq!(scalar(&mut d, "SELECT 'abc' LIKE 'a\\_c' AS m"), Some("0".into()));

        d.execute("SET sql_mode = 'NO_BACKSLASH_ESCAPES'").unwrap();
        assert_eq!(scalar(&mut d, "SELECT 'a_c' LIKE 'a\\_c' AS m"), Some("0".into()));
        assert_eq!(scalar(&mut d, "SELECT 'a\\_c' LIKE 'a\\_c' AS m"), Some("1".into()));
    }

    #[test]
    fn test_escaped_percent_follows_sql_mode() {
        let mut d = driver();
        assert_eq!(scalar(&mut d, "SELECT 'abc%' LIKE 'abc\\%' AS m"), Some("1".into()));
        assert_eq!(scalar(&mut d, "SELECT 'abcd' LIKE 'abc\\%' AS m"), Some("0".into()));

        d.execute("SET sql_mode = 'NO_BACKSLASH_ESCAPES'").unwrap();
        assert_eq!(scalar(&mut d, "SELECT 'abc\\xyz' LIKE 'abc\\%' AS m"), Some("1".into()));
        assert_eq!(scalar(&mut d, "SELECT 'abc%' LIKE 'abc\\%' AS m"), Some("0".into()));
    }

    #[test]
    fn test_show_create_table_round_trip() {
        let mut d = driver();
        d.execute(
            "CREATE TABLE r (id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT, \
             name VARCHAR(64) NOT NULL DEFAULT 'x', \
             created DATETIME DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP, \
             PRIMARY KEY (id), KEY idx_name (name(10))) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        )
        .unwrap();
        d.execute("INSERT INTO r (name) VALUES ('a'), ('b')").unwrap();
        let first = d.execute("SHOW CREATE TABLE r").unwrap();
        let text = first.get(0, "Create Table").unwrap().to_string();
        assert!(text.contains("AUTO_INCREMENT=3"));

        d.execute("DROP TABLE r").unwrap();
        d.execute(&text).unwrap();
        let second = d.execute("SHOW CREATE TABLE r").unwrap();
        assert_eq!(second.get(0, "Create Table"), Some(text.as_str()));
    }

    #[test]
    fn test_duplicate_entry_rolls_back_statement() {
        let mut d = driver();
        d.execute("CREATE TABLE u (id INT AUTO_INCREMENT PRIMARY KEY, email VARCHAR(50), UNIQUE KEY uk_email (email))")
            .unwrap();
        d.execute("INSERT INTO u (email) VALUES ('a')").unwrap();
        let err = d.execute("INSERT INTO u (email) VALUES ('b'), ('a')").unwrap_err();
        assert_eq!(err.to_string(), "Duplicate entry 'a' for key 'u.uk_email'");
        assert_eq!(scalar(&mut d, "SELECT COUNT(*) FROM u"), Some("1".into()));

        let err = d.execute("INSERT INTO u (email) VALUES ('c'), ('c')").unwrap_err();
        assert_eq!(err.to_string(), "Duplicate entry 'c' for key 'u.uk_email'");

        let warnings = d.execute("SHOW WARNINGS").unwrap();
        assert_eq!(warnings.get(0, "Level"), Some("Error"));
        assert_eq!(warnings.get(0, "Code"), Some("1062"));
    }

    #[test]
    fn test_statement_failure_inside_transaction_keeps_earlier_work() {
        let mut d = driver();
        d.execute("CREATE TABLE k (a INT PRIMARY KEY)").unwrap();
        d.execute("START TRANSACTION").unwrap();
        d.execute("INSERT INTO k VALUES (1)").unwrap();
        assert!(d.execute("INSERT INTO k VALUES (2), (1)").is_err());
        assert!(d.in_transaction());
        d.execute("COMMIT").unwrap();
        assert_eq!(column(&mut d, "SELECT a FROM k"), vec![Some("1".to_string())]);
    }

    #[test]
    fn test_savepoints() {
        let mut d = driver();
        d.execute("CREATE TABLE s (a INT)").unwrap();
        d.execute("BEGIN").unwrap();
        d.execute("INSERT INTO s VALUES (1)").unwrap();
        d.execute("SAVEPOINT one").unwrap();
        d.execute("INSERT INTO s VALUES (2)").unwrap();
        d.execute("SAVEPOINT two").unwrap();
        d.execute("INSERT INTO s VALUES (3)").unwrap();
        d.execute("ROLLBACK TO SAVEPOINT one").unwrap();
        assert_eq!(d.execute("RELEASE SAVEPOINT two").unwrap_err().code(), 1305);
        d.execute("COMMIT").unwrap();
        assert_eq!(column(&mut d, "SELECT a FROM s"), vec![Some("1".to_string())]);
    }

    #[test]
    fn test_temporary_table_rolled_back_with_transaction() {
        let mut d = driver();
        d.execute("BEGIN").unwrap();
        d.execute("CREATE TEMPORARY TABLE scratch (a INT)").unwrap();
        assert!(d.in_transaction());
        d.execute("INSERT INTO scratch VALUES (1)").unwrap();
        d.execute("ROLLBACK").unwrap();
        assert_eq!(d.execute("SELECT a FROM scratch").unwrap_err().code(), 1146);
    }

    #[test]
    fn test_ddl_commits_open_transaction() {
        let mut d = driver();
        d.execute("CREATE TABLE a (x INT)").unwrap();
        d.execute("BEGIN").unwrap();
        d.execute("INSERT INTO a VALUES (1)").unwrap();
        d.execute("CREATE TABLE b (y INT)").unwrap();
        assert!(!d.in_transaction());
        d.execute("ROLLBACK").unwrap();
        assert_eq!(scalar(&mut d, "SELECT COUNT(*) FROM a"), Some("1".into()));
    }

    #[test]
    fn test_autocommit_off_opens_transaction() {
        let mut d = driver();
        d.execute("CREATE TABLE ac (x INT)").unwrap();
        d.execute("SET autocommit = 0").unwrap();
        d.execute("INSERT INTO ac VALUES (1)").unwrap();
        assert!(d.in_transaction());
        d.execute("ROLLBACK").unwrap();
        d.execute("INSERT INTO ac VALUES (2)").unwrap();
        d.execute("SET autocommit = 1").unwrap();
        assert!(!d.in_transaction());
        assert_eq!(column(&mut d, "SELECT x FROM ac"), vec![Some("2".to_string())]);
    }

    #[test]
    fn test_variables() {
        let mut d = driver();
        d.execute("SET @x = 1 + 2, @y = 'text'").unwrap();
        assert_eq!(scalar(&mut d, "SELECT @x"), Some("3".into()));
        assert_eq!(scalar(&mut d, "SELECT @y"), Some("text".into()));

        d.set_session_variable("@z", Value::Integer(7)).unwrap();
        assert_eq!(scalar(&mut d, "SELECT @z"), Some("7".into()));
        d.set_session_variable("@@session.wait_timeout", Value::Integer(60)).unwrap();
        assert_eq!(scalar(&mut d, "SELECT @@wait_timeout"), Some("60".into()));
        assert_eq!(
            d.set_session_variable("no_such_variable", Value::Integer(1)).unwrap_err().code(),
            1193
        );
    }

    #[test]
    fn test_foreign_key_checks_switch() {
        let mut d = driver();
        d.execute("CREATE TABLE p (id INT PRIMARY KEY)").unwrap();
        d.execute("CREATE TABLE c (pid INT, FOREIGN KEY (pid) REFERENCES p (id))").unwrap();
        assert_eq!(d.execute("INSERT INTO c VALUES (5)").unwrap_err().code(), 1452);
        d.execute("SET foreign_key_checks = 0").unwrap();
        d.execute("INSERT INTO c VALUES (5)").unwrap();
        d.execute("SET foreign_key_checks = 1").unwrap();
        assert_eq!(d.execute("DELETE FROM p").unwrap().affected_rows, 0);
    }

    #[test]
    fn test_found_rows() {
        let mut d = driver();
        d.execute("CREATE TABLE f (a INT)").unwrap();
        d.execute("INSERT INTO f VALUES (1), (2), (3)").unwrap();
        let page = d.execute("SELECT SQL_CALC_FOUND_ROWS a FROM f ORDER BY a LIMIT 1").unwrap();
        assert_eq!(page.row_count(), 1);
        assert_eq!(scalar(&mut d, "SELECT FOUND_ROWS()"), Some("3".into()));
    }

    #[test]
    fn test_placeholders() {
        let mut d = driver();
        d.execute("CREATE TABLE q (a INT, b VARCHAR(10))").unwrap();
        d.execute_with_params("INSERT INTO q VALUES (?, ?)", &[Value::Integer(1), Value::text("x")])
            .unwrap();
        let err = d.execute_with_params("INSERT INTO q VALUES (?, ?)", &[Value::Integer(1)]).unwrap_err();
        assert_eq!(err.code(), 1210);
        assert_eq!(scalar(&mut d, "SELECT b FROM q"), Some("x".into()));
    }

    #[test]
    fn test_information_schema_is_read_only() {
        let mut d = driver();
        let err = d.execute("DELETE FROM information_schema.TABLES").unwrap_err();
        assert_eq!(err.code(), 1044);
    }

    #[test]
    fn test_use_database() {
        let mut d = driver();
        d.execute("CREATE DATABASE shop").unwrap();
        d.use_database("SHOP").unwrap();
        assert_eq!(d.session().current_database.as_deref(), Some("shop"));
        d.execute("CREATE TABLE items (id INT)").unwrap();
        assert_eq!(column(&mut d, "SHOW TABLES"), vec![Some("items".to_string())]);
        assert_eq!(d.use_database("nope").unwrap_err().code(), 1049);

        d.execute("DROP DATABASE shop").unwrap();
        assert_eq!(d.session().current_database, None);
        assert_eq!(d.execute("SELECT * FROM items").unwrap_err().code(), 1046);
    }

    #[test]
    fn test_table_status_reports_live_counts() {
        let mut d = driver();
        d.execute("CREATE TABLE ts (id INT AUTO_INCREMENT PRIMARY KEY, v INT)").unwrap();
        d.execute("INSERT INTO ts (v) VALUES (1), (2), (3)").unwrap();
        let status = d.execute("SHOW TABLE STATUS LIKE 'ts'").unwrap();
        assert_eq!(status.get(0, "Rows"), Some("3"));
        assert_eq!(status.get(0, "Auto_increment"), Some("4"));
    }

    #[test]
    fn test_validate_schema_reports_drift() {
        let mut d = driver();
        d.execute("CREATE TABLE v (a INT, b INT, KEY idx_b (b))").unwrap();
        assert!(d.validate_schema().unwrap().is_empty());

        d.engine.execute_script("DROP INDEX \"v__idx_b\"; CREATE TABLE stray (x)").unwrap();
        let drift = d.validate_schema().unwrap();
        assert_eq!(drift.len(), 2);
        assert!(drift.iter().any(|l| l.contains("v__idx_b")));
        assert!(drift.iter().any(|l| l.contains("stray")));
    }

    #[test]
    fn test_catalog_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let config = DriverConfig::in_memory("app").with_path(dir.path().join("data.db"));
        {
            let mut d = Driver::open(config.clone()).unwrap();
            d.execute("CREATE TABLE kept (id INT PRIMARY KEY, name VARCHAR(10))").unwrap();
            d.execute("INSERT INTO kept VALUES (1, 'one')").unwrap();
        }
        let mut d = Driver::open(config).unwrap();
        assert_eq!(column(&mut d, "SHOW TABLES"), vec![Some("kept".to_string())]);
        assert_eq!(scalar(&mut d, "SELECT name FROM kept"), Some("one".into()));
    }

    #[test]
    fn test_schema_change_by_other_connection_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = DriverConfig::in_memory("app").with_path(dir.path().join("shared.db"));
        let mut first = Driver::open(config.clone()).unwrap();
        let mut second = Driver::open(config).unwrap();
        first.execute("CREATE TABLE later (a INT)").unwrap();
        first.execute("INSERT INTO later VALUES (1)").unwrap();
        assert_eq!(scalar(&mut second, "SELECT a FROM later"), Some("1".into()));
    }

    #[test]
    fn test_unsigned_bigint_keeps_full_range() {
        let mut d = driver();
        d.execute("CREATE TABLE big (id INT PRIMARY KEY, v BIGINT UNSIGNED)").unwrap();
        d.execute(
            "INSERT INTO big VALUES (1, 18446744073709551615), (2, 18446744073709551000), \
             (3, 9223372036854775809), (4, 7)",
        )
        .unwrap();
        assert_eq!(
            column(&mut d, "SELECT v FROM big ORDER BY id"),
            vec![
                Some("18446744073709551615".to_string()),
                Some("18446744073709551000".to_string()),
                Some("9223372036854775809".to_string()),
                Some("7".to_string()),
            ]
        );
        assert_eq!(
            column(&mut d, "SELECT id FROM big WHERE v = 18446744073709551615"),
            vec![Some("1".to_string())]
        );
        let bound = d
            .execute_with_params("SELECT id FROM big WHERE v = ?", &[Value::Unsigned(u64::MAX)])
            .unwrap();
        assert_eq!(bound.rows, vec![vec![Some("1".to_string())]]);

        let err = d.execute("INSERT INTO big VALUES (5, 18446744073709551616)").unwrap_err();
        assert_eq!(err.code(), 1264);
    }

    #[test]
    fn test_column_metadata_carries_key_flags() {
        let mut d = driver();
        d.execute(
            "CREATE TABLE rt (id INT NOT NULL AUTO_INCREMENT, code VARCHAR(8), n INT, \
             PRIMARY KEY (id), UNIQUE KEY uq (code), KEY idx_n (n))",
        )
        .unwrap();
        d.execute("SELECT id, code, n, id + 1 AS next FROM rt").unwrap();
        let meta = d.last_column_metadata();
        assert!(meta[0].keys.primary_key);
        assert!(meta[0].keys.auto_increment);
        assert!(!meta[0].nullable);
        assert!(meta[1].keys.unique_key);
        assert!(!meta[1].keys.primary_key);
        assert!(meta[2].keys.multiple_key);
        assert_eq!(meta[3].keys, crate::formatter::KeyFlags::default());
    }

    #[test]
    fn test_unique_key_over_duplicates_names_entry() {
        let mut d = driver();
        d.execute("CREATE TABLE u (id INT PRIMARY KEY, a INT)").unwrap();
        d.execute("INSERT INTO u VALUES (1, 1), (2, 1)").unwrap();

        let err = d.execute("ALTER TABLE u ADD UNIQUE KEY uq (a)").unwrap_err();
        assert_eq!(err.code(), 1062);
        assert_eq!(err.to_string(), "Duplicate entry '1' for key 'u.uq'");

        let err = d.execute("CREATE UNIQUE INDEX uq_a ON u (a)").unwrap_err();
        assert_eq!(err.code(), 1062);
        assert_eq!(err.to_string(), "Duplicate entry '1' for key 'u.uq_a'");

        assert_eq!(column(&mut d, "SELECT a FROM u ORDER BY id").len(), 2);
        let keys = d
            .execute(
                "SELECT CONSTRAINT_NAME FROM information_schema.TABLE_CONSTRAINTS \
                 WHERE TABLE_SCHEMA = 'app' AND TABLE_NAME = 'u'",
            )
            .unwrap();
        assert_eq!(keys.row_count(), 1);
        assert_eq!(keys.get(0, "CONSTRAINT_NAME"), Some("PRIMARY"));
        assert!(d.validate_schema().unwrap().is_empty());
    }

    #[test]
    fn test_drop_index_primary_by_name() {
        let mut d = driver();
        for (table, drop) in [
            ("t", "DROP INDEX `PRIMARY` ON t"),
            ("t2", "ALTER TABLE t2 DROP INDEX `PRIMARY`"),
        ] {
            d.execute(&format!("CREATE TABLE {} (a INT PRIMARY KEY, b INT UNIQUE)", table)).unwrap();
            d.execute(drop).unwrap();
            let kinds = d
                .execute(&format!(
                    "SELECT CONSTRAINT_NAME, CONSTRAINT_TYPE FROM information_schema.TABLE_CONSTRAINTS \
                     WHERE TABLE_SCHEMA = 'app' AND TABLE_NAME = '{}'",
                    table
                ))
                .unwrap();
            assert_eq!(kinds.row_count(), 1);
            assert_eq!(kinds.get(0, "CONSTRAINT_NAME"), Some("b"));
            assert_eq!(kinds.get(0, "CONSTRAINT_TYPE"), Some("UNIQUE"));
            assert!(d.validate_schema().unwrap().is_empty());
        }
    }

    #[test]
    fn test_limit_past_unsigned_range_is_syntax_error() {
        let mut d = driver();
        let err = d.execute("SELECT 1 LIMIT 99999999999999999999").unwrap_err();
        assert_eq!(err.code(), 1064);
        assert_eq!(column(&mut d, "SELECT 1 LIMIT 18446744073709551615"), vec![Some("1".to_string())]);
    }

    #[test]
    fn test_string_number_comparison() {
        let mut d = driver();
        assert_eq!(scalar(&mut d, "SELECT 1 = '1abc' AS m"), Some("1".into()));
        assert_eq!(scalar(&mut d, "SELECT 'abc' = 0 AS m"), Some("1".into()));
        d.execute("CREATE TABLE c (n INT)").unwrap();
        d.execute("INSERT INTO c VALUES (5), (12)").unwrap();
        assert_eq!(column(&mut d, "SELECT n FROM c WHERE n > '10x'"), vec![Some("12".to_string())]);
    }

    /// Delegates to SQLite but cannot roll back to a savepoint.
    struct StuckSavepoints(SqliteEngine);

    impl NativeEngine for StuckSavepoints {
        fn execute_native(&self, sql: &str, params: &[Value]) -> Result<usize> {
            self.0.execute_native(sql, params)
        }

        fn query_native(&self, sql: &str, params: &[Value]) -> Result<RowSet> {
            self.0.query_native(sql, params)
        }

        fn execute_script(&self, sql: &str) -> Result<()> {
            self.0.execute_script(sql)
        }

        fn last_insert_rowid(&self) -> i64 {
            self.0.last_insert_rowid()
        }

        fn schema_version(&self) -> Result<i64> {
            self.0.schema_version()
        }

        fn table_columns(&self, schema: &str, table: &str) -> Result<Vec<crate::engine::NativeColumn>> {
            self.0.table_columns(schema, table)
        }

        fn index_names(&self, schema: &str, table: &str) -> Result<Vec<String>> {
            self.0.index_names(schema, table)
        }

        fn table_exists(&self, schema: &str, table: &str) -> Result<bool> {
            self.0.table_exists(schema, table)
        }

        fn set_foreign_key_checks(&self, enabled: bool) -> Result<()> {
            self.0.set_foreign_key_checks(enabled)
        }

        fn take_cast_warnings(&self) -> Vec<crate::error::CastError> {
            self.0.take_cast_warnings()
        }

        fn rollback_to(&self, _name: &str) -> Result<()> {
            Err(DriverError::native(10, "disk I/O error"))
        }
    }

    #[test]
    fn test_failed_undo_rolls_back_transaction() {
        let config = DriverConfig::in_memory("app");
        let engine = StuckSavepoints(SqliteEngine::open(&config).unwrap());
        let mut d = Driver::with_engine(Box::new(engine), config).unwrap();
        d.execute("CREATE TABLE t (id INT PRIMARY KEY)").unwrap();
        d.execute("BEGIN").unwrap();
        d.execute("INSERT INTO t VALUES (1)").unwrap();

        assert!(d.execute("INSERT INTO t VALUES (1)").is_err());
        assert!(!d.in_transaction());

        d.execute("INSERT INTO t VALUES (2)").unwrap();
        assert_eq!(column(&mut d, "SELECT id FROM t"), vec![Some("2".to_string())]);
    }
}
