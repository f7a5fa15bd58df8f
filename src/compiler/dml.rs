//! INSERT, UPDATE and DELETE
//!
//! Every native INSERT lists all columns of the target: omitted columns get
//! their catalog default here, not the native DEFAULT clause, so literal
//! defaults, `CURRENT_TIMESTAMP` and expression defaults all follow the
//! session's `sql_mode`. Literal values are converted before execution;
//! everything else goes through `_mysqlite_cast` inside the engine.
//!
//! Multi-table forms become single-table native statements: UPDATE reads
//! new values through correlated subqueries, DELETE snapshots the matching
//! row ids first so that removing rows from one target cannot change what
//! matches for the next.

use super::scope::{Clause, Scope, ScopeTable, ScopeColumn};
use super::{Compiler, DuplicateContext, Emit, Generated, InsertInfo, NativeStatement, Plan, Role};
use crate::cast::{implicit_default, ColumnTarget};
use crate::catalog::{quote_native, ColumnDefault, ColumnSchema, TableSchema};
use crate::error::{CastError, CatalogError, DriverError, Result};
use crate::sql::ast::{Assignment, DeleteStmt, Expr, InsertSource, InsertStmt, TableRef, UpdateStmt};
use crate::sql::{parse_expression, LexerOptions};
use crate::types::Value;

/// Alias of the UPDATE target when its rows are matched through a join.
const UPDATE_TARGET: &str = "_mysqlite_target";

/// How a stored value relates to AUTO_INCREMENT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auto {
    Explicit,
    Generated,
    /// Decided per row by the engine
    Maybe,
}

pub(crate) fn target(column: &ColumnSchema) -> ColumnTarget {
    ColumnTarget {
        name: column.name.clone(),
        data_type: column.data_type.clone(),
        nullable: column.nullable,
    }
}

fn assignment_list(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(column, value)| format!("{} = {}", quote_native(column), value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `NOT (...)` over "column already holds the new value" tests.
fn changed_filter(guards: &[(String, String)]) -> String {
    let same: Vec<String> = guards
        .iter()
        .map(|(column, value)| format!("({} IS ({}) COLLATE BINARY)", quote_native(column), value))
        .collect();
    format!("NOT ({})", same.join(" AND "))
}

impl Compiler<'_> {
    pub(crate) fn compile_insert(&self, stmt: &InsertStmt) -> Result<Plan> {
        self.deny_information_schema(&stmt.table)?;
        let table = self.table(&stmt.table)?;
        let targets = insert_targets(table, &stmt.columns)?;
        let mut out = Emit::default();
        let mut autos = Vec::new();
        let mut known_rows = Vec::new();

        let body = match &stmt.source {
            InsertSource::Values(rows) => {
                let scope = Scope::new(None);
                let mut tuples = Vec::with_capacity(rows.len());
                for (i, row) in rows.iter().enumerate() {
                    let row_no = i + 1;
                    let all_defaults = row.is_empty() && stmt.columns.is_empty();
                    if !all_defaults && row.len() != targets.len() {
                        return Err(CatalogError::ColumnCountMismatch(row_no).into());
                    }
                    let mut cells = Vec::with_capacity(table.columns.len());
                    let mut known = Vec::new();
                    for (ci, column) in table.columns.iter().enumerate() {
                        let value = targets.iter().position(|&t| t == ci).and_then(|k| row.get(k));
                        let (sql, auto) =
                            self.insert_value(column, value, row_no, stmt.ignore, &scope, &mut out, &mut known)?;
                        if column.auto_increment {
                            autos.push(auto);
                        }
                        cells.push(sql);
                    }
                    known_rows.push(known);
                    tuples.push(format!("({})", cells.join(", ")));
                }
                format!("VALUES {}", tuples.join(", "))
            }
            InsertSource::Select(query) => {
                let compiled = self.query(query, None, &mut out, true)?;
                if compiled.columns.len() != targets.len() {
                    return Err(CatalogError::ColumnCountMismatch(1).into());
                }
                let source = quote_native("_mysqlite_src");
                let mut cells = Vec::with_capacity(table.columns.len());
                for (ci, column) in table.columns.iter().enumerate() {
                    let sql = match targets.iter().position(|&t| t == ci) {
                        Some(k) => {
                            let value = format!("{}.{}", source, quote_native(&compiled.natives[k]));
                            let (sql, auto) =
                                self.stored_sql(column, &value, "row_number() OVER ()", stmt.ignore, true, &mut out)?;
                            if column.auto_increment {
                                autos.push(auto);
                            }
                            sql
                        }
                        None if column.auto_increment => {
                            autos.push(Auto::Generated);
                            "NULL".to_string()
                        }
                        None => self.default_value(column, "row_number() OVER ()", stmt.ignore, &mut out)?,
                    };
                    cells.push(sql);
                }
                // WHERE keeps ON CONFLICT from parsing as a join constraint
                format!("SELECT {} FROM ({}) AS {} WHERE true", cells.join(", "), compiled.sql, source)
            }
        };

        let upsert = if stmt.on_duplicate.is_empty() {
            String::new()
        } else {
            let mut scope = Scope::new(None);
            self.push_table(&mut scope, self.scope_table(table, &table.name))?;
            scope.upsert = true;
            let mut sets = Vec::new();
            for assignment in &stmt.on_duplicate {
                let (_, column) = self.assigned_column(&scope, assignment)?;
                let (value, _) = self.assignment_value(column, &assignment.value, stmt.ignore, false, &scope, &mut out)?;
                sets.push((column.name.clone(), value));
            }
            format!(" ON CONFLICT DO UPDATE SET {}", assignment_list(&sets))
        };

        let verb = if stmt.replace {
            "REPLACE"
        } else if stmt.ignore {
            "INSERT OR IGNORE"
        } else {
            "INSERT"
        };
        let alias = if upsert.is_empty() {
            String::new()
        } else {
            format!(" AS {}", quote_native(&table.name))
        };
        let columns: Vec<String> = table.columns.iter().map(|c| quote_native(&c.name)).collect();
        let sql = format!(
            "{} INTO {}{} ({}) {}{}",
            verb,
            self.catalog.native_ref(table),
            alias,
            columns.join(", "),
            body,
            upsert
        );

        let generated = if autos.is_empty() || autos.iter().all(|a| *a == Auto::Explicit) {
            Generated::None
        } else if autos.iter().all(|a| *a == Auto::Generated) {
            Generated::All
        } else {
            Generated::Some
        };
        let mut native = out.finish(sql, Role::Insert(InsertInfo { generated }));
        native.keys = Some(DuplicateContext {
            database: table.database.clone(),
            table: table.name.clone(),
            rows: known_rows,
        });
        Ok(Plan::Direct(native))
    }

    pub(crate) fn compile_update(&self, stmt: &UpdateStmt) -> Result<Plan> {
        for table in &stmt.tables {
            for (name, _) in table.tables() {
                self.deny_information_schema(name)?;
            }
        }
        match stmt.tables.as_slice() {
            [TableRef::Table { .. }] => self.update_single(stmt),
            _ if !stmt.order_by.is_empty() || stmt.limit.is_some() => Err(DriverError::IncorrectArguments(
                "Incorrect usage of UPDATE and ORDER BY / LIMIT".into(),
            )),
            _ => self.update_multi(stmt),
        }
    }

    fn update_single(&self, stmt: &UpdateStmt) -> Result<Plan> {
        let mut out = Emit::default();
        let mut scope = Scope::new(None);
        let target = self.from_list(&stmt.tables, &mut scope, &mut out)?;

        let mut sets = Vec::new();
        let mut guards = Vec::new();
        for assignment in &stmt.assignments {
            let (_, column) = self.assigned_column(&scope, assignment)?;
            let (value, guard) = self.assignment_value(column, &assignment.value, stmt.ignore, true, &scope, &mut out)?;
            guards.push((column.name.clone(), guard.unwrap_or_else(|| value.clone())));
            sets.push((column.name.clone(), value));
        }

        scope.set_clause(Clause::Where);
        let mut filter = match &stmt.where_clause {
            Some(w) => Some(self.expr(w, &scope, &mut out)?),
            None => None,
        };
        if !stmt.order_by.is_empty() || stmt.limit.is_some() {
            filter = Some(self.limited_rowids(&target, &scope.tables[0].alias, filter, stmt, &scope, &mut out)?);
        }

        // unchanged rows are not counted as affected
        let changed = changed_filter(&guards);
        let condition = match filter {
            Some(f) => format!("({}) AND {}", f, changed),
            None => changed,
        };
        let sql = format!(
            "UPDATE{} {} SET {} WHERE {}",
            if stmt.ignore { " OR IGNORE" } else { "" },
            target,
            assignment_list(&sets),
            condition
        );
        Ok(Plan::Direct(out.finish(sql, Role::Affected)))
    }

    /// `rowid IN (...)` selecting the rows an ORDER BY / LIMIT clause admits.
    fn limited_rowids(
        &self,
        from: &str,
        alias: &str,
        filter: Option<String>,
        stmt: &UpdateStmt,
        scope: &Scope<'_>,
        out: &mut Emit,
    ) -> Result<String> {
        let mut sub = format!("SELECT {}.rowid FROM {}", quote_native(alias), from);
        if let Some(f) = filter {
            sub.push_str(" WHERE ");
            sub.push_str(&f);
        }
        self.order_and_limit(&mut sub, &stmt.order_by, stmt.limit.as_ref(), scope, 0, out)?;
        Ok(format!("rowid IN ({})", sub))
    }

    fn update_multi(&self, stmt: &UpdateStmt) -> Result<Plan> {
        // group assignments by the table they write to
        let mut groups: Vec<(usize, Vec<&Assignment>)> = Vec::new();
        {
            let mut scope = Scope::new(None);
            self.from_list(&stmt.tables, &mut scope, &mut Emit::default())?;
            for assignment in &stmt.assignments {
                let (ti, _) = self.assigned_column(&scope, assignment)?;
                match groups.iter_mut().find(|(t, _)| *t == ti) {
                    Some((_, list)) => list.push(assignment),
                    None => groups.push((ti, vec![assignment])),
                }
            }
        }

        let mut plans = Vec::with_capacity(groups.len());
        for (ti, assignments) in groups {
            let mut out = Emit::default();
            let mut scope = Scope::new(None);
            let from = self.from_list(&stmt.tables, &mut scope, &mut out)?;
            let entry = &scope.tables[ti];
            let table = self
                .catalog
                .lookup_table(&entry.database, &entry.org_table, true)
                .ok_or_else(|| CatalogError::NoSuchTable {
                    database: entry.database.clone(),
                    table: entry.org_table.clone(),
                })?;
            let alias = quote_native(&entry.alias);

            scope.set_clause(Clause::Where);
            let filter = match &stmt.where_clause {
                Some(w) => Some(self.expr(w, &scope, &mut out)?),
                None => None,
            };
            let key = format!("{}.rowid = {}.rowid", alias, quote_native(UPDATE_TARGET));
            let row_filter = match &filter {
                Some(f) => format!("({}) AND {}", f, key),
                None => key,
            };

            let mut sets = Vec::new();
            let mut guards = Vec::new();
            for assignment in assignments {
                scope.set_clause(Clause::FieldList);
                let (_, column) = self.assigned_column(&scope, assignment)?;
                let (value, guard) =
                    self.assignment_value(column, &assignment.value, stmt.ignore, true, &scope, &mut out)?;
                let lookup = |v: &str| format!("(SELECT {} FROM {} WHERE {} LIMIT 1)", v, from, row_filter);
                guards.push((column.name.clone(), lookup(guard.as_deref().unwrap_or(&value))));
                sets.push((column.name.clone(), lookup(&value)));
            }

            let mut matched = format!("SELECT {}.rowid FROM {}", alias, from);
            if let Some(f) = &filter {
                matched.push_str(" WHERE ");
                matched.push_str(f);
            }
            let sql = format!(
                "UPDATE{} {} AS {} SET {} WHERE rowid IN ({}) AND {}",
                if stmt.ignore { " OR IGNORE" } else { "" },
                self.catalog.native_ref(table),
                quote_native(UPDATE_TARGET),
                assignment_list(&sets),
                matched,
                changed_filter(&guards)
            );
            plans.push(Plan::Direct(out.finish(sql, Role::Affected)));
        }
        Ok(match plans.len() {
            1 => plans.remove(0),
            _ => Plan::Composite(plans),
        })
    }

    pub(crate) fn compile_delete(&self, stmt: &DeleteStmt) -> Result<Plan> {
        for target in &stmt.targets {
            self.deny_information_schema(target)?;
        }
        for table in &stmt.from {
            for (name, _) in table.tables() {
                self.deny_information_schema(name)?;
            }
        }
        if stmt.targets.is_empty() {
            self.delete_single(stmt)
        } else {
            self.delete_multi(stmt)
        }
    }

    fn delete_single(&self, stmt: &DeleteStmt) -> Result<Plan> {
        let mut out = Emit::default();
        let mut scope = Scope::new(None);
        let target = self.from_list(&stmt.from, &mut scope, &mut out)?;
        scope.set_clause(Clause::Where);
        let mut filter = match &stmt.where_clause {
            Some(w) => Some(self.expr(w, &scope, &mut out)?),
            None => None,
        };
        if !stmt.order_by.is_empty() || stmt.limit.is_some() {
            let mut sub = format!("SELECT {}.rowid FROM {}", quote_native(&scope.tables[0].alias), target);
            if let Some(f) = filter {
                sub.push_str(" WHERE ");
                sub.push_str(&f);
            }
            self.order_and_limit(&mut sub, &stmt.order_by, stmt.limit.as_ref(), &scope, 0, &mut out)?;
            filter = Some(format!("rowid IN ({})", sub));
        }
        let sql = match filter {
            Some(f) => format!("DELETE FROM {} WHERE {}", target, f),
            None => format!("DELETE FROM {}", target),
        };
        Ok(Plan::Direct(out.finish(sql, Role::Affected)))
    }

    fn delete_multi(&self, stmt: &DeleteStmt) -> Result<Plan> {
        if !stmt.order_by.is_empty() || stmt.limit.is_some() {
            return Err(DriverError::IncorrectArguments(
                "Incorrect usage of DELETE and ORDER BY / LIMIT".into(),
            ));
        }
        let mut out = Emit::default();
        let mut scope = Scope::new(None);
        let from = self.from_list(&stmt.from, &mut scope, &mut out)?;
        scope.set_clause(Clause::Where);
        let filter = match &stmt.where_clause {
            Some(w) => format!(" WHERE {}", self.expr(w, &scope, &mut out)?),
            None => String::new(),
        };

        let mut targets: Vec<(usize, &TableSchema)> = Vec::new();
        for name in &stmt.targets {
            let ti = scope
                .table_index(name.database.as_deref(), &name.name)
                .ok_or_else(|| CatalogError::UnknownTarget {
                    table: name.name.clone(),
                    clause: "MULTI DELETE".to_string(),
                })?;
            let entry = &scope.tables[ti];
            if entry.org_table.is_empty() {
                return Err(DriverError::NotSupported(format!(
                    "The target table {} of the DELETE is not updatable",
                    entry.alias
                )));
            }
            let table = self
                .catalog
                .lookup_table(&entry.database, &entry.org_table, true)
                .ok_or_else(|| CatalogError::NoSuchTable {
                    database: entry.database.clone(),
                    table: entry.org_table.clone(),
                })?;
            if !targets.iter().any(|(t, _)| *t == ti) {
                targets.push((ti, table));
            }
        }

        let scratch: Vec<String> = (1..=targets.len())
            .map(|i| quote_native(&format!("_mysqlite_tmp_del_{}", i)))
            .collect();
        let mut plans = Vec::new();
        for ((ti, _), temp) in targets.iter().zip(&scratch) {
            plans.push(Plan::Direct(NativeStatement::internal(format!("DROP TABLE IF EXISTS temp.{}", temp))));
            let snapshot = format!(
                "CREATE TEMP TABLE {} AS SELECT DISTINCT {}.rowid AS id FROM {}{}",
                temp,
                quote_native(&scope.tables[*ti].alias),
                from,
                filter
            );
            plans.push(Plan::Direct(NativeStatement {
                params: out.params.clone(),
                ..NativeStatement::internal(snapshot)
            }));
        }
        for ((_, table), temp) in targets.iter().zip(&scratch) {
            let sql = format!(
                "DELETE FROM {} WHERE rowid IN (SELECT id FROM temp.{})",
                self.catalog.native_ref(table),
                temp
            );
            plans.push(Plan::Direct(NativeStatement {
                role: Role::Affected,
                ..NativeStatement::internal(sql)
            }));
        }
        for temp in &scratch {
            plans.push(Plan::Direct(NativeStatement::internal(format!("DROP TABLE temp.{}", temp))));
        }
        Ok(Plan::Composite(plans))
    }

    /// Scope entry for a base table under `alias`.
    pub(crate) fn scope_table(&self, table: &TableSchema, alias: &str) -> ScopeTable {
        ScopeTable {
            alias: alias.to_string(),
            database: table.database.clone(),
            org_table: table.name.clone(),
            columns: table.columns.iter().map(|c| ScopeColumn::of(table, c)).collect(),
        }
    }

    /// Table index and definition of the column an assignment writes.
    fn assigned_column<'s>(&self, scope: &'s Scope<'_>, assignment: &Assignment) -> Result<(usize, &'s ColumnSchema)> {
        scope.set_clause(Clause::FieldList);
        let resolved = scope.resolve(&assignment.column)?;
        let (ti, ci) = resolved.local.ok_or_else(|| CatalogError::NoSuchColumn {
            column: assignment.column.column.clone(),
            context: Clause::FieldList.name().to_string(),
        })?;
        let entry = &scope.tables[ti];
        let column = entry.columns[ci].schema.as_ref().ok_or_else(|| {
            DriverError::NotSupported(format!("The target table {} of the UPDATE is not updatable", entry.alias))
        })?;
        Ok((ti, column))
    }

    /// SQL of an assigned value; with `guard`, also a side-effect-free
    /// variant for comparing against the current value.
    fn assignment_value(
        &self,
        column: &ColumnSchema,
        value: &Expr,
        ignore: bool,
        guard: bool,
        scope: &Scope<'_>,
        out: &mut Emit,
    ) -> Result<(String, Option<String>)> {
        match value.unnested() {
            Expr::Default => Ok((self.default_value(column, "1", ignore, out)?, None)),
            e => match self.literal_value(e) {
                Some(v) => {
                    let stored = self.store_literal(column, &v, 1, ignore, out)?;
                    Ok((out.bind(stored), None))
                }
                None => {
                    let sql = self.expr(e, scope, out)?;
                    let set = self.stored_sql(column, &sql, "1", ignore, false, out)?.0;
                    let guard = if guard {
                        Some(self.stored_sql(column, &sql, "-1", ignore, false, out)?.0)
                    } else {
                        None
                    };
                    Ok((set, guard))
                }
            },
        }
    }

    /// One cell of a VALUES row. `value` is `None` when the column was omitted.
    #[allow(clippy::too_many_arguments)]
    fn insert_value(
        &self,
        column: &ColumnSchema,
        value: Option<&Expr>,
        row_no: usize,
        ignore: bool,
        scope: &Scope<'_>,
        out: &mut Emit,
        known: &mut Vec<(String, Value)>,
    ) -> Result<(String, Auto)> {
        let row_sql = row_no.to_string();
        let e = match value.map(Expr::unnested) {
            None | Some(Expr::Default) if column.auto_increment => return Ok(("NULL".to_string(), Auto::Generated)),
            None | Some(Expr::Default) => return Ok((self.default_value(column, &row_sql, ignore, out)?, Auto::Explicit)),
            Some(e) => e,
        };
        match self.literal_value(e) {
            Some(v) if column.auto_increment && self.generates_id(&v) => Ok(("NULL".to_string(), Auto::Generated)),
            Some(v) => {
                let stored = self.store_literal(column, &v, row_no, ignore, out)?;
                known.push((column.name.clone(), stored.clone()));
                Ok((out.bind(stored), Auto::Explicit))
            }
            None => {
                let sql = self.expr(e, scope, out)?;
                self.stored_sql(column, &sql, &row_sql, ignore, true, out)
            }
        }
    }

    /// NULL, and 0 unless NO_AUTO_VALUE_ON_ZERO, ask for a generated id.
    fn generates_id(&self, value: &Value) -> bool {
        let zero = match value {
            Value::Integer(i) => *i == 0,
            Value::Unsigned(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            _ => false,
        };
        value.is_null() || (zero && !self.session.sql_mode.no_auto_value_on_zero)
    }

    /// Convert a literal before execution, collecting relaxed-mode warnings.
    fn store_literal(&self, column: &ColumnSchema, value: &Value, row: usize, ignore: bool, out: &mut Emit) -> Result<Value> {
        let mode = if ignore {
            self.session.sql_mode.relaxed()
        } else {
            self.session.sql_mode.clone()
        };
        match target(column).store(value, &mode, row) {
            Ok(stored) => {
                out.warnings.extend(stored.warning);
                Ok(stored.value)
            }
            Err(err @ CastError::NotNull { .. }) if ignore => {
                out.warnings.push(err);
                Ok(implicit_default(&column.data_type))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Engine-side conversion of a computed value.
    fn stored_sql(
        &self,
        column: &ColumnSchema,
        sql: &str,
        row_sql: &str,
        ignore: bool,
        generate: bool,
        out: &mut Emit,
    ) -> Result<(String, Auto)> {
        let mut target = target(column);
        if generate && column.auto_increment {
            target.nullable = true;
            let cast = self.cast_call(sql, &target, row_sql, ignore, out)?;
            let sql = if self.session.sql_mode.no_auto_value_on_zero {
                cast
            } else {
                format!("nullif({}, 0)", cast)
            };
            return Ok((sql, Auto::Maybe));
        }
        if ignore && !column.nullable {
            target.nullable = true;
            let cast = self.cast_call(sql, &target, row_sql, true, out)?;
            let fallback = out.bind(implicit_default(&column.data_type));
            return Ok((format!("coalesce({}, {})", cast, fallback), Auto::Explicit));
        }
        Ok((self.cast_call(sql, &target, row_sql, ignore, out)?, Auto::Explicit))
    }

    /// Value stored when a column is omitted or set to DEFAULT.
    fn default_value(&self, column: &ColumnSchema, row_sql: &str, ignore: bool, out: &mut Emit) -> Result<String> {
        match &column.default {
            ColumnDefault::Literal(v) => Ok(out.bind(v.clone())),
            ColumnDefault::CurrentTimestamp { fsp } => Ok(out.bind(Value::text(self.now.format_datetime(*fsp)))),
            ColumnDefault::Expression(text) => {
                let e = parse_expression(text, LexerOptions::default())?;
                let sql = self.expr(&e, &Scope::new(None), out)?;
                self.cast_call(&sql, &target(column), row_sql, ignore, out)
            }
            ColumnDefault::Null => Ok("NULL".to_string()),
            ColumnDefault::None if column.nullable || column.auto_increment => Ok("NULL".to_string()),
            ColumnDefault::None => {
                let err = CastError::NoDefault {
                    column: column.name.clone(),
                };
                if self.session.sql_mode.is_strict() && !ignore {
                    return Err(err.into());
                }
                out.warnings.push(err);
                Ok(out.bind(implicit_default(&column.data_type)))
            }
        }
    }
}

/// Positions of the columns an INSERT names; all columns when it names none.
fn insert_targets(table: &TableSchema, columns: &[String]) -> Result<Vec<usize>> {
    if columns.is_empty() {
        return Ok((0..table.columns.len()).collect());
    }
    let mut positions = Vec::with_capacity(columns.len());
    for name in columns {
        let position = table.column_position(name).ok_or_else(|| CatalogError::NoSuchColumn {
            column: name.clone(),
            context: Clause::FieldList.name().to_string(),
        })?;
        if positions.contains(&position) {
            return Err(CatalogError::ColumnSpecifiedTwice(table.columns[position].name.clone()).into());
        }
        positions.push(position);
    }
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{catalog, direct, plan, session};
    use super::*;
    use crate::catalog::Catalog;

    fn fixture() -> Catalog {
        catalog(&[
            "CREATE TABLE items (id INT AUTO_INCREMENT PRIMARY KEY, name VARCHAR(20) NOT NULL, qty INT DEFAULT 5)",
            "CREATE TABLE tags (item_id INT, tag VARCHAR(10))",
        ])
    }

    #[test]
    fn test_insert_lists_every_column() {
        let catalog = fixture();
        let session = session();
        let stmt = direct(plan(&catalog, &session, "INSERT INTO items (name) VALUES ('a'), ('b')"));
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"main\".\"items\" (\"id\", \"name\", \"qty\") VALUES (NULL, ?1, ?2), (NULL, ?3, ?4)"
        );
        assert_eq!(
            stmt.params,
            vec![Value::text("a"), Value::Integer(5), Value::text("b"), Value::Integer(5)]
        );
        assert_eq!(stmt.role, Role::Insert(InsertInfo { generated: Generated::All }));
        let keys = stmt.keys.unwrap();
        assert_eq!(keys.rows[1], vec![("name".to_string(), Value::text("b"))]);
    }

    #[test]
    fn test_insert_explicit_id_is_not_generated() {
        let catalog = fixture();
        let session = session();
        let stmt = direct(plan(&catalog, &session, "INSERT INTO items VALUES (7, 'x', DEFAULT)"));
        assert_eq!(stmt.params[0], Value::Integer(7));
        assert_eq!(stmt.role, Role::Insert(InsertInfo { generated: Generated::None }));

        let stmt = direct(plan(&catalog, &session, "INSERT INTO items VALUES (0, 'x', 1)"));
        assert!(stmt.sql.contains("VALUES (NULL, ?1, ?2)"));
        assert_eq!(stmt.role, Role::Insert(InsertInfo { generated: Generated::All }));
    }

    #[test]
    fn test_insert_column_errors() {
        let catalog = fixture();
        let session = session();
        let err = plan(&catalog, &session, "INSERT INTO items (name, qty) VALUES ('a')").unwrap_err();
        assert_eq!(err.code(), 1136);
        let err = plan(&catalog, &session, "INSERT INTO items (name, name) VALUES ('a', 'b')").unwrap_err();
        assert_eq!(err.code(), 1110);
        let err = plan(&catalog, &session, "INSERT INTO items (nope) VALUES (1)").unwrap_err();
        assert_eq!(err.to_string(), "Unknown column 'nope' in 'field list'");
        let err = plan(&catalog, &session, "INSERT INTO information_schema.TABLES VALUES (1)").unwrap_err();
        assert_eq!(err.code(), 1044);
    }

    #[test]
    fn test_missing_not_null_value_follows_sql_mode() {
        let catalog = fixture();
        let mut session = session();
        let err = plan(&catalog, &session, "INSERT INTO items (qty) VALUES (1)").unwrap_err();
        assert_eq!(err.code(), 1364);

        session.set_system_variable("sql_mode", &Value::text("")).unwrap();
        let stmt = direct(plan(&catalog, &session, "INSERT INTO items (qty) VALUES (1)"));
        assert_eq!(stmt.params[0], Value::text(""));
        assert_eq!(stmt.warnings.len(), 1);
        assert_eq!(stmt.warnings[0].code(), 1364);
    }

    #[test]
    fn test_explicit_null_into_not_null() {
        let catalog = fixture();
        let mut session = session();
        session.set_system_variable("sql_mode", &Value::text("")).unwrap();
        let err = plan(&catalog, &session, "INSERT INTO items (name) VALUES (NULL)").unwrap_err();
        assert_eq!(err.code(), 1048);

        let stmt = direct(plan(&catalog, &session, "INSERT IGNORE INTO items (name) VALUES (NULL)"));
        assert!(stmt.sql.starts_with("INSERT OR IGNORE INTO"));
        assert_eq!(stmt.params[0], Value::text(""));
        assert_eq!(stmt.warnings[0].code(), 1048);
    }

    #[test]
    fn test_on_duplicate_key_update() {
        let catalog = fixture();
        let session = session();
        let stmt = direct(plan(
            &catalog,
            &session,
            "INSERT INTO items (id, name) VALUES (1, 'a') ON DUPLICATE KEY UPDATE qty = qty + VALUES(qty), name = 'b'",
        ));
        assert!(stmt.sql.starts_with("INSERT INTO \"main\".\"items\" AS \"items\" (\"id\", \"name\", \"qty\")"));
        assert!(stmt.sql.contains(" ON CONFLICT DO UPDATE SET \"qty\" = _mysqlite_cast("));
        assert!(stmt.sql.contains("\"items\".\"qty\""));
        assert!(stmt.sql.contains("excluded.\"qty\""));
        assert!(stmt.sql.ends_with(", \"name\" = ?6"));
    }

    #[test]
    fn test_insert_select() {
        let catalog = fixture();
        let session = session();
        let stmt = direct(plan(&catalog, &session, "INSERT INTO tags SELECT id, name FROM items"));
        assert!(stmt.sql.starts_with("INSERT INTO \"main\".\"tags\" (\"item_id\", \"tag\") SELECT _mysqlite_cast("));
        assert!(stmt.sql.contains("\"_mysqlite_src\".\"c0\""));
        assert!(stmt.sql.ends_with("AS \"_mysqlite_src\" WHERE true"));
        let err = plan(&catalog, &session, "INSERT INTO tags SELECT id FROM items").unwrap_err();
        assert_eq!(err.code(), 1136);
    }

    #[test]
    fn test_update_skips_unchanged_rows() {
        let catalog = fixture();
        let session = session();
        let stmt = direct(plan(&catalog, &session, "UPDATE items SET qty = 3 WHERE id = 1"));
        assert_eq!(
            stmt.sql,
            "UPDATE \"main\".\"items\" AS \"items\" SET \"qty\" = ?1 \
             WHERE ((\"items\".\"id\" = 1)) AND NOT ((\"qty\" IS (?1) COLLATE BINARY))"
        );
        assert_eq!(stmt.params, vec![Value::Integer(3)]);
        assert_eq!(stmt.role, Role::Affected);
    }

    #[test]
    fn test_update_computed_value_checked_without_side_effects() {
        let catalog = fixture();
        let session = session();
        let stmt = direct(plan(&catalog, &session, "UPDATE items SET qty = qty + 1"));
        assert!(stmt.sql.contains(", 1)"));
        assert!(stmt.sql.contains(", -1)"));
    }

    #[test]
    fn test_update_order_limit_uses_rowids() {
        let catalog = fixture();
        let session = session();
        let stmt = direct(plan(&catalog, &session, "UPDATE items SET qty = 0 ORDER BY id DESC LIMIT 2"));
        assert!(stmt.sql.contains(
            "WHERE (rowid IN (SELECT \"items\".rowid FROM \"main\".\"items\" AS \"items\" \
             ORDER BY \"items\".\"id\" DESC LIMIT 2)) AND NOT"
        ));
    }

    #[test]
    fn test_multi_table_update_targets_one_table() {
        let catalog = fixture();
        let session = session();
        let stmt = direct(plan(
            &catalog,
            &session,
            "UPDATE items i JOIN tags t ON t.item_id = i.id SET t.tag = i.name WHERE i.qty > 1",
        ));
        assert!(stmt.sql.starts_with("UPDATE \"main\".\"tags\" AS \"_mysqlite_target\" SET \"tag\" = (SELECT"));
        assert!(stmt.sql.contains("\"t\".rowid = \"_mysqlite_target\".rowid LIMIT 1)"));
        assert!(stmt.sql.contains("WHERE rowid IN (SELECT \"t\".rowid FROM"));
    }

    #[test]
    fn test_delete_forms() {
        let catalog = fixture();
        let session = session();
        let stmt = direct(plan(&catalog, &session, "DELETE FROM items WHERE qty < 2"));
        assert_eq!(stmt.sql, "DELETE FROM \"main\".\"items\" AS \"items\" WHERE (\"items\".\"qty\" < 2)");

        let Plan::Composite(parts) = plan(
            &catalog,
            &session,
            "DELETE i, t FROM items i JOIN tags t ON t.item_id = i.id WHERE i.qty = 0",
        )
        .unwrap() else {
            panic!("expected a composite plan");
        };
        let affected = parts
            .iter()
            .filter(|p| matches!(p, Plan::Direct(s) if s.role == Role::Affected))
            .count();
        assert_eq!(affected, 2);

        let err = plan(&catalog, &session, "DELETE x FROM items i").unwrap_err();
        assert_eq!(err.code(), 1109);
    }
}
