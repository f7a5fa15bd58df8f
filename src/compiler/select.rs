//! SELECT compilation
//!
//! Every table is renamed to its alias natively (`"main"."t" AS "u"`) so
//! resolved references never depend on the engine's own name lookup. Select
//! items carry explicit labels; ORDER BY names a label by position.

use super::render::expr_type;
use super::scope::{Clause, Label, Scope, ScopeColumn, ScopeTable};
use super::{Compiler, Emit, Plan, Role, VirtualSource};
use crate::catalog::information_schema::{view_columns, Filter};
use crate::catalog::{fold, quote_native, INFORMATION_SCHEMA};
use crate::error::{CatalogError, DriverError, Result};
use crate::formatter::{ColumnMeta, KeyFlags};
use crate::sql::ast::{
    Expr, JoinConstraint, JoinKind, Limit, Literal, ObjectName, OrderByExpr, Query, SelectItem, SelectStmt,
    TableRef,
};

/// A compiled query and the shape of its result.
#[derive(Debug, Clone)]
pub(crate) struct CompiledQuery {
    pub sql: String,
    pub columns: Vec<ColumnMeta>,
    /// Names of the result columns inside the native query
    pub natives: Vec<String>,
}

impl CompiledQuery {
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.label.as_str())
    }
}

const UNION_ALIAS: &str = "_mysqlite_union";

impl Compiler<'_> {
    pub(crate) fn compile_select(&self, query: &Query) -> Result<Plan> {
        let mut out = Emit::default();
        let compiled = self.query(query, None, &mut out, false)?;
        let rows = out.finish(compiled.sql, Role::Rows(compiled.columns));
        if !query.select.calc_found_rows {
            return Ok(Plan::Direct(rows));
        }

        // SQL_CALC_FOUND_ROWS: count the same query without its LIMIT
        let mut unlimited = query.clone();
        unlimited.limit = None;
        let mut out = Emit::default();
        let counted = self.query(&unlimited, None, &mut out, true)?;
        let count = out.finish(
            format!("SELECT count(*) FROM ({}) AS \"_mysqlite_found\"", counted.sql),
            Role::FoundRows,
        );
        Ok(Plan::Composite(vec![Plan::Direct(rows), Plan::Direct(count)]))
    }

    /// Subquery inside an expression; sees the enclosing scope.
    pub(crate) fn subquery(&self, query: &Query, parent: &Scope<'_>, out: &mut Emit) -> Result<String> {
        Ok(self.query(query, Some(parent), out, false)?.sql)
    }

    /// Compile a query. With `positional`, result columns are named `c0`,
    /// `c1`, ... natively so duplicate labels cannot collide.
    pub(crate) fn query(
        &self,
        query: &Query,
        parent: Option<&Scope<'_>>,
        out: &mut Emit,
        positional: bool,
    ) -> Result<CompiledQuery> {
        if query.unions.is_empty() {
            return self.block(&query.select, parent, out, positional, &query.order_by, query.limit.as_ref());
        }

        let first = self.block(&query.select, parent, out, positional, &[], None)?;
        let mut sql = first.sql.clone();
        for part in &query.unions {
            let next = self.block(&part.select, parent, out, false, &[], None)?;
            if next.columns.len() != first.columns.len() {
                return Err(CatalogError::UnionArity.into());
            }
            sql.push_str(if part.all { " UNION ALL " } else { " UNION " });
            sql.push_str(&next.sql);
        }
        if query.order_by.is_empty() && query.limit.is_none() {
            return Ok(CompiledQuery { sql, ..first });
        }

        // ORDER BY / LIMIT of a union see only its result columns
        let mut scope = Scope::new(parent);
        scope.add_table(ScopeTable {
            alias: UNION_ALIAS.to_string(),
            database: String::new(),
            org_table: String::new(),
            columns: first
                .columns
                .iter()
                .zip(&first.natives)
                .map(|(meta, native)| ScopeColumn {
                    name: meta.label.clone(),
                    native: native.clone(),
                    data_type: meta.data_type.clone(),
                    schema: None,
                    binary: false,
                    merged: false,
                    keys: KeyFlags::default(),
                })
                .collect(),
        })?;
        scope.set_labels(
            first
                .columns
                .iter()
                .zip(&first.natives)
                .enumerate()
                .map(|(i, (meta, native))| Label {
                    name: meta.label.clone(),
                    sql: format!("{}.{}", quote_native(UNION_ALIAS), quote_native(native)),
                    position: i + 1,
                    column: Some((0, i)),
                })
                .collect(),
        );
        let mut wrapped = format!("SELECT * FROM ({}) AS {}", sql, quote_native(UNION_ALIAS));
        self.order_and_limit(&mut wrapped, &query.order_by, query.limit.as_ref(), &scope, first.columns.len(), out)?;
        Ok(CompiledQuery { sql: wrapped, ..first })
    }

    fn block(
        &self,
        select: &SelectStmt,
        parent: Option<&Scope<'_>>,
        out: &mut Emit,
        positional: bool,
        order_by: &[OrderByExpr],
        limit: Option<&Limit>,
    ) -> Result<CompiledQuery> {
        let mut scope = Scope::new(parent);
        let from = self.from_list(&select.from, &mut scope, out)?;

        scope.set_clause(Clause::FieldList);
        let mut items = Vec::new();
        let mut columns = Vec::new();
        let mut natives = Vec::new();
        let mut labels = Vec::new();
        let mut push = |sql: String, meta: ColumnMeta, column: Option<(usize, usize)>| {
            let native = if positional {
                format!("c{}", natives.len())
            } else {
                meta.label.clone()
            };
            items.push(format!("{} AS {}", sql, quote_native(&native)));
            labels.push(Label {
                name: meta.label.clone(),
                sql,
                position: natives.len() + 1,
                column,
            });
            natives.push(native);
            columns.push(meta);
        };

        for item in &select.columns {
            match item {
                SelectItem::Wildcard => {
                    if scope.tables.is_empty() {
                        return Err(DriverError::NotSupported("SELECT * without tables".into()));
                    }
                    for &(ti, ci) in &scope.star {
                        let column = &scope.tables[ti].columns[ci];
                        let sql = format!("{}.{}", quote_native(&scope.tables[ti].alias), quote_native(&column.native));
                        push(sql, scope.meta(&column.name, ti, ci), Some((ti, ci)));
                    }
                }
                SelectItem::QualifiedWildcard(name) => {
                    let ti = scope
                        .table_index(name.database.as_deref(), &name.name)
                        .ok_or_else(|| unknown_table(name, self.session.current_database.as_deref()))?;
                    let table = &scope.tables[ti];
                    for (ci, column) in table.columns.iter().enumerate() {
                        let sql = format!("{}.{}", quote_native(&table.alias), quote_native(&column.native));
                        push(sql, scope.meta(&column.name, ti, ci), Some((ti, ci)));
                    }
                }
                SelectItem::Expr { expr, alias, text } => {
                    let label = match (alias, expr.unnested()) {
                        (Some(alias), _) => alias.clone(),
                        (None, Expr::Column(c)) => c.column.clone(),
                        (None, _) => text.clone(),
                    };
                    let sql = self.expr(expr, &scope, out)?;
                    let (meta, column) = match expr.unnested() {
                        Expr::Column(c) => {
                            let resolved = scope.resolve(c)?;
                            match resolved.local {
                                Some((ti, ci)) => (scope.meta(&label, ti, ci), Some((ti, ci))),
                                None => (ColumnMeta::expression(&label, resolved.data_type), None),
                            }
                        }
                        e => (ColumnMeta::expression(&label, expr_type(e, &scope)), None),
                    };
                    push(sql, meta, column);
                }
            }
        }
        scope.set_labels(labels);

        let mut sql = String::from("SELECT ");
        if select.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&items.join(", "));
        if !from.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&from);
        }
        if let Some(w) = &select.where_clause {
            scope.set_clause(Clause::Where);
            sql.push_str(" WHERE ");
            sql.push_str(&self.expr(w, &scope, out)?);
        }
        if !select.group_by.is_empty() {
            scope.set_clause(Clause::GroupBy);
            let groups = select
                .group_by
                .iter()
                .map(|g| self.expr(g, &scope, out))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" GROUP BY ");
            sql.push_str(&groups.join(", "));
        }
        if let Some(h) = &select.having {
            scope.set_clause(Clause::Having);
            sql.push_str(" HAVING ");
            sql.push_str(&self.expr(h, &scope, out)?);
        }
        self.order_and_limit(&mut sql, order_by, limit, &scope, columns.len(), out)?;
        Ok(CompiledQuery { sql, columns, natives })
    }

    pub(crate) fn order_and_limit(
        &self,
        sql: &mut String,
        order_by: &[OrderByExpr],
        limit: Option<&Limit>,
        scope: &Scope<'_>,
        width: usize,
        out: &mut Emit,
    ) -> Result<()> {
        if !order_by.is_empty() {
            scope.set_clause(Clause::OrderBy);
            let mut terms = Vec::new();
            for item in order_by {
                let term = match item.expr.unnested() {
                    Expr::Column(c) if c.table.is_none() => match scope.label(&c.column)? {
                        Some(label) => label.position.to_string(),
                        None => self.expr(&item.expr, scope, out)?,
                    },
                    Expr::Literal(Literal::Number(n)) => match n.parse::<usize>() {
                        Ok(p) if (1..=width).contains(&p) => p.to_string(),
                        _ => {
                            return Err(CatalogError::NoSuchColumn {
                                column: n.clone(),
                                context: Clause::OrderBy.name().to_string(),
                            }
                            .into())
                        }
                    },
                    _ => self.expr(&item.expr, scope, out)?,
                };
                terms.push(if item.asc { term } else { format!("{} DESC", term) });
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        if let Some(limit) = limit {
            let count = self.expr(&limit.count, scope, out)?;
            sql.push_str(&format!(" LIMIT {}", count));
            if let Some(offset) = &limit.offset {
                sql.push_str(&format!(" OFFSET {}", self.expr(offset, scope, out)?));
            }
        }
        Ok(())
    }

    /// Comma-separated FROM items; adds every table to `scope`.
    pub(crate) fn from_list(&self, from: &[TableRef], scope: &mut Scope<'_>, out: &mut Emit) -> Result<String> {
        let parts = from
            .iter()
            .map(|t| self.table_ref(t, scope, out))
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(", "))
    }

    fn table_ref(&self, table: &TableRef, scope: &mut Scope<'_>, out: &mut Emit) -> Result<String> {
        match table {
            TableRef::Table { name, alias } => self.base_table(name, alias.as_deref(), scope),
            TableRef::Derived { query, alias } => {
                let compiled = self.query(query, None, out, false)?;
                let mut seen = std::collections::HashSet::new();
                for label in compiled.labels() {
                    if !seen.insert(fold(label)) {
                        return Err(CatalogError::DuplicateColumn(label.to_string()).into());
                    }
                }
                let columns = compiled
                    .columns
                    .iter()
                    .zip(&compiled.natives)
                    .map(|(meta, native)| ScopeColumn {
                        name: meta.label.clone(),
                        native: native.clone(),
                        data_type: meta.data_type.clone(),
                        schema: None,
                        binary: false,
                        merged: false,
                        keys: KeyFlags::default(),
                    })
                    .collect();
                self.push_table(
                    scope,
                    ScopeTable {
                        alias: alias.clone(),
                        database: String::new(),
                        org_table: String::new(),
                        columns,
                    },
                )?;
                Ok(format!("({}) AS {}", compiled.sql, quote_native(alias)))
            }
            TableRef::Join {
                left,
                right,
                kind,
                constraint,
            } => {
                let start = scope.star.len();
                let left_sql = self.table_ref(left, scope, out)?;
                let mid = scope.star.len();
                let right_sql = self.table_ref(right, scope, out)?;
                let right_sql = if matches!(**right, TableRef::Join { .. }) {
                    format!("({})", right_sql)
                } else {
                    right_sql
                };
                let join = match kind {
                    JoinKind::Left => "LEFT JOIN",
                    JoinKind::Right => "RIGHT JOIN",
                    JoinKind::Inner | JoinKind::Cross | JoinKind::Straight => "JOIN",
                };

                let using = match constraint {
                    JoinConstraint::On(cond) => {
                        let previous = scope.clause();
                        scope.set_clause(Clause::On);
                        let cond = self.expr(cond, scope, out)?;
                        scope.set_clause(previous);
                        return Ok(format!("{} {} {} ON {}", left_sql, join, right_sql, cond));
                    }
                    JoinConstraint::None => {
                        return Ok(format!("{} {} {}", left_sql, join, right_sql));
                    }
                    JoinConstraint::Using(columns) => columns.clone(),
                    JoinConstraint::Natural => {
                        let names = |range: &[(usize, usize)]| -> Vec<String> {
                            range
                                .iter()
                                .map(|&(ti, ci)| scope.tables[ti].columns[ci].name.clone())
                                .collect()
                        };
                        let right_names = names(&scope.star[mid..]);
                        names(&scope.star[start..mid])
                            .into_iter()
                            .filter(|n| right_names.iter().any(|r| r.eq_ignore_ascii_case(n)))
                            .collect()
                    }
                };
                if using.is_empty() {
                    return Ok(format!("{} {} {} ON 1", left_sql, join, right_sql));
                }
                let cond = self.merge_using(scope, start, mid, &using, *kind == JoinKind::Right)?;
                Ok(format!("{} {} {} ON {}", left_sql, join, right_sql, cond))
            }
        }
    }

    /// Equate the USING columns of both sides and reorder `*`: the shared
    /// columns first, then the rest of the left side, then the right side.
    fn merge_using(&self, scope: &mut Scope<'_>, start: usize, mid: usize, using: &[String], keep_right: bool) -> Result<String> {
        let find = |scope: &Scope<'_>, range: &[(usize, usize)], name: &str| {
            range
                .iter()
                .copied()
                .find(|&(ti, ci)| scope.tables[ti].columns[ci].name.eq_ignore_ascii_case(name))
        };
        let left: Vec<(usize, usize)> = scope.star[start..mid].to_vec();
        let right: Vec<(usize, usize)> = scope.star[mid..].to_vec();
        let mut shared = Vec::new();
        let mut dropped = Vec::new();
        let mut conditions = Vec::new();
        for name in using {
            let missing = || CatalogError::NoSuchColumn {
                column: name.clone(),
                context: "from clause".to_string(),
            };
            let l = find(scope, &left, name).ok_or_else(missing)?;
            let r = find(scope, &right, name).ok_or_else(missing)?;
            let sql = |(ti, ci): (usize, usize)| {
                format!(
                    "{}.{}",
                    quote_native(&scope.tables[ti].alias),
                    quote_native(&scope.tables[ti].columns[ci].native)
                )
            };
            conditions.push(format!("{} = {}", sql(l), sql(r)));
            let (kept, merged) = if keep_right { (r, l) } else { (l, r) };
            shared.push(kept);
            dropped.push(l);
            dropped.push(r);
            scope.tables[merged.0].columns[merged.1].merged = true;
        }
        let mut star = shared;
        star.extend(left.into_iter().filter(|c| !dropped.contains(c)));
        star.extend(right.into_iter().filter(|c| !dropped.contains(c)));
        scope.star.truncate(start);
        scope.star.extend(star);
        Ok(format!("({})", conditions.join(" AND ")))
    }

    pub(crate) fn push_table(&self, scope: &mut Scope<'_>, table: ScopeTable) -> Result<usize> {
        let width = table.columns.len();
        let ti = scope.add_table(table)?;
        scope.star.extend((0..width).map(|ci| (ti, ci)));
        Ok(ti)
    }

    fn base_table(&self, name: &ObjectName, alias: Option<&str>, scope: &mut Scope<'_>) -> Result<String> {
        if self.is_information_schema(name) {
            let view = name.name.to_ascii_uppercase();
            let columns = view_columns(&view).ok_or_else(|| CatalogError::NoSuchTable {
                database: INFORMATION_SCHEMA.to_string(),
                table: name.name.clone(),
            })?;
            let native = self.add_virtual(VirtualSource::InformationSchema {
                view,
                filter: Filter::default(),
            });
            let alias = alias.unwrap_or(&name.name).to_string();
            self.push_table(
                scope,
                ScopeTable {
                    alias: alias.clone(),
                    database: INFORMATION_SCHEMA.to_string(),
                    org_table: String::new(),
                    columns: columns
                        .into_iter()
                        .map(|c| ScopeColumn {
                            native: c.clone(),
                            name: c,
                            data_type: None,
                            schema: None,
                            binary: false,
                            merged: false,
                            keys: KeyFlags::default(),
                        })
                        .collect(),
                },
            )?;
            return Ok(format!("{}.{} AS {}", quote_native("temp"), quote_native(&native), quote_native(&alias)));
        }

        let table = self.table(name)?;
        let alias = alias.unwrap_or(&table.name).to_string();
        self.push_table(
            scope,
            ScopeTable {
                alias: alias.clone(),
                database: table.database.clone(),
                org_table: table.name.clone(),
                columns: table.columns.iter().map(|c| ScopeColumn::of(table, c)).collect(),
            },
        )?;
        Ok(format!("{} AS {}", self.catalog.native_ref(table), quote_native(&alias)))
    }
}

fn unknown_table(name: &ObjectName, current: Option<&str>) -> DriverError {
    CatalogError::UnknownTarget {
        table: match (&name.database, current) {
            (Some(db), _) => format!("{}.{}", db, name.name),
            _ => name.name.clone(),
        },
        clause: "field list".to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::super::testing::{catalog, direct, plan, session};
    use super::*;
    use crate::types::Value;

    fn fixture() -> crate::catalog::Catalog {
        catalog(&[
            "CREATE TABLE users (id INT AUTO_INCREMENT PRIMARY KEY, name VARCHAR(50) NOT NULL, email VARCHAR(100))",
            "CREATE TABLE orders (id INT PRIMARY KEY, user_id INT, total DECIMAL(10,2))",
        ])
    }

    #[test]
    fn test_join_group_order_limit() {
        let catalog = fixture();
        let session = session();
        let stmt = direct(plan(
            &catalog,
            &session,
            "SELECT u.name, COUNT(*) AS n FROM users u JOIN orders o ON o.user_id = u.id \
             WHERE o.total > 10 GROUP BY u.name ORDER BY n DESC LIMIT 5",
        ));
        assert_eq!(
            stmt.sql,
            "SELECT \"u\".\"name\" AS \"name\", count(*) AS \"n\" FROM \"main\".\"users\" AS \"u\" \
             JOIN \"main\".\"orders\" AS \"o\" ON (\"o\".\"user_id\" = \"u\".\"id\") \
             WHERE (\"o\".\"total\" > 10) GROUP BY \"u\".\"name\" ORDER BY 2 DESC LIMIT 5"
        );
        let Role::Rows(columns) = &stmt.role else {
            panic!("expected rows");
        };
        assert_eq!(columns[0].org_table, "users");
        assert_eq!(columns[0].table, "u");
        assert_eq!(columns[1].column_type, "bigint");
    }

    #[test]
    fn test_star_with_using_lists_shared_column_once() {
        let catalog = catalog(&[
            "CREATE TABLE a (id INT, x INT)",
            "CREATE TABLE b (y INT, id INT)",
        ]);
        let session = session();
        let stmt = direct(plan(&catalog, &session, "SELECT * FROM a JOIN b USING (id)"));
        let Role::Rows(columns) = &stmt.role else {
            panic!("expected rows");
        };
        let labels: Vec<&str> = columns.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["id", "x", "y"]);
        assert!(stmt.sql.contains("ON (\"a\".\"id\" = \"b\".\"id\")"));

        // the shared column is no longer ambiguous
        assert!(plan(&catalog, &session, "SELECT id FROM a JOIN b USING (id)").is_ok());
        let err = plan(&catalog, &session, "SELECT id FROM a JOIN b ON a.id = b.id").unwrap_err();
        assert_eq!(err.code(), 1052);
    }

    #[test]
    fn test_unknown_names() {
        let catalog = fixture();
        let session = session();
        let err = plan(&catalog, &session, "SELECT nope FROM users").unwrap_err();
        assert_eq!(err.to_string(), "Unknown column 'nope' in 'field list'");
        let err = plan(&catalog, &session, "SELECT * FROM missing").unwrap_err();
        assert_eq!(err.to_string(), "Table 'app.missing' doesn't exist");
        let err = plan(&catalog, &session, "SELECT * FROM users u, orders u").unwrap_err();
        assert_eq!(err.code(), 1066);
    }

    #[test]
    fn test_union_arity_and_order() {
        let catalog = fixture();
        let session = session();
        let err = plan(&catalog, &session, "SELECT id FROM users UNION SELECT id, total FROM orders").unwrap_err();
        assert_eq!(err.code(), 1222);

        let stmt = direct(plan(
            &catalog,
            &session,
            "SELECT id FROM users UNION ALL SELECT id FROM orders ORDER BY id DESC LIMIT 3",
        ));
        assert!(stmt.sql.starts_with("SELECT * FROM (SELECT \"users\".\"id\" AS \"id\" FROM"));
        assert!(stmt.sql.ends_with("AS \"_mysqlite_union\" ORDER BY 1 DESC LIMIT 3"));
    }

    #[test]
    fn test_derived_table_duplicate_column() {
        let catalog = fixture();
        let session = session();
        let err = plan(&catalog, &session, "SELECT * FROM (SELECT id, id FROM users) AS d").unwrap_err();
        assert_eq!(err.code(), 1060);
        assert!(plan(&catalog, &session, "SELECT d.n FROM (SELECT COUNT(*) AS n FROM users) AS d").is_ok());
    }

    #[test]
    fn test_calc_found_rows_adds_count() {
        let catalog = fixture();
        let session = session();
        let plan = plan(
            &catalog,
            &session,
            "SELECT SQL_CALC_FOUND_ROWS name FROM users WHERE name LIKE ? LIMIT 2",
        );
        let Ok(Plan::Composite(parts)) = plan else {
            panic!("expected a composite plan");
        };
        let Plan::Direct(count) = &parts[1] else {
            panic!("expected a count statement");
        };
        assert_eq!(count.role, Role::FoundRows);
        assert!(count.sql.starts_with("SELECT count(*) FROM (SELECT"));
        assert!(!count.sql.contains("LIMIT"));
        assert_eq!(count.params.len(), 1);
        assert_eq!(count.params[0], Value::Null);
    }

    #[test]
    fn test_information_schema_is_virtual() {
        let catalog = fixture();
        let session = session();
        let plan = plan(
            &catalog,
            &session,
            "SELECT TABLE_NAME FROM information_schema.TABLES WHERE TABLE_SCHEMA = 'app'",
        )
        .unwrap();
        let Plan::CatalogRead(read) = plan else {
            panic!("expected a catalog read");
        };
        assert_eq!(read.sources.len(), 1);
        assert_eq!(read.sources[0].name, "_mysqlite_tmp_v1");
        let Plan::Direct(stmt) = *read.plan else {
            panic!("expected a direct statement");
        };
        assert!(stmt.sql.contains("FROM \"temp\".\"_mysqlite_tmp_v1\" AS \"TABLES\""));
    }
}
