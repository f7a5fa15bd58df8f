//! Name resolution
//!
//! A [`Scope`] is the set of tables visible to one query block: base tables
//! and derived tables under their aliases, plus the SELECT-list labels that
//! ORDER BY, GROUP BY and HAVING may refer to. Column references always
//! resolve to `"alias"."column"` so the native query never has to guess.

use crate::catalog::information_schema::column_charset;
use crate::catalog::{is_case_insensitive, quote_native, ColumnSchema, TableSchema};
use crate::error::{CatalogError, Result};
use crate::formatter::{ColumnMeta, KeyFlags};
use crate::sql::ast::ColumnRef;
use crate::types::{DataType, TypeFamily, Value};
use std::cell::{Cell, RefCell};

/// Clause a column reference appears in; named in "Unknown column" errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Clause {
    FieldList,
    Where,
    On,
    GroupBy,
    Having,
    OrderBy,
}

impl Clause {
    pub fn name(self) -> &'static str {
        match self {
            Clause::FieldList => "field list",
            Clause::Where => "where clause",
            Clause::On => "on clause",
            Clause::GroupBy => "group statement",
            Clause::Having => "having clause",
            Clause::OrderBy => "order clause",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ScopeColumn {
    pub name: String,
    /// Column name inside the native source
    pub native: String,
    pub data_type: Option<DataType>,
    pub schema: Option<ColumnSchema>,
    /// Compares case-sensitively (binary type or `_bin` collation)
    pub binary: bool,
    /// Joined away by USING / NATURAL: reachable qualified, not through `*`
    pub merged: bool,
    pub keys: KeyFlags,
}

impl ScopeColumn {
    pub fn of(table: &TableSchema, column: &ColumnSchema) -> Self {
        Self {
            name: column.name.clone(),
            native: column.name.clone(),
            data_type: Some(column.data_type.clone()),
            schema: Some(column.clone()),
            binary: is_binary_column(table, column),
            merged: false,
            keys: KeyFlags::of(table, column),
        }
    }
}

/// Whether comparisons on the column are case-sensitive.
pub(crate) fn is_binary_column(table: &TableSchema, column: &ColumnSchema) -> bool {
    match column_charset(table, column).1 {
        Value::Text(collation) => !is_case_insensitive(&collation),
        _ => column.data_type.family() == TypeFamily::Binary,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ScopeTable {
    pub alias: String,
    /// Empty for derived tables
    pub database: String,
    pub org_table: String,
    pub columns: Vec<ScopeColumn>,
}

impl ScopeTable {
    pub fn column(&self, name: &str) -> Option<(usize, &ScopeColumn)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name.eq_ignore_ascii_case(name))
    }

    fn matches(&self, database: Option<&str>, table: &str) -> bool {
        if !self.alias.eq_ignore_ascii_case(table) {
            return false;
        }
        match database {
            Some(db) => self.database.eq_ignore_ascii_case(db),
            None => true,
        }
    }
}

/// A SELECT-list entry visible to ORDER BY, GROUP BY and HAVING.
#[derive(Debug, Clone)]
pub(crate) struct Label {
    pub name: String,
    pub sql: String,
    /// 1-based position in the select list
    pub position: usize,
    /// Plain reference to `(table index, column index)`
    pub column: Option<(usize, usize)>,
}

/// A resolved column reference.
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
    pub sql: String,
    pub data_type: Option<DataType>,
    pub binary: bool,
    /// Position of the column when it belongs to this scope (not a parent)
    pub local: Option<(usize, usize)>,
}

pub(crate) struct Scope<'p> {
    pub tables: Vec<ScopeTable>,
    /// Columns `*` expands to, in order
    pub star: Vec<(usize, usize)>,
    parent: Option<&'p Scope<'p>>,
    clause: Cell<Clause>,
    labels: RefCell<Vec<Label>>,
    /// Render references without a table qualifier (CHECK constraints)
    pub unqualified: bool,
    /// `VALUES(col)` refers to the row being inserted
    pub upsert: bool,
}

impl<'p> Scope<'p> {
    pub fn new(parent: Option<&'p Scope<'p>>) -> Self {
        Self {
            tables: Vec::new(),
            star: Vec::new(),
            parent,
            clause: Cell::new(Clause::FieldList),
            labels: RefCell::new(Vec::new()),
            unqualified: false,
            upsert: false,
        }
    }

    /// Scope over one table's columns, referenced by bare name.
    pub fn bare(table: &TableSchema) -> Self {
        let mut scope = Self::new(None);
        scope.unqualified = true;
        scope.tables.push(ScopeTable {
            alias: table.name.clone(),
            database: table.database.clone(),
            org_table: table.name.clone(),
            columns: table.columns.iter().map(|c| ScopeColumn::of(table, c)).collect(),
        });
        scope
    }

    pub fn clause(&self) -> Clause {
        self.clause.get()
    }

    pub fn set_clause(&self, clause: Clause) {
        self.clause.set(clause);
    }

    pub fn set_labels(&self, labels: Vec<Label>) {
        *self.labels.borrow_mut() = labels;
    }

    pub fn add_table(&mut self, table: ScopeTable) -> Result<usize> {
        if self.tables.iter().any(|t| t.alias.eq_ignore_ascii_case(&table.alias)) {
            return Err(CatalogError::NotUniqueAlias(table.alias).into());
        }
        self.tables.push(table);
        Ok(self.tables.len() - 1)
    }

    pub fn table_index(&self, database: Option<&str>, alias: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.matches(database, alias))
    }

    fn column_sql(&self, table: usize, column: usize) -> String {
        let t = &self.tables[table];
        let c = &t.columns[column];
        if self.unqualified {
            quote_native(&c.native)
        } else {
            format!("{}.{}", quote_native(&t.alias), quote_native(&c.native))
        }
    }

    /// Result metadata for a column of this scope.
    pub fn meta(&self, label: &str, table: usize, column: usize) -> ColumnMeta {
        let t = &self.tables[table];
        let c = &t.columns[column];
        match &c.schema {
            Some(schema) if !t.org_table.is_empty() => {
                ColumnMeta::for_column(label, &t.database, &t.alias, &t.org_table, schema).with_keys(c.keys)
            }
            _ => {
                let mut meta = ColumnMeta::expression(label, c.data_type.clone());
                meta.name = c.name.clone();
                meta.table = t.alias.clone();
                meta
            }
        }
    }

    fn display(c: &ColumnRef) -> String {
        match (&c.database, &c.table) {
            (Some(db), Some(t)) => format!("{}.{}.{}", db, t, c.column),
            (None, Some(t)) => format!("{}.{}", t, c.column),
            _ => c.column.clone(),
        }
    }

    /// Locate a column among this scope's tables.
    fn locate(&self, c: &ColumnRef) -> Result<Option<(usize, usize)>> {
        if let Some(table) = &c.table {
            let Some(ti) = self.table_index(c.database.as_deref(), table) else {
                return Ok(None);
            };
            return Ok(self.tables[ti].column(&c.column).map(|(ci, _)| (ti, ci)));
        }
        let mut found: Option<(usize, usize)> = None;
        for (ti, t) in self.tables.iter().enumerate() {
            if let Some((ci, col)) = t.column(&c.column) {
                // A USING column appears once
                if col.merged {
                    continue;
                }
                if found.is_some() {
                    return Err(CatalogError::AmbiguousColumn {
                        column: c.column.clone(),
                        clause: self.clause().name().to_string(),
                    }
                    .into());
                }
                found = Some((ti, ci));
            }
        }
        if found.is_none() {
            // Only merged copies: take the first
            for (ti, t) in self.tables.iter().enumerate() {
                if let Some((ci, _)) = t.column(&c.column) {
                    return Ok(Some((ti, ci)));
                }
            }
        }
        Ok(found)
    }

    /// SELECT-list label matching a bare name, for ORDER BY / GROUP BY / HAVING.
    pub fn label(&self, name: &str) -> Result<Option<Label>> {
        let labels = self.labels.borrow();
        let mut matches = labels.iter().filter(|l| l.name.eq_ignore_ascii_case(name));
        let Some(first) = matches.next() else {
            return Ok(None);
        };
        if matches.any(|other| other.sql != first.sql) {
            return Err(CatalogError::AmbiguousColumn {
                column: name.to_string(),
                clause: self.clause().name().to_string(),
            }
            .into());
        }
        Ok(Some(first.clone()))
    }

    fn lookup(&self, c: &ColumnRef) -> Result<Option<Resolved>> {
        if let Some((ti, ci)) = self.locate(c)? {
            let col = &self.tables[ti].columns[ci];
            return Ok(Some(Resolved {
                sql: self.column_sql(ti, ci),
                data_type: col.data_type.clone(),
                binary: col.binary,
                local: Some((ti, ci)),
            }));
        }
        match self.parent {
            Some(parent) => Ok(parent.lookup(c)?.map(|r| Resolved { local: None, ..r })),
            None => Ok(None),
        }
    }

    /// Resolve a column reference or fail with "Unknown column".
    pub fn resolve(&self, c: &ColumnRef) -> Result<Resolved> {
        self.lookup(c)?.ok_or_else(|| {
            CatalogError::NoSuchColumn {
                column: Self::display(c),
                context: self.clause().name().to_string(),
            }
            .into()
        })
    }
}
