//! DDL compilation
//!
//! A DDL statement becomes an ordered list of catalog [`Mutation`]s plus
//! the native statements that bring the storage file in line with the
//! catalog after them. Native statements come in three steps:
//!
//! 1. drop derived objects (indexes, triggers) that vanish or change
//! 2. structural work: create, drop, rename or rebuild tables
//! 3. create derived objects that are new, changed, or belong to a table
//!    step 2 created from scratch
//!
//! Any ALTER that changes the native table definition rebuilds the table:
//! create a staging table, copy the rows through the column mapping, drop
//! the old table and rename the staging table into place.

use super::dml::target;
use super::native_schema::{all_triggers, index_set, rowid_alias, schema_of, sequence_sql, NativeIndex, NativeTrigger};
use super::render::quote_literal;
use super::scope::Scope;
use super::{note, Compiler, DdlPlan, Emit, NativeStatement, Plan, Role};
use crate::cast::implicit_default;
use crate::catalog::{
    collation_charset, default_collation, fold, is_known_charset, is_known_collation, normalize_charset,
    normalize_collation, quote_native, Catalog, CheckSchema, ColumnDefault, ColumnPlacement, ColumnSchema,
    DatabaseSchema, ForeignKeySchema, IndexKind, IndexPart, IndexSchema, Mutation, ReferentialAction, TableChange,
    TableSchema, INFORMATION_SCHEMA, RESERVED_PREFIX,
};
use crate::error::{CatalogError, DriverError, Result};
use crate::session::Warning;
use crate::sql::ast::{
    self, AlterAction, AlterTableStmt, CheckDef, ColumnDef, ColumnPosition, CreateDatabaseStmt, CreateIndexStmt,
    CreateTableStmt, DropTableStmt, Expr, ObjectName, TableConstraint, TableOptions,
};
use crate::sql::{parse_expression, LexerOptions};
use crate::types::{TypeFamily, Value};
use ahash::AHashSet;
use log::debug;

/// Native name of the staging table of a rebuild.
const STAGING_TABLE: &str = "_mysqlite_rebuild";

/// Intermediate name for renames that only change letter case.
const RENAME_TABLE: &str = "_mysqlite_rename";

fn internal(sql: String) -> NativeStatement {
    NativeStatement::internal(sql)
}

fn index_kind(kind: ast::IndexKind) -> IndexKind {
    match kind {
        ast::IndexKind::Regular => IndexKind::Regular,
        ast::IndexKind::Unique => IndexKind::Unique,
        ast::IndexKind::Fulltext => IndexKind::Fulltext,
        ast::IndexKind::Spatial => IndexKind::Spatial,
    }
}

fn referential_action(action: ast::ReferentialAction) -> ReferentialAction {
    match action {
        ast::ReferentialAction::NoAction => ReferentialAction::NoAction,
        ast::ReferentialAction::Restrict => ReferentialAction::Restrict,
        ast::ReferentialAction::Cascade => ReferentialAction::Cascade,
        ast::ReferentialAction::SetNull => ReferentialAction::SetNull,
        ast::ReferentialAction::SetDefault => ReferentialAction::SetDefault,
    }
}

fn placement(position: &Option<ColumnPosition>) -> Option<ColumnPlacement> {
    position.as_ref().map(|p| match p {
        ColumnPosition::First => ColumnPlacement::First,
        ColumnPosition::After(name) => ColumnPlacement::After(name.clone()),
    })
}

/// Column names as the table declares them.
fn declared_name(table: &TableSchema, name: &str) -> String {
    table
        .column(name)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| name.to_string())
}

fn index_parts(table: &TableSchema, parts: &[ast::IndexPart]) -> Vec<IndexPart> {
    parts
        .iter()
        .map(|p| IndexPart {
            column: declared_name(table, &p.column),
            prefix: p.prefix,
            desc: p.desc,
        })
        .collect()
}

fn engine_name(engine: &str) -> String {
    match engine.to_ascii_lowercase().as_str() {
        "myisam" => "MyISAM",
        "memory" | "heap" => "MEMORY",
        "csv" => "CSV",
        "archive" => "ARCHIVE",
        "blackhole" => "BLACKHOLE",
        "mrg_myisam" | "merge" => "MRG_MYISAM",
        _ => "InnoDB",
    }
    .to_string()
}

/// Character set and collation named by a clause; either implies the other.
fn charset_pair(charset: Option<&str>, collation: Option<&str>) -> Result<Option<(String, String)>> {
    if let Some(charset) = charset {
        if !is_known_charset(charset) {
            return Err(CatalogError::UnknownCharset(charset.to_string()).into());
        }
    }
    match (charset, collation) {
        (_, Some(collation)) => {
            if !is_known_collation(collation) {
                return Err(CatalogError::UnknownCollation(collation.to_string()).into());
            }
            let collation = normalize_collation(collation);
            Ok(Some((collation_charset(&collation), collation)))
        }
        (Some(charset), None) => {
            let charset = normalize_charset(charset);
            let collation = default_collation(&charset);
            Ok(Some((charset, collation)))
        }
        (None, None) => Ok(None),
    }
}

/// Constraint names a statement spells out, so generated names avoid them.
#[derive(Default)]
struct ExplicitNames {
    checks: Vec<String>,
    foreign_keys: Vec<String>,
}

impl ExplicitNames {
    fn collect<'s>(columns: impl Iterator<Item = &'s ColumnDef>, constraints: impl Iterator<Item = &'s TableConstraint>) -> Self {
        let mut names = ExplicitNames::default();
        for column in columns {
            if let Some(name) = column.check.as_ref().and_then(|c| c.name.as_ref()) {
                names.checks.push(fold(name));
            }
        }
        for constraint in constraints {
            match constraint {
                TableConstraint::Check(CheckDef { name: Some(name), .. }) => names.checks.push(fold(name)),
                TableConstraint::ForeignKey { name: Some(name), .. } => names.foreign_keys.push(fold(name)),
                _ => {}
            }
        }
        names
    }
}

/// Where each column of the altered table takes its rows from: the name
/// it had before the ALTER, or nothing for added columns.
fn column_origins(old: &TableSchema, changes: &[TableChange]) -> Vec<(String, Option<String>)> {
    let mut columns: Vec<(String, Option<String>)> = old
        .columns
        .iter()
        .map(|c| (c.name.clone(), Some(c.name.clone())))
        .collect();
    for change in changes {
        match change {
            TableChange::AddColumn { column, .. } => columns.push((column.name.clone(), None)),
            TableChange::DropColumn(name) => columns.retain(|(n, _)| !n.eq_ignore_ascii_case(name)),
            TableChange::ModifyColumn { name, column, .. } => {
                if let Some(entry) = columns.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
                    entry.0 = column.name.clone();
                }
            }
            _ => {}
        }
    }
    columns
}

fn find_table<'c>(catalog: &'c Catalog, database: &str, name: &str, temporary: bool) -> Result<&'c TableSchema> {
    let found = if temporary {
        catalog.temporary_table(database, name)
    } else {
        catalog.lookup_table(database, name, false)
    };
    found.ok_or_else(|| {
        CatalogError::NoSuchTable {
            database: database.to_string(),
            table: name.to_string(),
        }
        .into()
    })
}

/// Indexes and triggers derived from a catalog state.
struct Derived {
    indexes: Vec<NativeIndex>,
    triggers: Vec<NativeTrigger>,
}

impl Derived {
    fn of(catalog: &Catalog) -> Self {
        Self {
            indexes: catalog
                .tables()
                .chain(catalog.temporary_tables())
                .flat_map(|t| index_set(catalog, t))
                .collect(),
            triggers: all_triggers(catalog),
        }
    }
}

impl Compiler<'_> {
    // ---- plans ----------------------------------------------------------

    /// Validate `mutations` against a copy of the catalog and derive the
    /// native statements that project them.
    pub(crate) fn ddl_plan(&self, mutations: Vec<Mutation>, notes: Vec<Warning>) -> Result<Plan> {
        let mut current = self.catalog.clone();
        let mut structural = Vec::new();
        let mut fresh: AHashSet<(&'static str, String)> = AHashSet::new();
        for mutation in &mutations {
            let before = current.clone();
            current.apply(mutation)?;
            self.project(mutation, &before, &current, &mut structural, &mut fresh)?;
        }

        let old = Derived::of(self.catalog);
        let new = Derived::of(&current);
        let rebuilt = |schema: &'static str, table: &str| fresh.contains(&(schema, table.to_string()));

        let mut statements = Vec::new();
        for trigger in old.triggers.iter().filter(|t| !new.triggers.contains(t)) {
            statements.push(internal(trigger.drop_sql()));
        }
        for index in old.indexes.iter().filter(|i| !new.indexes.contains(i)) {
            statements.push(internal(index.drop_sql()));
        }
        statements.extend(structural);
        for index in new
            .indexes
            .iter()
            .filter(|i| !old.indexes.contains(i) || rebuilt(i.schema, &i.table))
        {
            statements.push(internal(index.sql.clone()));
        }
        for trigger in new
            .triggers
            .iter()
            .filter(|t| !old.triggers.contains(t) || rebuilt(t.schema, &t.table))
        {
            statements.push(internal(trigger.sql.clone()));
        }

        let temporary = !mutations.is_empty() && mutations.iter().all(Mutation::is_temporary);
        debug!("ddl: {} mutations, {} native statements", mutations.len(), statements.len());
        Ok(Plan::Ddl(DdlPlan {
            mutations,
            statements,
            temporary,
            notes,
        }))
    }

    /// Structural native statements for one mutation.
    fn project(
        &self,
        mutation: &Mutation,
        before: &Catalog,
        after: &Catalog,
        out: &mut Vec<NativeStatement>,
        fresh: &mut AHashSet<(&'static str, String)>,
    ) -> Result<()> {
        match mutation {
            Mutation::CreateDatabase(_) => {}
            Mutation::DropDatabase(name) => {
                for table in before
                    .tables()
                    .chain(before.temporary_tables())
                    .filter(|t| t.database.eq_ignore_ascii_case(name))
                {
                    out.push(internal(format!("DROP TABLE IF EXISTS {}", before.native_ref(table))));
                }
            }
            Mutation::CreateTable(created) => {
                let table = find_table(after, &created.database, &created.name, created.temporary)?;
                let native = after.native_name(table);
                out.push(internal(self.create_table_sql(table, &native)?));
                if let (Some(next), Some(_)) = (table.auto_increment, rowid_alias(table)) {
                    out.extend(sequence_sql(schema_of(table), &native, next).into_iter().map(internal));
                }
                fresh.insert((schema_of(table), native));
            }
            Mutation::DropTable {
                database,
                name,
                temporary,
            } => {
                let table = find_table(before, database, name, *temporary)?;
                out.push(internal(format!("DROP TABLE {}", before.native_ref(table))));
            }
            Mutation::RenameTable {
                database,
                name,
                new_database,
                new_name,
            } => {
                let temporary = before.temporary_table(database, name).is_some();
                let old = find_table(before, database, name, temporary)?;
                let new = find_table(after, new_database, new_name, temporary)?;
                let (from, to) = (before.native_name(old), after.native_name(new));
                if from != to {
                    out.extend(rename_sql(schema_of(old), &from, &to));
                }
            }
            Mutation::AlterTable {
                database,
                name,
                temporary,
                changes,
            } => {
                let old = find_table(before, database, name, *temporary)?;
                let new = find_table(after, database, name, *temporary)?;
                let native = after.native_name(new);
                if self.create_table_sql(old, &native)? != self.create_table_sql(new, &native)? {
                    self.rebuild(old, new, changes, &native, out)?;
                    fresh.insert((schema_of(new), native.clone()));
                }
                for change in changes {
                    if let TableChange::SetOptions {
                        auto_increment: Some(next),
                        ..
                    } = change
                    {
                        if rowid_alias(new).is_some() {
                            out.extend(sequence_sql(schema_of(new), &native, *next).into_iter().map(internal));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Copy `old` into a table shaped like `new` and swap it into place.
    fn rebuild(
        &self,
        old: &TableSchema,
        new: &TableSchema,
        changes: &[TableChange],
        native: &str,
        out: &mut Vec<NativeStatement>,
    ) -> Result<()> {
        let schema = quote_native(schema_of(new));
        let staging = format!("{}.{}", schema, quote_native(STAGING_TABLE));
        let current = format!("{}.{}", schema, quote_native(native));
        debug!("rebuilding {} for {}.{}", native, new.database, new.name);

        out.push(internal("PRAGMA legacy_alter_table = ON".to_string()));
        out.push(internal(self.create_table_sql(new, STAGING_TABLE)?));

        let origins = column_origins(old, changes);
        let mut emit = Emit::default();
        let mut names = Vec::with_capacity(new.columns.len());
        let mut values = Vec::with_capacity(new.columns.len());
        for column in &new.columns {
            let source = origins
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(&column.name))
                .and_then(|(_, origin)| origin.as_deref())
                .and_then(|origin| old.column(origin));
            let value = match source {
                Some(source) => self.copied_value(source, column, &mut emit)?,
                None => self.added_value(column, &mut emit)?,
            };
            names.push(quote_native(&column.name));
            values.push(value);
        }
        let copy = format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            staging,
            names.join(", "),
            values.join(", "),
            current
        );
        out.push(emit.finish(copy, Role::Internal));

        if rowid_alias(old).is_some() && rowid_alias(new).is_some() {
            // keep the high-water mark even when the highest rows are gone
            let sequence = format!("{}.\"sqlite_sequence\"", schema);
            let (n, s) = (quote_literal(native), quote_literal(STAGING_TABLE));
            out.push(internal(format!(
                "INSERT INTO {q} (name, seq) SELECT {s}, coalesce(max(seq), 0) FROM {q} WHERE name IN ({n}, {s})",
                q = sequence,
                s = s,
                n = n
            )));
            out.push(internal(format!(
                "DELETE FROM {q} WHERE name = {s} AND rowid <> (SELECT max(rowid) FROM {q} WHERE name = {s})",
                q = sequence,
                s = s
            )));
        }

        out.push(internal(format!("DROP TABLE {}", current)));
        out.push(internal(format!("ALTER TABLE {} RENAME TO {}", staging, quote_native(native))));
        out.push(internal("PRAGMA legacy_alter_table = OFF".to_string()));
        Ok(())
    }

    /// An existing column's values, converted when the declared type changes.
    fn copied_value(&self, source: &ColumnSchema, column: &ColumnSchema, out: &mut Emit) -> Result<String> {
        let name = quote_native(&source.name);
        let same_type = source.data_type.column_type() == column.data_type.column_type();
        let tightened = source.nullable && !column.nullable;
        if same_type && !tightened {
            return Ok(name);
        }
        let value = if tightened && !self.session.sql_mode.is_strict() {
            format!("coalesce({}, {})", name, out.bind(implicit_default(&column.data_type)))
        } else {
            name
        };
        self.cast_call(&value, &target(column), "rowid", false, out)
    }

    /// Value an added column gets in existing rows.
    fn added_value(&self, column: &ColumnSchema, out: &mut Emit) -> Result<String> {
        match &column.default {
            ColumnDefault::Literal(v) => Ok(out.bind(v.clone())),
            ColumnDefault::CurrentTimestamp { fsp } => Ok(out.bind(Value::text(self.now.format_datetime(*fsp)))),
            ColumnDefault::Expression(text) => {
                let e = parse_expression(text, LexerOptions::default())?;
                let sql = self.expr(&e, &Scope::new(None), out)?;
                self.cast_call(&sql, &target(column), "rowid", false, out)
            }
            _ if column.nullable || column.auto_increment => Ok("NULL".to_string()),
            _ => Ok(out.bind(implicit_default(&column.data_type))),
        }
    }

    // ---- definitions ----------------------------------------------------

    fn column_schema(&self, def: &ColumnDef) -> Result<ColumnSchema> {
        let mut data_type = def.data_type.clone();
        if data_type.charset.is_some() || data_type.collation.is_some() {
            if let Some((charset, collation)) = charset_pair(data_type.charset.as_deref(), data_type.collation.as_deref())? {
                data_type.charset = data_type.charset.as_ref().map(|_| charset);
                data_type.collation = data_type.collation.as_ref().map(|_| collation);
            }
        }
        let mut column = ColumnSchema::new(def.name.clone(), data_type);
        column.nullable = def.nullable.unwrap_or(true);
        column.auto_increment = def.auto_increment;
        column.on_update_current_timestamp = def.on_update_current_timestamp;
        column.comment = def.comment.clone().unwrap_or_default();
        if let Some(default) = &def.default {
            column.default = self.column_default(default, &column)?;
        }
        if column.auto_increment && !column.default.is_none() {
            return Err(CatalogError::InvalidDefault(column.name.clone()).into());
        }
        if column.on_update_current_timestamp
            && !matches!(column.data_type.family(), TypeFamily::DateTime | TypeFamily::Timestamp)
        {
            return Err(CatalogError::InvalidOnUpdate(column.name.clone()).into());
        }
        Ok(column)
    }

    /// DEFAULT clause of `column`; literals are stored already cast.
    fn column_default(&self, e: &Expr, column: &ColumnSchema) -> Result<ColumnDefault> {
        let invalid = || DriverError::from(CatalogError::InvalidDefault(column.name.clone()));
        match e {
            Expr::Nested(inner) => return Ok(ColumnDefault::Expression(inner.unnested().to_string())),
            Expr::Function { name, args, .. } if name == "NOW" => {
                let fsp = match args.first() {
                    None => 0,
                    Some(arg) => match self.literal_value(arg) {
                        Some(Value::Integer(n)) if (0..=6).contains(&n) => n as u32,
                        _ => return Err(invalid()),
                    },
                };
                if fsp != column.data_type.fsp() {
                    return Err(invalid());
                }
                return Ok(ColumnDefault::CurrentTimestamp { fsp });
            }
            _ => {}
        }
        let value = self.literal_value(e).ok_or_else(invalid)?;
        if value.is_null() {
            return Ok(ColumnDefault::Null);
        }
        let mut strict = self.session.sql_mode.clone();
        strict.strict_all_tables = true;
        let stored = target(column).store(&value, &strict, 1).map_err(|_| invalid())?;
        Ok(ColumnDefault::Literal(stored.value))
    }

    fn check_schema(&self, table: &TableSchema, check: &CheckDef, explicit: &ExplicitNames) -> CheckSchema {
        let name = check.name.clone().unwrap_or_else(|| {
            table.next_constraint_name("chk", |n| {
                table.check(n).is_some() || explicit.checks.contains(&fold(n))
            })
        });
        CheckSchema {
            name,
            expr: check.expr.unnested().to_string(),
            enforced: check.enforced,
        }
    }

    /// PRIMARY KEY, UNIQUE and CHECK written on the column itself.
    fn inline_changes(&self, table: &TableSchema, def: &ColumnDef, explicit: &ExplicitNames) -> Vec<TableChange> {
        let mut changes = Vec::new();
        if def.primary_key {
            changes.push(TableChange::AddIndex(IndexSchema {
                name: "PRIMARY".to_string(),
                kind: IndexKind::Primary,
                parts: vec![IndexPart::column(def.name.clone())],
                visible: true,
                comment: String::new(),
            }));
        }
        if def.unique {
            changes.push(TableChange::AddIndex(IndexSchema {
                name: table.unique_index_name(&def.name),
                kind: IndexKind::Unique,
                parts: vec![IndexPart::column(def.name.clone())],
                visible: true,
                comment: String::new(),
            }));
        }
        if let Some(check) = &def.check {
            changes.push(TableChange::AddCheck(self.check_schema(table, check, explicit)));
        }
        changes
    }

    /// Changes for a table-level constraint other than FOREIGN KEY.
    fn constraint_changes(&self, table: &TableSchema, constraint: &TableConstraint, explicit: &ExplicitNames) -> Vec<TableChange> {
        match constraint {
            TableConstraint::PrimaryKey { parts, comment } => vec![TableChange::AddIndex(IndexSchema {
                name: "PRIMARY".to_string(),
                kind: IndexKind::Primary,
                parts: index_parts(table, parts),
                visible: true,
                comment: comment.clone().unwrap_or_default(),
            })],
            TableConstraint::Index {
                constraint_name,
                name,
                kind,
                parts,
                comment,
                visible,
            } => {
                let name = name.clone().or_else(|| constraint_name.clone()).unwrap_or_else(|| {
                    let first = parts.first().map(|p| declared_name(table, &p.column)).unwrap_or_default();
                    table.unique_index_name(&first)
                });
                vec![TableChange::AddIndex(IndexSchema {
                    name,
                    kind: index_kind(*kind),
                    parts: index_parts(table, parts),
                    visible: *visible,
                    comment: comment.clone().unwrap_or_default(),
                })]
            }
            TableConstraint::Check(check) => vec![TableChange::AddCheck(self.check_schema(table, check, explicit))],
            TableConstraint::ForeignKey { .. } => Vec::new(),
        }
    }

    /// FOREIGN KEY plus the index backing it when no index leads with its columns.
    fn foreign_key_changes(&self, table: &TableSchema, constraint: &TableConstraint, explicit: &ExplicitNames) -> Result<Vec<TableChange>> {
        let TableConstraint::ForeignKey {
            name,
            index_name,
            columns,
            ref_table,
            ref_columns,
            on_delete,
            on_update,
        } = constraint
        else {
            return Ok(Vec::new());
        };
        if table.temporary {
            return Err(DriverError::NotSupported("foreign keys on temporary tables".into()));
        }
        let fk_name = name.clone().unwrap_or_else(|| {
            table.next_constraint_name("ibfk", |n| {
                table.foreign_key(n).is_some() || explicit.foreign_keys.contains(&fold(n))
            })
        });
        let columns: Vec<String> = columns.iter().map(|c| declared_name(table, c)).collect();

        let ref_database = match &ref_table.database {
            Some(db) => db.clone(),
            None => table.database.clone(),
        };
        let self_reference = ref_database.eq_ignore_ascii_case(&table.database) && ref_table.name.eq_ignore_ascii_case(&table.name);
        let parent = if self_reference {
            Some(table)
        } else {
            self.catalog.lookup_table(&ref_database, &ref_table.name, false)
        };
        let (ref_database, ref_table_name, ref_columns) = match parent {
            Some(parent) => {
                let mut resolved = Vec::with_capacity(ref_columns.len());
                for column in ref_columns {
                    let found = parent.column(column).ok_or_else(|| CatalogError::ReferencedColumnMissing {
                        constraint: fk_name.clone(),
                        column: column.clone(),
                        table: parent.name.clone(),
                    })?;
                    resolved.push(found.name.clone());
                }
                (parent.database.clone(), parent.name.clone(), resolved)
            }
            None if self.session.foreign_key_checks => {
                return Err(CatalogError::ReferencedTableMissing(ref_table.name.clone()).into());
            }
            None => (ref_database, ref_table.name.clone(), ref_columns.clone()),
        };

        let mut changes = Vec::new();
        if !table.indexes.iter().any(|i| i.starts_with(&columns)) {
            let base = index_name
                .clone()
                .or_else(|| name.clone())
                .unwrap_or_else(|| columns.first().cloned().unwrap_or_default());
            changes.push(TableChange::AddIndex(IndexSchema {
                name: table.unique_index_name(&base),
                kind: IndexKind::Regular,
                parts: columns.iter().map(|c| IndexPart::column(c.clone())).collect(),
                visible: true,
                comment: String::new(),
            }));
        }
        changes.push(TableChange::AddForeignKey(ForeignKeySchema {
            name: fk_name,
            columns,
            ref_database,
            ref_table: ref_table_name,
            ref_columns,
            on_delete: referential_action(*on_delete),
            on_update: referential_action(*on_update),
        }));
        Ok(changes)
    }

    fn options_change(&self, options: &TableOptions) -> Result<TableChange> {
        let pair = charset_pair(options.charset.as_deref(), options.collation.as_deref())?;
        let (charset, collation) = match pair {
            Some((charset, collation)) => (Some(charset), Some(collation)),
            None => (None, None),
        };
        Ok(TableChange::SetOptions {
            engine: options.engine.as_deref().map(engine_name),
            charset,
            collation,
            comment: options.comment.clone(),
            auto_increment: options.auto_increment,
        })
    }

    /// Apply a change to the working copy now, so later actions of the same
    /// statement see it and errors surface in statement order.
    fn stage(&self, working: &mut TableSchema, change: TableChange, changes: &mut Vec<TableChange>) -> Result<()> {
        self.catalog.apply_change(working, &change, &mut Vec::new())?;
        changes.push(change);
        Ok(())
    }

    // ---- CREATE / DROP / RENAME TABLE -----------------------------------

    pub(super) fn compile_create_table(&self, stmt: &CreateTableStmt) -> Result<Plan> {
        self.deny_information_schema(&stmt.name)?;
        let database = self.database_of(&stmt.name)?;
        let db = self
            .catalog
            .database(&database)
            .ok_or_else(|| CatalogError::UnknownDatabase(database.clone()))?;
        let existing = if stmt.temporary {
            self.catalog.temporary_table(&db.name, &stmt.name.name)
        } else {
            self.catalog.lookup_table(&db.name, &stmt.name.name, false)
        };
        if existing.is_some() {
            if stmt.if_not_exists {
                let message = format!("Table '{}' already exists", stmt.name.name);
                return self.ddl_plan(Vec::new(), vec![note(1050, message)]);
            }
            return Err(CatalogError::TableExists(stmt.name.name.clone()).into());
        }

        let table = match &stmt.like {
            Some(source) => self.like_table(stmt, db, source)?,
            None => self.build_table(stmt, db)?,
        };
        self.ddl_plan(vec![Mutation::CreateTable(table)], Vec::new())
    }

    fn build_table(&self, stmt: &CreateTableStmt, db: &DatabaseSchema) -> Result<TableSchema> {
        let mut table = TableSchema::new(db.name.clone(), stmt.name.name.clone());
        table.temporary = stmt.temporary;
        table.charset = db.charset.clone();
        table.collation = db.collation.clone();
        let mut applied = Vec::new();
        self.stage(&mut table, self.options_change(&stmt.options)?, &mut applied)?;
        for def in &stmt.columns {
            let column = self.column_schema(def)?;
            self.stage(&mut table, TableChange::AddColumn { column, placement: None }, &mut applied)?;
        }

        let explicit = ExplicitNames::collect(stmt.columns.iter(), stmt.constraints.iter());
        for def in &stmt.columns {
            for change in self.inline_changes(&table, def, &explicit) {
                self.stage(&mut table, change, &mut applied)?;
            }
        }
        for constraint in &stmt.constraints {
            for change in self.constraint_changes(&table, constraint, &explicit) {
                self.stage(&mut table, change, &mut applied)?;
            }
        }
        // backing indexes only when no declared index serves
        for constraint in &stmt.constraints {
            for change in self.foreign_key_changes(&table, constraint, &explicit)? {
                self.stage(&mut table, change, &mut applied)?;
            }
        }
        Ok(table)
    }

    /// `CREATE TABLE t LIKE s`: same columns, indexes and checks; no foreign keys.
    fn like_table(&self, stmt: &CreateTableStmt, db: &DatabaseSchema, source: &ObjectName) -> Result<TableSchema> {
        if self.is_information_schema(source) {
            return Err(DriverError::NotSupported("CREATE TABLE ... LIKE on information_schema".into()));
        }
        let source = self.table(source)?;
        let mut table = source.clone();
        table.database = db.name.clone();
        table.name = stmt.name.name.clone();
        table.temporary = stmt.temporary;
        table.foreign_keys.clear();
        table.auto_increment = None;

        // generated check names follow the new table
        let prefix = fold(&format!("{}_chk_", source.name));
        let renamed: Vec<usize> = (0..table.checks.len())
            .filter(|&i| fold(&table.checks[i].name).starts_with(&prefix))
            .collect();
        for i in renamed {
            let name = table.next_constraint_name("chk", |n| table.check(n).is_some());
            table.checks[i].name = name;
        }
        Ok(table)
    }

    pub(super) fn compile_drop_table(&self, stmt: &DropTableStmt) -> Result<Plan> {
        let mut mutations = Vec::new();
        let mut notes = Vec::new();
        let mut dropped: Vec<&TableSchema> = Vec::new();
        for name in &stmt.names {
            self.deny_information_schema(name)?;
            let database = self.database_of(name)?;
            let table = if stmt.temporary {
                self.catalog.temporary_table(&database, &name.name)
            } else {
                self.catalog.lookup_table(&database, &name.name, true)
            };
            match table {
                Some(table) => dropped.push(table),
                None if stmt.if_exists => {
                    notes.push(note(1051, format!("Unknown table '{}.{}'", database, name.name)));
                }
                None => {
                    return Err(CatalogError::UnknownTable {
                        database,
                        table: name.name.clone(),
                    }
                    .into())
                }
            }
        }

        if self.session.foreign_key_checks {
            for table in dropped.iter().filter(|t| !t.temporary) {
                let children = self.catalog.referencing_foreign_keys(&table.database, &table.name);
                let blocking = children.into_iter().find(|(child, _)| {
                    !dropped
                        .iter()
                        .any(|d| d.temporary == child.temporary && fold(&d.database) == fold(&child.database) && fold(&d.name) == fold(&child.name))
                });
                if let Some((child, fk)) = blocking {
                    return Err(CatalogError::ReferencedByForeignKey {
                        table: table.name.clone(),
                        constraint: fk.name.clone(),
                        child: format!("{}.{}", child.database, child.name),
                    }
                    .into());
                }
            }
        }

        for table in dropped {
            mutations.push(Mutation::DropTable {
                database: table.database.clone(),
                name: table.name.clone(),
                temporary: table.temporary,
            });
        }
        self.ddl_plan(mutations, notes)
    }

    /// Renames run in order, so `a TO tmp, b TO a, tmp TO b` swaps two tables.
    pub(super) fn compile_rename_table(&self, pairs: &[(ObjectName, ObjectName)]) -> Result<Plan> {
        let mut scratch = self.catalog.clone();
        let mut mutations = Vec::new();
        for (from, to) in pairs {
            self.deny_information_schema(from)?;
            self.deny_information_schema(to)?;
            let database = self.database_of(from)?;
            let table = scratch
                .lookup_table(&database, &from.name, true)
                .ok_or_else(|| CatalogError::NoSuchTable {
                    database: database.clone(),
                    table: from.name.clone(),
                })?;
            let mutation = Mutation::RenameTable {
                database: table.database.clone(),
                name: table.name.clone(),
                new_database: self.database_of(to)?,
                new_name: to.name.clone(),
            };
            scratch.apply(&mutation)?;
            mutations.push(mutation);
        }
        self.ddl_plan(mutations, Vec::new())
    }

    /// TRUNCATE empties the table and restarts AUTO_INCREMENT; it is DDL, so
    /// it commits like one.
    pub(super) fn compile_truncate(&self, name: &ObjectName) -> Result<Plan> {
        self.deny_information_schema(name)?;
        let table = self.table(name)?;
        if self.session.foreign_key_checks && !table.temporary {
            if let Some((child, fk)) = self
                .catalog
                .referencing_foreign_keys(&table.database, &table.name)
                .into_iter()
                .find(|(child, _)| !child.temporary)
            {
                return Err(CatalogError::TruncateReferenced(format!(
                    "`{}`.`{}`, CONSTRAINT `{}`",
                    child.database, child.name, fk.name
                ))
                .into());
            }
        }
        let native = self.catalog.native_name(table);
        let mut statements = vec![internal(format!("DELETE FROM {}", self.catalog.native_ref(table)))];
        if rowid_alias(table).is_some() {
            statements.push(internal(format!(
                "DELETE FROM {}.\"sqlite_sequence\" WHERE name = {}",
                quote_native(schema_of(table)),
                quote_literal(&native)
            )));
        }
        Ok(Plan::Ddl(DdlPlan {
            mutations: Vec::new(),
            statements,
            temporary: table.temporary,
            notes: Vec::new(),
        }))
    }

    // ---- ALTER TABLE / indexes ------------------------------------------

    pub(super) fn compile_alter_table(&self, stmt: &AlterTableStmt) -> Result<Plan> {
        self.deny_information_schema(&stmt.name)?;
        let table = self.table(&stmt.name)?;
        let mut working = table.clone();
        let mut changes = Vec::new();
        let mut rename: Option<&ObjectName> = None;

        let added_columns = stmt.actions.iter().filter_map(|a| match a {
            AlterAction::AddColumn { column, .. }
            | AlterAction::ModifyColumn { column, .. }
            | AlterAction::ChangeColumn { column, .. } => Some(column),
            _ => None,
        });
        let constraints = stmt.actions.iter().filter_map(|a| match a {
            AlterAction::AddConstraint(c) => Some(c),
            _ => None,
        });
        let explicit = ExplicitNames::collect(added_columns, constraints);

        for action in &stmt.actions {
            let batch = match action {
                AlterAction::AddColumn { column, position } => {
                    let mut batch = vec![TableChange::AddColumn {
                        column: self.column_schema(column)?,
                        placement: placement(position),
                    }];
                    let mut preview = working.clone();
                    self.catalog.apply_change(&mut preview, &batch[0], &mut Vec::new())?;
                    batch.extend(self.inline_changes(&preview, column, &explicit));
                    batch
                }
                AlterAction::ModifyColumn { column, position } => {
                    self.modify_changes(&working, &column.name, column, position, &explicit)?
                }
                AlterAction::ChangeColumn {
                    old_name,
                    column,
                    position,
                } => self.modify_changes(&working, old_name, column, position, &explicit)?,
                AlterAction::RenameColumn { old_name, new_name } => {
                    let column = working.column(old_name).ok_or_else(|| CatalogError::NoSuchColumn {
                        column: old_name.clone(),
                        context: working.name.clone(),
                    })?;
                    let mut renamed = column.clone();
                    renamed.name = new_name.clone();
                    vec![TableChange::ModifyColumn {
                        name: old_name.clone(),
                        column: renamed,
                        placement: None,
                    }]
                }
                AlterAction::DropColumn(name) => vec![TableChange::DropColumn(name.clone())],
                AlterAction::AddConstraint(constraint) => self.constraint_changes(&working, constraint, &explicit),
                AlterAction::DropPrimaryKey => vec![TableChange::DropIndex("PRIMARY".to_string())],
                AlterAction::DropIndex(name) => vec![TableChange::DropIndex(name.clone())],
                AlterAction::DropForeignKey(name) => vec![TableChange::DropForeignKey(name.clone())],
                AlterAction::DropCheck(name) => vec![TableChange::DropCheck(name.clone())],
                AlterAction::DropConstraint(name) => vec![drop_constraint(&working, name)?],
                AlterAction::RenameIndex { old_name, new_name } => vec![TableChange::RenameIndex {
                    from: old_name.clone(),
                    to: new_name.clone(),
                }],
                AlterAction::RenameTable(new_name) => {
                    rename = Some(new_name);
                    Vec::new()
                }
                AlterAction::SetDefault { column, default } => {
                    let target = working.column(column).ok_or_else(|| CatalogError::NoSuchColumn {
                        column: column.clone(),
                        context: working.name.clone(),
                    })?;
                    vec![TableChange::SetDefault {
                        column: column.clone(),
                        default: self.column_default(default, target)?,
                    }]
                }
                AlterAction::DropDefault(column) => vec![TableChange::SetDefault {
                    column: column.clone(),
                    default: ColumnDefault::None,
                }],
                AlterAction::IndexVisibility { name, visible } => vec![TableChange::SetIndexVisible {
                    name: name.clone(),
                    visible: *visible,
                }],
                AlterAction::CheckEnforcement { name, enforced } => vec![TableChange::SetCheckEnforced {
                    name: name.clone(),
                    enforced: *enforced,
                }],
                AlterAction::ConvertCharset { charset, collation } => {
                    match charset_pair(Some(charset), collation.as_deref())? {
                        Some((charset, collation)) => vec![TableChange::ConvertCharset { charset, collation }],
                        None => Vec::new(),
                    }
                }
                AlterAction::Options(options) => vec![self.options_change(options)?],
            };
            for change in batch {
                self.stage(&mut working, change, &mut changes)?;
            }
        }
        for action in &stmt.actions {
            if let AlterAction::AddConstraint(constraint) = action {
                for change in self.foreign_key_changes(&working, constraint, &explicit)? {
                    self.stage(&mut working, change, &mut changes)?;
                }
            }
        }

        let mut mutations = Vec::new();
        if !changes.is_empty() {
            mutations.push(Mutation::AlterTable {
                database: table.database.clone(),
                name: table.name.clone(),
                temporary: table.temporary,
                changes,
            });
        }
        if let Some(new_name) = rename {
            self.deny_information_schema(new_name)?;
            mutations.push(Mutation::RenameTable {
                database: table.database.clone(),
                name: table.name.clone(),
                new_database: self.database_of(new_name)?,
                new_name: new_name.name.clone(),
            });
        }
        self.ddl_plan(mutations, Vec::new())
    }

    /// MODIFY / CHANGE: the new definition replaces the old one in place.
    fn modify_changes(
        &self,
        working: &TableSchema,
        old_name: &str,
        def: &ColumnDef,
        position: &Option<ColumnPosition>,
        explicit: &ExplicitNames,
    ) -> Result<Vec<TableChange>> {
        let mut batch = vec![TableChange::ModifyColumn {
            name: old_name.to_string(),
            column: self.column_schema(def)?,
            placement: placement(position),
        }];
        let mut preview = working.clone();
        self.catalog.apply_change(&mut preview, &batch[0], &mut Vec::new())?;
        batch.extend(self.inline_changes(&preview, def, explicit));
        Ok(batch)
    }

    pub(super) fn compile_create_index(&self, stmt: &CreateIndexStmt) -> Result<Plan> {
        self.deny_information_schema(&stmt.table)?;
        let table = self.table(&stmt.table)?;
        let index = IndexSchema {
            name: stmt.name.clone(),
            kind: index_kind(stmt.kind),
            parts: index_parts(table, &stmt.parts),
            visible: stmt.visible,
            comment: stmt.comment.clone().unwrap_or_default(),
        };
        self.alter(table, vec![TableChange::AddIndex(index)])
    }

    pub(super) fn compile_drop_index(&self, name: &str, table: &ObjectName) -> Result<Plan> {
        self.deny_information_schema(table)?;
        let table = self.table(table)?;
        self.alter(table, vec![TableChange::DropIndex(name.to_string())])
    }

    fn alter(&self, table: &TableSchema, changes: Vec<TableChange>) -> Result<Plan> {
        self.ddl_plan(
            vec![Mutation::AlterTable {
                database: table.database.clone(),
                name: table.name.clone(),
                temporary: table.temporary,
                changes,
            }],
            Vec::new(),
        )
    }

    // ---- databases --------------------------------------------------------

    pub(super) fn compile_create_database(&self, stmt: &CreateDatabaseStmt) -> Result<Plan> {
        if stmt.name.eq_ignore_ascii_case(INFORMATION_SCHEMA) {
            return Err(super::permission_denied());
        }
        if self.catalog.has_database(&stmt.name) {
            if stmt.if_not_exists {
                let message = format!("Can't create database '{}'; database exists", stmt.name);
                return self.ddl_plan(Vec::new(), vec![note(1007, message)]);
            }
            return Err(CatalogError::DatabaseExists(stmt.name.clone()).into());
        }
        if stmt.name.to_ascii_lowercase().starts_with(RESERVED_PREFIX) {
            return Err(CatalogError::InvalidName {
                kind: "database",
                name: stmt.name.clone(),
            }
            .into());
        }
        let config = self.session.config();
        let (charset, collation) = charset_pair(stmt.charset.as_deref(), stmt.collation.as_deref())?
            .unwrap_or_else(|| (config.default_charset.clone(), config.default_collation.clone()));
        self.ddl_plan(
            vec![Mutation::CreateDatabase(DatabaseSchema {
                name: stmt.name.clone(),
                charset,
                collation,
            })],
            Vec::new(),
        )
    }

    pub(super) fn compile_drop_database(&self, name: &str, if_exists: bool) -> Result<Plan> {
        if name.eq_ignore_ascii_case(INFORMATION_SCHEMA) {
            return Err(super::permission_denied());
        }
        let Some(db) = self.catalog.database(name) else {
            if if_exists {
                let message = format!("Can't drop database '{}'; database doesn't exist", name);
                return self.ddl_plan(Vec::new(), vec![note(1008, message)]);
            }
            return Err(CatalogError::DatabaseMissing(name.to_string()).into());
        };
        self.ddl_plan(vec![Mutation::DropDatabase(db.name.clone())], Vec::new())
    }
}

/// `DROP CONSTRAINT` resolves the name across PRIMARY, UNIQUE, FOREIGN KEY and CHECK.
fn drop_constraint(table: &TableSchema, name: &str) -> Result<TableChange> {
    if name.eq_ignore_ascii_case("PRIMARY") {
        return Ok(TableChange::DropIndex("PRIMARY".to_string()));
    }
    let unique = table
        .indexes
        .iter()
        .any(|i| i.kind == IndexKind::Unique && i.is_named(name));
    let foreign = table.foreign_key(name).is_some();
    let check = table.check(name).is_some();
    match (unique, foreign, check) {
        (true, false, false) => Ok(TableChange::DropIndex(name.to_string())),
        (false, true, false) => Ok(TableChange::DropForeignKey(name.to_string())),
        (false, false, true) => Ok(TableChange::DropCheck(name.to_string())),
        (false, false, false) => Err(CatalogError::NoSuchConstraint(name.to_string()).into()),
        _ => Err(CatalogError::AmbiguousConstraint(name.to_string()).into()),
    }
}

/// `ALTER TABLE ... RENAME` with trigger rewriting off; derived objects are
/// replayed separately.
fn rename_sql(schema: &str, from: &str, to: &str) -> Vec<NativeStatement> {
    let schema = quote_native(schema);
    let mut out = vec![internal("PRAGMA legacy_alter_table = ON".to_string())];
    if from.eq_ignore_ascii_case(to) {
        out.push(internal(format!(
            "ALTER TABLE {}.{} RENAME TO {}",
            schema,
            quote_native(from),
            quote_native(RENAME_TABLE)
        )));
        out.push(internal(format!(
            "ALTER TABLE {}.{} RENAME TO {}",
            schema,
            quote_native(RENAME_TABLE),
            quote_native(to)
        )));
    } else {
        out.push(internal(format!(
            "ALTER TABLE {}.{} RENAME TO {}",
            schema,
            quote_native(from),
            quote_native(to)
        )));
    }
    out.push(internal("PRAGMA legacy_alter_table = OFF".to_string()));
    out
}

#[cfg(test)]
mod tests {
    use super::super::testing::{catalog, plan, session};
    use super::*;
    use crate::catalog::show_create_table;

    fn ddl(catalog: &Catalog, sql: &str) -> DdlPlan {
        match plan(catalog, &session(), sql).unwrap() {
            Plan::Ddl(ddl) => ddl,
            other => panic!("expected DDL, got {}", other.summary()),
        }
    }

    fn error_code(catalog: &Catalog, sql: &str) -> u16 {
        plan(catalog, &session(), sql).unwrap_err().code()
    }

    fn sqls(plan: &DdlPlan) -> Vec<&str> {
        plan.statements.iter().map(|s| s.sql.as_str()).collect()
    }

    fn applied(mut catalog: Catalog, sql: &str) -> Catalog {
        for mutation in ddl(&catalog, sql).mutations {
            catalog.apply(&mutation).unwrap();
        }
        catalog
    }

    #[test]
    fn test_create_table_statements() {
        let catalog = catalog(&[]);
        let plan = ddl(
            &catalog,
            "CREATE TABLE t (id INT AUTO_INCREMENT PRIMARY KEY, email VARCHAR(50) UNIQUE, n INT CHECK (n > 0)) AUTO_INCREMENT = 10",
        );
        let Mutation::CreateTable(table) = &plan.mutations[0] else {
            panic!("expected CreateTable");
        };
        let names: Vec<&str> = table.indexes.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["PRIMARY", "email"]);
        assert_eq!(table.checks[0].name, "t_chk_1");
        assert!(!plan.temporary);

        let sql = sqls(&plan);
        assert_eq!(sql.len(), 4);
        assert!(sql[0].starts_with("CREATE TABLE \"main\".\"t\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert_eq!(sql[2], "INSERT INTO \"main\".\"sqlite_sequence\" (name, seq) VALUES ('t', 9)");
        assert_eq!(sql[3], "CREATE UNIQUE INDEX \"main\".\"t__email\" ON \"t\" (\"email\")");
    }

    #[test]
    fn test_create_existing_table() {
        let catalog = catalog(&["CREATE TABLE t (a INT)"]);
        let plan = ddl(&catalog, "CREATE TABLE IF NOT EXISTS t (a INT)");
        assert!(plan.mutations.is_empty());
        assert_eq!(plan.notes[0].code, 1050);
        assert_eq!(error_code(&catalog, "CREATE TABLE T (b INT)"), 1050);
        assert_eq!(error_code(&catalog, "CREATE TABLE _mysqlite_x (b INT)"), 1103);
        assert_eq!(error_code(&catalog, "CREATE TABLE information_schema.x (b INT)"), 1044);
    }

    #[test]
    fn test_temporary_table() {
        let catalog = catalog(&["CREATE TABLE t (a INT)"]);
        let plan = ddl(&catalog, "CREATE TEMPORARY TABLE t (a INT, b VARCHAR(5))");
        assert!(plan.temporary);
        assert!(plan.statements[0].sql.starts_with("CREATE TEMP TABLE \"t\" ("));
    }

    #[test]
    fn test_foreign_key_names_and_backing_index() {
        let catalog = catalog(&["CREATE TABLE parent (id INT PRIMARY KEY)"]);
        let plan = ddl(
            &catalog,
            "CREATE TABLE child (id INT, pid INT, CONSTRAINT fk_p FOREIGN KEY (pid) REFERENCES parent (id), \
             FOREIGN KEY (id) REFERENCES parent (ID) ON DELETE CASCADE)",
        );
        let Mutation::CreateTable(table) = &plan.mutations[0] else {
            panic!("expected CreateTable");
        };
        let indexes: Vec<&str> = table.indexes.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(indexes, vec!["fk_p", "id"]);
        let fks: Vec<&str> = table.foreign_keys.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fks, vec!["fk_p", "child_ibfk_1"]);
        assert_eq!(table.foreign_keys[1].ref_columns, vec!["id"]);
        assert!(sqls(&plan).iter().any(|s| s.contains("\"child__fk_fk_p_ins\"")));
        assert!(sqls(&plan).iter().any(|s| s.contains("\"child__fk_child_ibfk_1_del\"")));

        assert_eq!(
            error_code(&catalog, "CREATE TABLE c2 (pid INT, FOREIGN KEY (pid) REFERENCES missing (id))"),
            1824
        );
        assert_eq!(
            error_code(&catalog, "CREATE TABLE c2 (pid INT, FOREIGN KEY (pid) REFERENCES parent (nope))"),
            1822
        );
    }

    #[test]
    fn test_invalid_defaults() {
        let catalog = catalog(&[]);
        assert_eq!(error_code(&catalog, "CREATE TABLE t (a INT DEFAULT 'x')"), 1067);
        assert_eq!(error_code(&catalog, "CREATE TABLE t (a INT NOT NULL DEFAULT NULL)"), 1067);
        assert_eq!(error_code(&catalog, "CREATE TABLE t (d DATETIME(3) DEFAULT CURRENT_TIMESTAMP)"), 1067);
        assert_eq!(error_code(&catalog, "CREATE TABLE t (a TEXT DEFAULT 'x')"), 1067);
        assert_eq!(error_code(&catalog, "CREATE TABLE t (a INT ON UPDATE CURRENT_TIMESTAMP)"), 1294);

        let plan = ddl(&catalog, "CREATE TABLE t (b BOOL DEFAULT TRUE, e TEXT DEFAULT (concat('a', 'b')))");
        let Mutation::CreateTable(table) = &plan.mutations[0] else {
            panic!("expected CreateTable");
        };
        assert_eq!(table.columns[0].default, ColumnDefault::Literal(Value::Integer(1)));
        assert!(matches!(table.columns[1].default, ColumnDefault::Expression(_)));
    }

    #[test]
    fn test_auto_increment_needs_sole_integer_key() {
        let catalog = catalog(&[]);
        assert_eq!(
            error_code(&catalog, "CREATE TABLE t (id INT AUTO_INCREMENT, b INT, PRIMARY KEY (id, b))"),
            1235
        );
        assert_eq!(error_code(&catalog, "CREATE TABLE t (id INT AUTO_INCREMENT, b INT)"), 1075);
    }

    #[test]
    fn test_drop_primary_keeps_unique() {
        let catalog = catalog(&[
            "CREATE TABLE t (id INT NOT NULL, code VARCHAR(10) NOT NULL, PRIMARY KEY (id), UNIQUE KEY uq_code (code))",
        ]);
        let plan = ddl(&catalog, "ALTER TABLE t DROP PRIMARY KEY");
        assert_eq!(
            sqls(&plan),
            vec![
                "PRAGMA legacy_alter_table = ON",
                "CREATE TABLE \"main\".\"_mysqlite_rebuild\" (\"id\" INTEGER NOT NULL, \"code\" TEXT NOT NULL COLLATE NOCASE)",
                "INSERT INTO \"main\".\"_mysqlite_rebuild\" (\"id\", \"code\") SELECT \"id\", \"code\" FROM \"main\".\"t\"",
                "DROP TABLE \"main\".\"t\"",
                "ALTER TABLE \"main\".\"_mysqlite_rebuild\" RENAME TO \"t\"",
                "PRAGMA legacy_alter_table = OFF",
                "CREATE UNIQUE INDEX \"main\".\"t__uq_code\" ON \"t\" (\"code\")",
            ]
        );

        let catalog = applied(catalog, "ALTER TABLE t DROP PRIMARY KEY");
        let t = catalog.lookup_table("app", "t", true).unwrap();
        assert_eq!(t.indexes.len(), 1);
        assert_eq!(t.indexes[0].name, "uq_code");
        assert_eq!(t.indexes[0].kind, IndexKind::Unique);
        assert!(show_create_table(t, None).contains("UNIQUE KEY `uq_code` (`code`)"));
    }

    #[test]
    fn test_drop_foreign_key_keeps_the_rest_in_order() {
        let catalog = catalog(&[
            "CREATE TABLE parent (id INT PRIMARY KEY)",
            "CREATE TABLE child (a INT, b INT, c INT, \
             CONSTRAINT f1 FOREIGN KEY (a) REFERENCES parent (id), \
             CONSTRAINT f2 FOREIGN KEY (b) REFERENCES parent (id), \
             CONSTRAINT f3 FOREIGN KEY (c) REFERENCES parent (id))",
        ]);
        let plan = ddl(&catalog, "ALTER TABLE child DROP FOREIGN KEY f2");
        let sql = sqls(&plan);
        assert_eq!(sql.len(), 4);
        assert!(sql.iter().all(|s| s.starts_with("DROP TRIGGER IF EXISTS") && s.contains("f2")));

        let catalog = applied(catalog, "ALTER TABLE child DROP FOREIGN KEY f2");
        let child = catalog.lookup_table("app", "child", true).unwrap();
        let fks: Vec<&str> = child.foreign_keys.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fks, vec!["f1", "f3"]);
        let indexes: Vec<&str> = child.indexes.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(indexes, vec!["f1", "f2", "f3"]);
        let text = show_create_table(child, None);
        let (f1, f3) = (text.find("CONSTRAINT `f1`").unwrap(), text.find("CONSTRAINT `f3`").unwrap());
        assert!(f1 < f3);
        assert!(!text.contains("CONSTRAINT `f2`"));
    }

    #[test]
    fn test_alter_copies_through_column_mapping() {
        let catalog = catalog(&["CREATE TABLE t (id INT PRIMARY KEY, name VARCHAR(10))"]);
        let plan = ddl(
            &catalog,
            "ALTER TABLE t ADD COLUMN qty INT NOT NULL DEFAULT 3 AFTER id, MODIFY name VARCHAR(20) NOT NULL",
        );
        let copy = &plan.statements[2];
        assert_eq!(
            copy.sql,
            "INSERT INTO \"main\".\"_mysqlite_rebuild\" (\"id\", \"qty\", \"name\") \
             SELECT \"id\", ?1, _mysqlite_cast(\"name\", ?2, ?3, rowid) FROM \"main\".\"t\""
        );
        assert_eq!(copy.params[0], Value::Integer(3));

        let plan = ddl(&catalog, "ALTER TABLE t RENAME COLUMN name TO title");
        assert_eq!(
            plan.statements[2].sql,
            "INSERT INTO \"main\".\"_mysqlite_rebuild\" (\"id\", \"title\") SELECT \"id\", \"name\" FROM \"main\".\"t\""
        );
    }

    #[test]
    fn test_alter_without_native_change() {
        let catalog = catalog(&["CREATE TABLE t (id INT PRIMARY KEY, a INT)"]);
        let plan = ddl(&catalog, "ALTER TABLE t ADD INDEX idx_a (a)");
        assert_eq!(sqls(&plan), vec!["CREATE INDEX \"main\".\"t__idx_a\" ON \"t\" (\"a\")"]);
        let plan = ddl(&catalog, "ALTER TABLE t ALTER COLUMN a SET DEFAULT 4");
        assert!(plan.statements.is_empty());
        assert_eq!(error_code(&catalog, "ALTER TABLE t ADD COLUMN a INT"), 1060);
        assert_eq!(error_code(&catalog, "ALTER TABLE t DROP INDEX nope"), 1091);
    }

    #[test]
    fn test_drop_constraint_resolves_kind() {
        let catalog = catalog(&["CREATE TABLE t (a INT, UNIQUE KEY u (a), CONSTRAINT c CHECK (a > 0))"]);
        let change = |sql: &str| match &ddl(&catalog, sql).mutations[0] {
            Mutation::AlterTable { changes, .. } => changes[0].clone(),
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(change("ALTER TABLE t DROP CONSTRAINT c"), TableChange::DropCheck("c".into()));
        assert_eq!(change("ALTER TABLE t DROP CONSTRAINT u"), TableChange::DropIndex("u".into()));
        assert_eq!(error_code(&catalog, "ALTER TABLE t DROP CONSTRAINT zz"), 3940);
    }

    #[test]
    fn test_rename_replays_derived_objects() {
        let catalog = catalog(&["CREATE TABLE t (a INT, KEY k (a))"]);
        let plan = ddl(&catalog, "RENAME TABLE t TO u");
        assert_eq!(
            sqls(&plan),
            vec![
                "DROP INDEX IF EXISTS \"main\".\"t__k\"",
                "PRAGMA legacy_alter_table = ON",
                "ALTER TABLE \"main\".\"t\" RENAME TO \"u\"",
                "PRAGMA legacy_alter_table = OFF",
                "CREATE INDEX \"main\".\"u__k\" ON \"u\" (\"a\")",
            ]
        );
        assert_eq!(error_code(&catalog, "RENAME TABLE nope TO x"), 1146);
    }

    #[test]
    fn test_drop_table_rules() {
        let catalog = catalog(&[
            "CREATE TABLE parent (id INT PRIMARY KEY)",
            "CREATE TABLE child (pid INT, FOREIGN KEY (pid) REFERENCES parent (id))",
        ]);
        assert_eq!(error_code(&catalog, "DROP TABLE parent"), 3730);
        assert_eq!(ddl(&catalog, "DROP TABLE child, parent").mutations.len(), 2);
        let plan = ddl(&catalog, "DROP TABLE IF EXISTS nope");
        assert!(plan.mutations.is_empty());
        assert_eq!(plan.notes[0].code, 1051);
        assert_eq!(error_code(&catalog, "DROP TABLE nope"), 1051);

        let mut relaxed = session();
        relaxed.foreign_key_checks = false;
        assert!(matches!(plan_ok(&catalog, &relaxed, "DROP TABLE parent"), Plan::Ddl(_)));
    }

    fn plan_ok(catalog: &Catalog, session: &crate::session::Session, sql: &str) -> Plan {
        plan(catalog, session, sql).unwrap()
    }

    #[test]
    fn test_truncate() {
        let catalog = catalog(&[
            "CREATE TABLE parent (id INT AUTO_INCREMENT PRIMARY KEY)",
            "CREATE TABLE child (pid INT, FOREIGN KEY (pid) REFERENCES parent (id))",
        ]);
        assert_eq!(error_code(&catalog, "TRUNCATE TABLE parent"), 1701);
        let catalog = applied(catalog, "DROP TABLE child");
        let plan = ddl(&catalog, "TRUNCATE TABLE parent");
        assert_eq!(
            sqls(&plan),
            vec![
                "DELETE FROM \"main\".\"parent\"",
                "DELETE FROM \"main\".\"sqlite_sequence\" WHERE name = 'parent'",
            ]
        );
    }

    #[test]
    fn test_databases() {
        let catalog = catalog(&["CREATE DATABASE shop CHARACTER SET latin1", "CREATE TABLE shop.items (a INT)"]);
        let db = catalog.database("shop").unwrap();
        assert_eq!(db.collation, "latin1_swedish_ci");
        assert_eq!(error_code(&catalog, "CREATE DATABASE app"), 1007);
        assert_eq!(ddl(&catalog, "CREATE DATABASE IF NOT EXISTS app").notes[0].code, 1007);
        assert_eq!(error_code(&catalog, "CREATE DATABASE x CHARACTER SET klingon"), 1115);

        let plan = ddl(&catalog, "DROP DATABASE shop");
        assert_eq!(sqls(&plan), vec!["DROP TABLE IF EXISTS \"main\".\"_mysqlite_db_shop__items\""]);
        assert_eq!(error_code(&catalog, "DROP DATABASE nope"), 1008);
        assert_eq!(error_code(&catalog, "DROP DATABASE information_schema"), 1044);
    }

    #[test]
    fn test_create_like_renames_generated_checks() {
        let catalog = catalog(&["CREATE TABLE src (a INT CHECK (a > 0), KEY k (a))"]);
        let plan = ddl(&catalog, "CREATE TABLE dst LIKE src");
        let Mutation::CreateTable(table) = &plan.mutations[0] else {
            panic!("expected CreateTable");
        };
        assert_eq!(table.checks[0].name, "dst_chk_1");
        assert!(sqls(&plan).contains(&"CREATE INDEX \"main\".\"dst__k\" ON \"dst\" (\"a\")"));
    }
}
