//! Atomic catalog mutations
//!
//! Every DDL statement compiles to an ordered list of [`Mutation`]s. Each one
//! is validated against the current catalog state and either applies fully or
//! leaves the catalog untouched.

use super::schema::*;
use super::Catalog;
use crate::error::CatalogError;
use crate::types::TypeFamily;
use log::info;

type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnPlacement {
    First,
    After(String),
}

/// One change inside `ALTER TABLE`.
#[derive(Debug, Clone, PartialEq)]
pub enum TableChange {
    AddColumn {
        column: ColumnSchema,
        placement: Option<ColumnPlacement>,
    },
    DropColumn(String),
    /// MODIFY, CHANGE and RENAME COLUMN
    ModifyColumn {
        name: String,
        column: ColumnSchema,
        placement: Option<ColumnPlacement>,
    },
    AddIndex(IndexSchema),
    DropIndex(String),
    RenameIndex {
        from: String,
        to: String,
    },
    AddForeignKey(ForeignKeySchema),
    DropForeignKey(String),
    AddCheck(CheckSchema),
    DropCheck(String),
    SetCheckEnforced {
        name: String,
        enforced: bool,
    },
    SetDefault {
        column: String,
        default: ColumnDefault,
    },
    SetIndexVisible {
        name: String,
        visible: bool,
    },
    SetOptions {
        engine: Option<String>,
        charset: Option<String>,
        collation: Option<String>,
        comment: Option<String>,
        auto_increment: Option<u64>,
    },
    ConvertCharset {
        charset: String,
        collation: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateDatabase(DatabaseSchema),
    DropDatabase(String),
    CreateTable(TableSchema),
    DropTable {
        database: String,
        name: String,
        temporary: bool,
    },
    RenameTable {
        database: String,
        name: String,
        new_database: String,
        new_name: String,
    },
    AlterTable {
        database: String,
        name: String,
        temporary: bool,
        changes: Vec<TableChange>,
    },
}

impl Mutation {
    /// Whether the mutation only touches connection-scoped tables.
    pub fn is_temporary(&self) -> bool {
        match self {
            Mutation::CreateTable(t) => t.temporary,
            Mutation::DropTable { temporary, .. } | Mutation::AlterTable { temporary, .. } => *temporary,
            _ => false,
        }
    }
}

fn check_name(kind: &'static str, name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || name.ends_with(' ') {
        return Err(CatalogError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

impl Catalog {
    /// Validate and apply one mutation.
    pub fn apply(&mut self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::CreateDatabase(db) => {
                check_name("database", &db.name)?;
                if self.has_database(&db.name) {
                    return Err(CatalogError::DatabaseExists(db.name.clone()));
                }
                info!("catalog: create database {}", db.name);
                self.databases_mut().insert(fold(&db.name), db.clone());
            }
            Mutation::DropDatabase(name) => {
                if self.databases_mut().remove(&fold(name)).is_none() {
                    return Err(CatalogError::UnknownDatabase(name.clone()));
                }
                let db = fold(name);
                self.tables_mut(false).retain(|(d, _), _| *d != db);
                self.tables_mut(true).retain(|(d, _), _| *d != db);
                info!("catalog: drop database {}", name);
            }
            Mutation::CreateTable(table) => {
                check_name("table", &table.name)?;
                if is_reserved_name(&table.name) {
                    return Err(CatalogError::ReservedName(table.name.clone()));
                }
                if !self.has_database(&table.database) {
                    return Err(CatalogError::UnknownDatabase(table.database.clone()));
                }
                let k = Catalog::table_key(&table.database, &table.name);
                if self.tables_mut(table.temporary).contains_key(&k) {
                    return Err(CatalogError::TableExists(table.name.clone()));
                }
                let mut table = table.clone();
                validate_table(&mut table)?;
                info!("catalog: create table {}.{}", table.database, table.name);
                self.tables_mut(table.temporary).insert(k, table);
            }
            Mutation::DropTable {
                database,
                name,
                temporary,
            } => {
                let k = Catalog::table_key(database, name);
                if self.tables_mut(*temporary).remove(&k).is_none() {
                    return Err(CatalogError::UnknownTable {
                        database: database.clone(),
                        table: name.clone(),
                    });
                }
                info!("catalog: drop table {}.{}", database, name);
            }
            Mutation::RenameTable {
                database,
                name,
                new_database,
                new_name,
            } => self.rename_table(database, name, new_database, new_name)?,
            Mutation::AlterTable {
                database,
                name,
                temporary,
                changes,
            } => {
                let k = Catalog::table_key(database, name);
                let mut table = self
                    .tables_mut(*temporary)
                    .get(&k)
                    .cloned()
                    .ok_or_else(|| CatalogError::NoSuchTable {
                        database: database.clone(),
                        table: name.clone(),
                    })?;
                let mut renamed_columns = Vec::new();
                for change in changes {
                    self.apply_change(&mut table, change, &mut renamed_columns)?;
                }
                if table.columns.is_empty() {
                    return Err(CatalogError::CantRemoveAllColumns);
                }
                validate_table(&mut table)?;
                self.tables_mut(*temporary).insert(k, table);
                // referencing foreign keys follow renamed parent columns
                for (from, to) in renamed_columns {
                    self.rename_referenced_column(database, name, &from, &to);
                }
                info!("catalog: alter table {}.{} ({} changes)", database, name, changes.len());
            }
        }
        Ok(())
    }

    fn rename_table(&mut self, database: &str, name: &str, new_database: &str, new_name: &str) -> Result<()> {
        check_name("table", new_name)?;
        if is_reserved_name(new_name) {
            return Err(CatalogError::ReservedName(new_name.to_string()));
        }
        if !self.has_database(new_database) {
            return Err(CatalogError::UnknownDatabase(new_database.to_string()));
        }
        let from = Catalog::table_key(database, name);
        let to = Catalog::table_key(new_database, new_name);
        let temporary = self.temporary_table(database, name).is_some();
        if from != to && self.tables_mut(temporary).contains_key(&to) {
            return Err(CatalogError::TableExists(new_name.to_string()));
        }
        let mut table = self
            .tables_mut(temporary)
            .remove(&from)
            .ok_or_else(|| CatalogError::NoSuchTable {
                database: database.to_string(),
                table: name.to_string(),
            })?;
        table.database = self
            .database(new_database)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| new_database.to_string());
        table.name = new_name.to_string();
        let (db, tbl) = (table.database.clone(), table.name.clone());
        self.tables_mut(temporary).insert(to, table);

        for temp in [false, true] {
            for t in self.tables_mut(temp).values_mut() {
                for fk in t.foreign_keys.iter_mut().filter(|fk| fk.references(database, name)) {
                    fk.ref_database = db.clone();
                    fk.ref_table = tbl.clone();
                }
            }
        }
        info!("catalog: rename table {}.{} to {}.{}", database, name, db, tbl);
        Ok(())
    }

    fn rename_referenced_column(&mut self, database: &str, table: &str, from: &str, to: &str) {
        for temp in [false, true] {
            for t in self.tables_mut(temp).values_mut() {
                for fk in t.foreign_keys.iter_mut().filter(|fk| fk.references(database, table)) {
                    for c in fk.ref_columns.iter_mut().filter(|c| c.eq_ignore_ascii_case(from)) {
                        *c = to.to_string();
                    }
                }
            }
        }
    }

    /// Apply one ALTER change to a working copy, without whole-table validation.
    pub(crate) fn apply_change(
        &self,
        table: &mut TableSchema,
        change: &TableChange,
        renamed: &mut Vec<(String, String)>,
    ) -> Result<()> {
        match change {
            TableChange::AddColumn { column, placement } => {
                check_name("column", &column.name)?;
                if table.column(&column.name).is_some() {
                    return Err(CatalogError::DuplicateColumn(column.name.clone()));
                }
                let at = placement_index(table, placement.as_ref(), table.columns.len())?;
                table.columns.insert(at, column.clone());
            }
            TableChange::DropColumn(name) => {
                let pos = table
                    .column_position(name)
                    .ok_or_else(|| CatalogError::CantDrop(name.clone()))?;
                if let Some(fk) = table.foreign_keys.iter().find(|fk| fk.columns.iter().any(|c| c.eq_ignore_ascii_case(name))) {
                    return Err(CatalogError::ColumnNeededByForeignKey {
                        column: name.clone(),
                        constraint: fk.name.clone(),
                    });
                }
                for (child, fk) in self.referencing_foreign_keys(&table.database, &table.name) {
                    if fk.ref_columns.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                        return Err(CatalogError::ColumnNeededByForeignKey {
                            column: name.clone(),
                            constraint: format!("{}.{}", child.name, fk.name),
                        });
                    }
                }
                table.columns.remove(pos);
                // the column leaves every index; emptied indexes go away
                for index in table.indexes.iter_mut() {
                    index.parts.retain(|p| !p.column.eq_ignore_ascii_case(name));
                }
                table.indexes.retain(|i| !i.parts.is_empty());
            }
            TableChange::ModifyColumn {
                name,
                column,
                placement,
            } => {
                let pos = table.column_position(name).ok_or_else(|| CatalogError::NoSuchColumn {
                    column: name.clone(),
                    context: table.name.clone(),
                })?;
                check_name("column", &column.name)?;
                let renaming = !column.name.eq_ignore_ascii_case(name);
                if renaming && table.column(&column.name).is_some() {
                    return Err(CatalogError::DuplicateColumn(column.name.clone()));
                }
                let old = table.columns.remove(pos);
                let at = placement_index(table, placement.as_ref(), pos)?;
                table.columns.insert(at, column.clone());
                if old.name != column.name {
                    for index in table.indexes.iter_mut() {
                        for part in index.parts.iter_mut().filter(|p| p.column.eq_ignore_ascii_case(name)) {
                            part.column = column.name.clone();
                        }
                    }
                    for fk in table.foreign_keys.iter_mut() {
                        for c in fk.columns.iter_mut().filter(|c| c.eq_ignore_ascii_case(name)) {
                            *c = column.name.clone();
                        }
                    }
                    renamed.push((old.name, column.name.clone()));
                }
            }
            TableChange::AddIndex(index) => {
                if index.kind == IndexKind::Primary {
                    if table.primary_key().is_some() {
                        return Err(CatalogError::MultiplePrimaryKey);
                    }
                } else {
                    check_name("index", &index.name)?;
                    if table.index(&index.name).is_some() || index.name.eq_ignore_ascii_case("PRIMARY") {
                        return Err(CatalogError::DuplicateKeyName(index.name.clone()));
                    }
                }
                table.indexes.push(index.clone());
            }
            TableChange::DropIndex(name) => {
                let pos = table
                    .indexes
                    .iter()
                    .position(|i| i.is_named(name))
                    .ok_or_else(|| CatalogError::CantDrop(name.clone()))?;
                let index = &table.indexes[pos];
                // a foreign key needs some index led by its columns
                for fk in &table.foreign_keys {
                    let backed_elsewhere = table
                        .indexes
                        .iter()
                        .enumerate()
                        .any(|(i, other)| i != pos && other.starts_with(&fk.columns));
                    if index.starts_with(&fk.columns) && !backed_elsewhere {
                        return Err(CatalogError::IndexNeededByForeignKey(index.name.clone()));
                    }
                }
                table.indexes.remove(pos);
            }
            TableChange::RenameIndex { from, to } => {
                check_name("index", to)?;
                if from.eq_ignore_ascii_case("PRIMARY") || to.eq_ignore_ascii_case("PRIMARY") {
                    return Err(CatalogError::InvalidName {
                        kind: "index",
                        name: to.clone(),
                    });
                }
                if !from.eq_ignore_ascii_case(to) && table.index(to).is_some() {
                    return Err(CatalogError::DuplicateKeyName(to.clone()));
                }
                let index = table
                    .indexes
                    .iter_mut()
                    .find(|i| i.is_named(from))
                    .ok_or_else(|| CatalogError::NoSuchKey {
                        key: from.clone(),
                        table: table.name.clone(),
                    })?;
                index.name = to.clone();
            }
            TableChange::AddForeignKey(fk) => {
                check_name("foreign key", &fk.name)?;
                if table.foreign_key(&fk.name).is_some() {
                    return Err(CatalogError::DuplicateConstraint {
                        kind: "FOREIGN KEY",
                        name: fk.name.clone(),
                    });
                }
                table.foreign_keys.push(fk.clone());
            }
            TableChange::DropForeignKey(name) => {
                let before = table.foreign_keys.len();
                table.foreign_keys.retain(|fk| !fk.is_named(name));
                if table.foreign_keys.len() == before {
                    return Err(CatalogError::CantDrop(name.clone()));
                }
            }
            TableChange::AddCheck(check) => {
                check_name("check constraint", &check.name)?;
                if table.check(&check.name).is_some() {
                    return Err(CatalogError::DuplicateConstraint {
                        kind: "CHECK",
                        name: check.name.clone(),
                    });
                }
                table.checks.push(check.clone());
            }
            TableChange::DropCheck(name) => {
                let before = table.checks.len();
                table.checks.retain(|c| !c.name.eq_ignore_ascii_case(name));
                if table.checks.len() == before {
                    return Err(CatalogError::NoSuchConstraint(name.clone()));
                }
            }
            TableChange::SetCheckEnforced { name, enforced } => {
                let check = table
                    .checks
                    .iter_mut()
                    .find(|c| c.name.eq_ignore_ascii_case(name))
                    .ok_or_else(|| CatalogError::NoSuchConstraint(name.clone()))?;
                check.enforced = *enforced;
            }
            TableChange::SetDefault { column, default } => {
                let table_name = table.name.clone();
                let col = table.column_mut(column).ok_or_else(|| CatalogError::NoSuchColumn {
                    column: column.clone(),
                    context: table_name,
                })?;
                col.default = default.clone();
            }
            TableChange::SetIndexVisible { name, visible } => {
                let table_name = table.name.clone();
                let index = table
                    .indexes
                    .iter_mut()
                    .find(|i| i.is_named(name))
                    .ok_or_else(|| CatalogError::NoSuchKey {
                        key: name.clone(),
                        table: table_name,
                    })?;
                index.visible = *visible;
            }
            TableChange::SetOptions {
                engine,
                charset,
                collation,
                comment,
                auto_increment,
            } => {
                if let Some(engine) = engine {
                    table.engine = engine.clone();
                }
                if let Some(charset) = charset {
                    table.charset = charset.clone();
                }
                if let Some(collation) = collation {
                    table.collation = collation.clone();
                }
                if let Some(comment) = comment {
                    table.comment = comment.clone();
                }
                if auto_increment.is_some() {
                    table.auto_increment = *auto_increment;
                }
            }
            TableChange::ConvertCharset { charset, collation } => {
                table.charset = charset.clone();
                table.collation = collation.clone();
                for column in table.columns.iter_mut().filter(|c| c.data_type.is_textual()) {
                    column.data_type.charset = None;
                    column.data_type.collation = None;
                }
            }
        }
        Ok(())
    }
}

fn placement_index(table: &TableSchema, placement: Option<&ColumnPlacement>, fallback: usize) -> Result<usize> {
    match placement {
        None => Ok(fallback.min(table.columns.len())),
        Some(ColumnPlacement::First) => Ok(0),
        Some(ColumnPlacement::After(name)) => table
            .column_position(name)
            .map(|p| p + 1)
            .ok_or_else(|| CatalogError::NoSuchColumn {
                column: name.clone(),
                context: table.name.clone(),
            }),
    }
}

/// Structural checks shared by CREATE and ALTER. Also normalizes: the
/// primary key moves first and its columns become NOT NULL.
fn validate_table(table: &mut TableSchema) -> Result<()> {
    for (i, column) in table.columns.iter().enumerate() {
        check_name("column", &column.name)?;
        if table.columns[..i].iter().any(|c| c.is_named(&column.name)) {
            return Err(CatalogError::DuplicateColumn(column.name.clone()));
        }
        if !column.nullable && column.default == ColumnDefault::Null {
            return Err(CatalogError::InvalidDefault(column.name.clone()));
        }
        if let ColumnDefault::CurrentTimestamp { .. } = column.default {
            if !matches!(column.data_type.family(), TypeFamily::DateTime | TypeFamily::Timestamp) {
                return Err(CatalogError::InvalidDefault(column.name.clone()));
            }
        }
        if column.data_type.is_lob() && matches!(column.default, ColumnDefault::Literal(_)) {
            return Err(CatalogError::InvalidDefault(column.name.clone()));
        }
    }

    let mut primary_count = 0;
    for (i, index) in table.indexes.iter().enumerate() {
        if index.kind == IndexKind::Primary {
            primary_count += 1;
        } else if table.indexes[..i].iter().any(|other| other.is_named(&index.name)) {
            return Err(CatalogError::DuplicateKeyName(index.name.clone()));
        }
        for part in &index.parts {
            let column = table
                .column(&part.column)
                .ok_or_else(|| CatalogError::KeyColumnMissing(part.column.clone()))?;
            let needs_prefix = column.data_type.is_lob()
                && !matches!(index.kind, IndexKind::Fulltext | IndexKind::Spatial);
            if needs_prefix && part.prefix.is_none() {
                return Err(CatalogError::KeyLengthRequired(part.column.clone()));
            }
        }
    }
    if primary_count > 1 {
        return Err(CatalogError::MultiplePrimaryKey);
    }
    // PRIMARY, UNIQUE, plain and spatial, FULLTEXT; stable within a kind
    table.indexes.sort_by_key(|i| match i.kind {
        IndexKind::Primary => 0,
        IndexKind::Unique => 1,
        IndexKind::Regular | IndexKind::Spatial => 2,
        IndexKind::Fulltext => 3,
    });
    if let Some(pk) = table.primary_key().cloned() {
        for part in &pk.parts {
            if let Some(column) = table.column_mut(&part.column) {
                column.nullable = false;
                if column.default == ColumnDefault::Null {
                    column.default = ColumnDefault::None;
                }
            }
        }
    }

    let autos: Vec<&ColumnSchema> = table.columns.iter().filter(|c| c.auto_increment).collect();
    if autos.len() > 1 {
        return Err(CatalogError::WrongAutoKey);
    }
    if let Some(auto) = autos.first() {
        if !matches!(auto.data_type.family(), TypeFamily::Integer | TypeFamily::Float) {
            return Err(CatalogError::AutoIncrementType(auto.name.clone()));
        }
        let keyed = table.indexes.iter().any(|i| {
            i.parts
                .first()
                .map(|p| p.column.eq_ignore_ascii_case(&auto.name))
                .unwrap_or(false)
        });
        if !keyed {
            return Err(CatalogError::WrongAutoKey);
        }
    }

    for (i, fk) in table.foreign_keys.iter().enumerate() {
        if table.foreign_keys[..i].iter().any(|other| other.is_named(&fk.name)) {
            return Err(CatalogError::DuplicateConstraint {
                kind: "FOREIGN KEY",
                name: fk.name.clone(),
            });
        }
        if fk.columns.len() != fk.ref_columns.len() || fk.columns.is_empty() {
            return Err(CatalogError::ForeignKeyArity(fk.name.clone()));
        }
        for column in &fk.columns {
            if table.column(column).is_none() {
                return Err(CatalogError::KeyColumnMissing(column.clone()));
            }
        }
    }
    for (i, check) in table.checks.iter().enumerate() {
        if table.checks[..i].iter().any(|c| c.name.eq_ignore_ascii_case(&check.name)) {
            return Err(CatalogError::DuplicateConstraint {
                kind: "CHECK",
                name: check.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn pk(columns: &[&str]) -> IndexSchema {
        IndexSchema {
            name: "PRIMARY".into(),
            kind: IndexKind::Primary,
            parts: columns.iter().map(|c| IndexPart::column(*c)).collect(),
            visible: true,
            comment: String::new(),
        }
    }

    fn unique(name: &str, column: &str) -> IndexSchema {
        IndexSchema {
            name: name.into(),
            kind: IndexKind::Unique,
            parts: vec![IndexPart::column(column)],
            visible: true,
            comment: String::new(),
        }
    }

    fn base() -> Catalog {
        let mut catalog = Catalog::new("app", "utf8mb4", "utf8mb4_0900_ai_ci");
        let mut t = TableSchema::new("app", "t");
        t.columns.push(ColumnSchema::new("a", DataType::int()));
        t.columns.push(ColumnSchema::new("b", DataType::int()));
        t.indexes.push(unique("b", "b"));
        t.indexes.push(pk(&["a"]));
        catalog.apply(&Mutation::CreateTable(t)).unwrap();
        catalog
    }

    fn alter(changes: Vec<TableChange>) -> Mutation {
        Mutation::AlterTable {
            database: "app".into(),
            name: "t".into(),
            temporary: false,
            changes,
        }
    }

    #[test]
    fn test_primary_normalized() {
        let catalog = base();
        let t = catalog.lookup_table("app", "t", false).unwrap();
        assert_eq!(t.indexes[0].name, "PRIMARY");
        assert!(!t.column("a").unwrap().nullable);
    }

    #[test]
    fn test_drop_primary_keeps_unique() {
        let mut catalog = base();
        catalog.apply(&alter(vec![TableChange::DropIndex("PRIMARY".into())])).unwrap();
        let t = catalog.lookup_table("app", "t", false).unwrap();
        assert_eq!(t.indexes.len(), 1);
        assert_eq!(t.indexes[0].kind, IndexKind::Unique);
    }

    #[test]
    fn test_failed_alter_leaves_catalog_unchanged() {
        let mut catalog = base();
        let before = catalog.lookup_table("app", "t", false).unwrap().clone();
        let err = catalog
            .apply(&alter(vec![
                TableChange::DropColumn("b".into()),
                TableChange::AddIndex(unique("x", "missing")),
            ]))
            .unwrap_err();
        assert_eq!(err, CatalogError::KeyColumnMissing("missing".into()));
        assert_eq!(catalog.lookup_table("app", "t", false).unwrap(), &before);
    }

    #[test]
    fn test_duplicates_detected() {
        let mut catalog = base();
        let err = catalog.apply(&alter(vec![TableChange::AddIndex(unique("B", "a"))])).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateKeyName("B".into()));

        let err = catalog.apply(&Mutation::CreateTable(TableSchema::new("app", "T"))).unwrap_err();
        assert_eq!(err, CatalogError::TableExists("T".into()));

        let err = catalog
            .apply(&Mutation::CreateTable(TableSchema::new("app", "_mysqlite_x")))
            .unwrap_err();
        assert!(matches!(err, CatalogError::ReservedName(_)));
    }

    #[test]
    fn test_constraint_names_scoped_by_kind() {
        let mut catalog = base();
        let fk = ForeignKeySchema {
            name: "b".into(),
            columns: vec!["b".into()],
            ref_database: "app".into(),
            ref_table: "t".into(),
            ref_columns: vec!["a".into()],
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        };
        // same name as the unique key is fine: different kind
        catalog.apply(&alter(vec![TableChange::AddForeignKey(fk.clone())])).unwrap();
        let check = CheckSchema {
            name: "b".into(),
            expr: "(`b` > 0)".into(),
            enforced: true,
        };
        catalog.apply(&alter(vec![TableChange::AddCheck(check.clone())])).unwrap();

        let err = catalog.apply(&alter(vec![TableChange::AddForeignKey(fk)])).unwrap_err();
        assert_eq!(err.code(), 1826);
        let err = catalog.apply(&alter(vec![TableChange::AddCheck(check)])).unwrap_err();
        assert_eq!(err.code(), 3822);
    }

    #[test]
    fn test_rename_column_follows_indexes() {
        let mut catalog = base();
        let mut renamed = ColumnSchema::new("bee", DataType::int());
        renamed.nullable = true;
        catalog
            .apply(&alter(vec![TableChange::ModifyColumn {
                name: "b".into(),
                column: renamed,
                placement: Some(ColumnPlacement::First),
            }]))
            .unwrap();
        let t = catalog.lookup_table("app", "t", false).unwrap();
        assert_eq!(t.columns[0].name, "bee");
        assert_eq!(t.index("b").unwrap().parts[0].column, "bee");
    }

    #[test]
    fn test_rename_table_updates_references() {
        let mut catalog = base();
        let mut child = TableSchema::new("app", "child");
        child.columns.push(ColumnSchema::new("t_id", DataType::int()));
        child.foreign_keys.push(ForeignKeySchema {
            name: "child_ibfk_1".into(),
            columns: vec!["t_id".into()],
            ref_database: "app".into(),
            ref_table: "t".into(),
            ref_columns: vec!["a".into()],
            on_delete: ReferentialAction::Cascade,
            on_update: ReferentialAction::NoAction,
        });
        catalog.apply(&Mutation::CreateTable(child)).unwrap();
        catalog
            .apply(&Mutation::RenameTable {
                database: "app".into(),
                name: "t".into(),
                new_database: "app".into(),
                new_name: "parent".into(),
            })
            .unwrap();
        let child = catalog.lookup_table("app", "child", false).unwrap();
        assert_eq!(child.foreign_keys[0].ref_table, "parent");
    }

    #[test]
    fn test_auto_increment_must_be_key() {
        let mut catalog = base();
        let mut t = TableSchema::new("app", "seq");
        let mut id = ColumnSchema::new("id", DataType::int());
        id.auto_increment = true;
        t.columns.push(id);
        assert_eq!(
            catalog.apply(&Mutation::CreateTable(t)).unwrap_err(),
            CatalogError::WrongAutoKey
        );
    }
}
