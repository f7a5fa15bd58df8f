//! Shadow schema catalog
//!
//! The catalog is the single source of truth for what the application
//! declared: MySQL types, defaults, key names, constraint names and table
//! options. Native tables are a projection of it. Introspection
//! (`SHOW`, `DESCRIBE`, `information_schema`) is answered from here alone.
//!
//! ## Naming
//! - Names compare case-insensitively and are stored as written.
//! - Tables of the configured database keep their own name natively; tables
//!   of other databases live under `_mysqlite_db_<db>__<table>`.
//! - Native index names are `<native table>__<index>`.

mod charset;
pub mod information_schema;
mod mutation;
mod registry;
mod schema;
mod show_create;

pub use charset::{
    collation_charset, default_collation, is_case_insensitive, is_known_charset,
    is_known_collation, normalize_charset, normalize_collation, CHARSETS, COLLATIONS,
};
pub use mutation::{ColumnPlacement, Mutation, TableChange};
pub use registry::{is_internal_table, SchemaRegistry};
pub use schema::*;
pub use show_create::{foreign_key_clause, show_create_database, show_create_table};

use std::collections::BTreeMap;

/// Database served by `information_schema` queries.
pub const INFORMATION_SCHEMA: &str = "information_schema";

type TableKey = (String, String);

fn key(database: &str, name: &str) -> TableKey {
    (fold(database), fold(name))
}

/// Double-quote an identifier for the native engine.
pub fn quote_native(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Clone)]
pub struct Catalog {
    default_database: String,
    databases: BTreeMap<String, DatabaseSchema>,
    tables: BTreeMap<TableKey, TableSchema>,
    /// Connection-scoped tables, never persisted
    temporary: BTreeMap<TableKey, TableSchema>,
}

impl Catalog {
    /// Empty catalog holding only the configured database.
    pub fn new(default_database: &str, charset: &str, collation: &str) -> Self {
        let mut databases = BTreeMap::new();
        databases.insert(
            fold(default_database),
            DatabaseSchema {
                name: default_database.to_string(),
                charset: charset.to_string(),
                collation: collation.to_string(),
            },
        );
        Self {
            default_database: default_database.to_string(),
            databases,
            tables: BTreeMap::new(),
            temporary: BTreeMap::new(),
        }
    }

    pub(crate) fn from_parts(
        default_database: &str,
        databases: Vec<DatabaseSchema>,
        tables: Vec<TableSchema>,
    ) -> Self {
        Self {
            default_database: default_database.to_string(),
            databases: databases.into_iter().map(|d| (fold(&d.name), d)).collect(),
            tables: tables
                .into_iter()
                .map(|t| (key(&t.database, &t.name), t))
                .collect(),
            temporary: BTreeMap::new(),
        }
    }

    pub fn default_database(&self) -> &str {
        &self.default_database
    }

    pub fn database(&self, name: &str) -> Option<&DatabaseSchema> {
        self.databases.get(&fold(name))
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.databases.contains_key(&fold(name))
    }

    /// Databases ordered by name.
    pub fn databases(&self) -> impl Iterator<Item = &DatabaseSchema> {
        self.databases.values()
    }

    /// Find a table. With `respect_temporary` a temporary table shadows the
    /// persistent one of the same name.
    pub fn lookup_table(&self, database: &str, name: &str, respect_temporary: bool) -> Option<&TableSchema> {
        let k = key(database, name);
        if respect_temporary {
            if let Some(t) = self.temporary.get(&k) {
                return Some(t);
            }
        }
        self.tables.get(&k)
    }

    pub fn temporary_table(&self, database: &str, name: &str) -> Option<&TableSchema> {
        self.temporary.get(&key(database, name))
    }

    /// Persistent tables of one database, ordered by name.
    pub fn tables_in<'a>(&'a self, database: &str) -> impl Iterator<Item = &'a TableSchema> + 'a {
        let db = fold(database);
        self.tables.values().filter(move |t| fold(&t.database) == db)
    }

    /// Every persistent table.
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn temporary_tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.temporary.values()
    }

    /// Foreign keys of other tables pointing at `database.table`.
    pub fn referencing_foreign_keys(&self, database: &str, table: &str) -> Vec<(&TableSchema, &ForeignKeySchema)> {
        self.tables
            .values()
            .chain(self.temporary.values())
            .filter(|t| !(t.database.eq_ignore_ascii_case(database) && t.name.eq_ignore_ascii_case(table)))
            .flat_map(|t| {
                t.foreign_keys
                    .iter()
                    .filter(|fk| fk.references(database, table))
                    .map(move |fk| (t, fk))
            })
            .collect()
    }

    /// Storage table name of a catalog table.
    pub fn native_name(&self, table: &TableSchema) -> String {
        self.native_name_of(&table.database, &table.name)
    }

    pub fn native_name_of(&self, database: &str, name: &str) -> String {
        if database.eq_ignore_ascii_case(&self.default_database) {
            name.to_string()
        } else {
            format!("{}db_{}__{}", RESERVED_PREFIX, fold(database), name)
        }
    }

    /// Schema-qualified, quoted native reference (`"main"."t"` or `"temp"."t"`).
    pub fn native_ref(&self, table: &TableSchema) -> String {
        let schema = if table.temporary { "temp" } else { "main" };
        format!("{}.{}", quote_native(schema), quote_native(&self.native_name(table)))
    }

    pub fn native_index_name(&self, table: &TableSchema, index: &str) -> String {
        format!("{}__{}", self.native_name(table), index)
    }

    pub(crate) fn tables_mut(&mut self, temporary: bool) -> &mut BTreeMap<TableKey, TableSchema> {
        if temporary {
            &mut self.temporary
        } else {
            &mut self.tables
        }
    }

    pub(crate) fn databases_mut(&mut self) -> &mut BTreeMap<String, DatabaseSchema> {
        &mut self.databases
    }

    /// Replace the persistent part, keeping this connection's temporary tables.
    pub(crate) fn replace_persistent(&mut self, other: Catalog) {
        self.databases = other.databases;
        self.tables = other.tables;
    }

    /// Replace this connection's temporary tables with those of `other`.
    pub(crate) fn replace_temporary(&mut self, other: &Catalog) {
        self.temporary = other.temporary.clone();
    }

    pub(crate) fn table_key(database: &str, name: &str) -> TableKey {
        key(database, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new("app", "utf8mb4", "utf8mb4_0900_ai_ci");
        let mut t = TableSchema::new("app", "Users");
        t.columns.push(ColumnSchema::new("id", DataType::int()));
        catalog.apply(&Mutation::CreateTable(t)).unwrap();
        catalog
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = catalog();
        assert!(catalog.lookup_table("APP", "users", true).is_some());
        assert_eq!(catalog.lookup_table("app", "USERS", false).unwrap().name, "Users");
    }

    #[test]
    fn test_temporary_shadows_persistent() {
        let mut catalog = catalog();
        let mut t = TableSchema::new("app", "users");
        t.temporary = true;
        t.columns.push(ColumnSchema::new("tmp", DataType::int()));
        catalog.apply(&Mutation::CreateTable(t)).unwrap();

        let seen = catalog.lookup_table("app", "users", true).unwrap();
        assert!(seen.temporary);
        let persistent = catalog.lookup_table("app", "users", false).unwrap();
        assert!(!persistent.temporary);
        assert_eq!(catalog.tables_in("app").count(), 1);
    }

    #[test]
    fn test_native_names() {
        let catalog = catalog();
        let users = catalog.lookup_table("app", "users", true).unwrap();
        assert_eq!(catalog.native_name(users), "Users");
        assert_eq!(catalog.native_ref(users), "\"main\".\"Users\"");
        assert_eq!(catalog.native_name_of("Shop", "orders"), "_mysqlite_db_shop__orders");
        assert_eq!(catalog.native_index_name(users, "idx"), "Users__idx");
    }
}
