//! Schema registry: the catalog plus its persistence in the storage file
//!
//! Definitions are bincode blobs in internal tables next to the user's data,
//! so catalog and native schema commit or roll back together. Every DDL
//! rewrites the persisted copy and bumps a generation counter; another
//! connection notices the change through the counter or the native
//! `schema_version` and reloads.

use super::{Catalog, DatabaseSchema, Mutation, TableSchema, RESERVED_PREFIX};
use crate::config::DriverConfig;
use crate::engine::NativeEngine;
use crate::error::{DriverError, Result};
use crate::types::Value;
use log::{debug, info};
use parking_lot::{RwLock, RwLockReadGuard};

/// Persisted layout version.
const FORMAT_VERSION: &str = "1";

const META: &str = "_mysqlite_meta";
const SCHEMATA: &str = "_mysqlite_schemata";
const TABLES: &str = "_mysqlite_tables";

/// What the in-memory catalog was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Stamp {
    schema_version: i64,
    generation: i64,
}

pub struct SchemaRegistry {
    catalog: RwLock<Catalog>,
    stamp: RwLock<Stamp>,
    default_database: String,
}

impl SchemaRegistry {
    /// Load the catalog from the storage file, creating the internal tables
    /// and the configured database on first open.
    pub fn open(engine: &dyn NativeEngine, config: &DriverConfig) -> Result<Self> {
        engine.execute_script(&format!(
            "CREATE TABLE IF NOT EXISTS main.{META}(key TEXT PRIMARY KEY, value TEXT NOT NULL);
             CREATE TABLE IF NOT EXISTS main.{SCHEMATA}(name TEXT PRIMARY KEY, definition BLOB NOT NULL);
             CREATE TABLE IF NOT EXISTS main.{TABLES}(database TEXT NOT NULL, name TEXT NOT NULL, definition BLOB NOT NULL, PRIMARY KEY(database, name));
             INSERT OR IGNORE INTO main.{META}(key, value) VALUES ('format_version', '{FORMAT_VERSION}'), ('generation', '0');"
        ))?;

        let version = read_meta(engine, "format_version")?;
        if version.as_deref() != Some(FORMAT_VERSION) {
            return Err(DriverError::Serialization(format!(
                "unsupported catalog format version {}",
                version.unwrap_or_default()
            )));
        }

        let registry = Self {
            catalog: RwLock::new(Catalog::new(
                &config.database,
                &config.default_charset,
                &config.default_collation,
            )),
            stamp: RwLock::new(Stamp::default()),
            default_database: config.database.clone(),
        };
        let loaded = registry.load(engine)?;
        let missing_default = !loaded.has_database(&config.database);
        *registry.catalog.write() = loaded;
        if missing_default {
            let db = DatabaseSchema {
                name: config.database.clone(),
                charset: config.default_charset.clone(),
                collation: config.default_collation.clone(),
            };
            registry.catalog.write().apply(&Mutation::CreateDatabase(db))?;
            registry.persist(engine)?;
        }
        registry.mark_current(engine)?;
        Ok(registry)
    }

    fn load(&self, engine: &dyn NativeEngine) -> Result<Catalog> {
        let mut databases = Vec::new();
        for row in engine.query_native(&format!("SELECT definition FROM main.{SCHEMATA} ORDER BY name"), &[])?.rows {
            databases.push(bincode::deserialize::<DatabaseSchema>(blob(&row)?)?);
        }
        let mut tables = Vec::new();
        for row in engine
            .query_native(&format!("SELECT definition FROM main.{TABLES} ORDER BY database, name"), &[])?
            .rows
        {
            tables.push(bincode::deserialize::<TableSchema>(blob(&row)?)?);
        }
        info!(
            "catalog: loaded {} databases and {} tables",
            databases.len(),
            tables.len()
        );
        Ok(Catalog::from_parts(&self.default_database, databases, tables))
    }

    /// Shared view of the current catalog.
    pub fn read(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read()
    }

    /// Owned copy, used to restore the catalog when DDL fails natively.
    pub fn snapshot(&self) -> Catalog {
        self.catalog.read().clone()
    }

    pub fn restore(&self, catalog: Catalog) {
        *self.catalog.write() = catalog;
    }

    /// Put back the temporary tables of `snapshot`, keeping the persistent part.
    pub fn restore_temporary(&self, snapshot: &Catalog) {
        self.catalog.write().replace_temporary(snapshot);
    }

    /// Apply mutations in order; either all apply or none do.
    pub fn apply(&self, mutations: &[Mutation]) -> Result<()> {
        let mut catalog = self.catalog.write();
        let mut next = catalog.clone();
        for mutation in mutations {
            next.apply(mutation)?;
        }
        *catalog = next;
        Ok(())
    }

    /// Rewrite the persisted catalog and bump the generation counter. Runs
    /// inside the caller's transaction.
    pub fn persist(&self, engine: &dyn NativeEngine) -> Result<()> {
        let catalog = self.catalog.read();
        engine.execute_native(&format!("DELETE FROM main.{SCHEMATA}"), &[])?;
        engine.execute_native(&format!("DELETE FROM main.{TABLES}"), &[])?;
        for db in catalog.databases() {
            engine.execute_native(
                &format!("INSERT INTO main.{SCHEMATA}(name, definition) VALUES (?1, ?2)"),
                &[Value::text(db.name.clone()), Value::Bytes(bincode::serialize(db)?)],
            )?;
        }
        for table in catalog.tables() {
            engine.execute_native(
                &format!("INSERT INTO main.{TABLES}(database, name, definition) VALUES (?1, ?2, ?3)"),
                &[
                    Value::text(table.database.clone()),
                    Value::text(table.name.clone()),
                    Value::Bytes(bincode::serialize(table)?),
                ],
            )?;
        }
        engine.execute_native(
            &format!("UPDATE main.{META} SET value = CAST(value AS INTEGER) + 1 WHERE key = 'generation'"),
            &[],
        )?;
        info!(
            "catalog: persisted {} databases and {} tables",
            catalog.databases().count(),
            catalog.tables().count()
        );
        Ok(())
    }

    fn current_stamp(engine: &dyn NativeEngine) -> Result<Stamp> {
        let generation = read_meta(engine, "generation")?
            .and_then(|g| g.parse().ok())
            .unwrap_or(0);
        Ok(Stamp {
            schema_version: engine.schema_version()?,
            generation,
        })
    }

    /// Record that the in-memory catalog matches the file as it is now.
    pub fn mark_current(&self, engine: &dyn NativeEngine) -> Result<()> {
        *self.stamp.write() = Self::current_stamp(engine)?;
        Ok(())
    }

    /// Reload the persistent part if another connection changed the file.
    /// Temporary tables of this connection are kept.
    pub fn reload_if_stale(&self, engine: &dyn NativeEngine) -> Result<bool> {
        let now = Self::current_stamp(engine)?;
        if now == *self.stamp.read() {
            return Ok(false);
        }
        debug!("catalog: file changed since load, reloading");
        let loaded = self.load(engine)?;
        self.catalog.write().replace_persistent(loaded);
        *self.stamp.write() = now;
        Ok(true)
    }
}

fn read_meta(engine: &dyn NativeEngine, key: &str) -> Result<Option<String>> {
    let rows = engine.query_native(
        &format!("SELECT value FROM main.{META} WHERE key = ?1"),
        &[Value::text(key)],
    )?;
    Ok(rows.scalar().and_then(Value::to_text))
}

fn blob(row: &[Value]) -> Result<&[u8]> {
    match row.first() {
        Some(Value::Bytes(b)) => Ok(b),
        _ => Err(DriverError::Serialization("catalog definition is not a blob".into())),
    }
}

/// Whether a native table belongs to the driver's own bookkeeping.
pub fn is_internal_table(native_name: &str) -> bool {
    [META, SCHEMATA, TABLES]
        .iter()
        .any(|t| t.eq_ignore_ascii_case(native_name))
        || native_name.to_ascii_lowercase().starts_with(&format!("{}tmp_", RESERVED_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnSchema, TableSchema};
    use crate::engine::SqliteEngine;
    use crate::types::DataType;

    fn table(name: &str) -> TableSchema {
        let mut t = TableSchema::new("app", name);
        t.columns.push(ColumnSchema::new("id", DataType::int()));
        t.comment = "persisted".into();
        t
    }

    #[test]
    fn test_open_creates_default_database() {
        let config = DriverConfig::in_memory("app");
        let engine = SqliteEngine::open(&config).unwrap();
        let registry = SchemaRegistry::open(&engine, &config).unwrap();
        assert!(registry.read().has_database("app"));
        assert!(engine.table_exists("main", SCHEMATA).unwrap());
    }

    #[test]
    fn test_persistence() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = DriverConfig::in_memory("app").with_path(temp_dir.path().join("app.db"));

        {
            let engine = SqliteEngine::open(&config).unwrap();
            let registry = SchemaRegistry::open(&engine, &config).unwrap();
            registry.apply(&[Mutation::CreateTable(table("users"))]).unwrap();
            registry.persist(&engine).unwrap();
        }

        {
            let engine = SqliteEngine::open(&config).unwrap();
            let registry = SchemaRegistry::open(&engine, &config).unwrap();
            let catalog = registry.read();
            let users = catalog.lookup_table("app", "users", false).unwrap();
            assert_eq!(users.columns.len(), 1);
            assert_eq!(users.comment, "persisted");
        }
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let config = DriverConfig::in_memory("app");
        let engine = SqliteEngine::open(&config).unwrap();
        let registry = SchemaRegistry::open(&engine, &config).unwrap();
        let err = registry
            .apply(&[Mutation::CreateTable(table("a")), Mutation::CreateTable(table("a"))])
            .unwrap_err();
        assert_eq!(err.code(), 1050);
        assert!(registry.read().lookup_table("app", "a", true).is_none());
    }

    #[test]
    fn test_reload_when_another_connection_changes_the_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = DriverConfig::in_memory("app").with_path(temp_dir.path().join("shared.db"));

        let engine_a = SqliteEngine::open(&config).unwrap();
        let registry_a = SchemaRegistry::open(&engine_a, &config).unwrap();
        let engine_b = SqliteEngine::open(&config).unwrap();
        let registry_b = SchemaRegistry::open(&engine_b, &config).unwrap();

        let mut temp = table("scratch");
        temp.temporary = true;
        registry_b.apply(&[Mutation::CreateTable(temp)]).unwrap();
        assert!(!registry_b.reload_if_stale(&engine_b).unwrap());

        registry_a.apply(&[Mutation::CreateTable(table("orders"))]).unwrap();
        registry_a.persist(&engine_a).unwrap();

        assert!(registry_b.reload_if_stale(&engine_b).unwrap());
        let catalog = registry_b.read();
        assert!(catalog.lookup_table("app", "orders", false).is_some());
        assert!(catalog.temporary_table("app", "scratch").is_some());
    }

    #[test]
    fn test_internal_tables_recognized() {
        assert!(is_internal_table("_mysqlite_meta"));
        assert!(is_internal_table("_MYSQLITE_TABLES"));
        assert!(!is_internal_table("users"));
    }
}
