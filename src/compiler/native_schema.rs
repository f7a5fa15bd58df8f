//! Native projection of catalog tables
//!
//! A catalog table becomes one native table plus native indexes and
//! triggers. Indexes and triggers are derived objects: the DDL compiler
//! computes the full set before and after a change and replays only the
//! difference.
//!
//! Foreign keys are enforced entirely by triggers (native enforcement stays
//! off), each guarded by `_mysqlite_fk_checks()` so `foreign_key_checks=0`
//! takes effect immediately. CHECK constraints are native table constraints.

use super::render::quote_literal;
use super::scope::Scope;
use super::{Compiler, Emit};
use crate::catalog::information_schema::column_charset;
use crate::catalog::{
    foreign_key_clause, is_case_insensitive, quote_native, Catalog, ColumnSchema, ForeignKeySchema, IndexKind,
    ReferentialAction, TableSchema,
};
use crate::engine::raise_message;
use crate::error::{DriverError, Result};
use crate::sql::{parse_expression, LexerOptions};
use crate::types::{TypeFamily, Value};

/// A trigger generated from catalog state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTrigger {
    pub name: String,
    /// `main` or `temp`
    pub schema: &'static str,
    /// Native table the trigger fires on
    pub table: String,
    pub sql: String,
}

impl NativeTrigger {
    pub fn drop_sql(&self) -> String {
        format!("DROP TRIGGER IF EXISTS {}.{}", quote_native(self.schema), quote_native(&self.name))
    }
}

/// A native index generated from a catalog index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NativeIndex {
    pub name: String,
    pub schema: &'static str,
    pub table: String,
    pub sql: String,
}

impl NativeIndex {
    pub fn drop_sql(&self) -> String {
        format!("DROP INDEX IF EXISTS {}.{}", quote_native(self.schema), quote_native(&self.name))
    }
}

pub(crate) fn schema_of(table: &TableSchema) -> &'static str {
    if table.temporary {
        "temp"
    } else {
        "main"
    }
}

/// The AUTO_INCREMENT column stored as the native rowid alias: the sole
/// primary key column, or the sole unique key column of a table without one.
pub(crate) fn rowid_alias(table: &TableSchema) -> Option<&ColumnSchema> {
    let auto = table.auto_increment_column()?;
    if auto.data_type.family() != TypeFamily::Integer {
        return None;
    }
    let sole = |kind: IndexKind| {
        table
            .indexes
            .iter()
            .any(|i| i.kind == kind && i.parts.len() == 1 && i.covers(&auto.name))
    };
    match table.primary_key() {
        Some(_) if sole(IndexKind::Primary) => Some(auto),
        None if sole(IndexKind::Unique) => Some(auto),
        _ => None,
    }
}

fn native_collation(table: &TableSchema, column: &ColumnSchema) -> Option<&'static str> {
    match column_charset(table, column).1 {
        Value::Text(collation) if is_case_insensitive(&collation) => Some("NOCASE"),
        _ => None,
    }
}

fn column_sql(table: &TableSchema, column: &ColumnSchema, alias: bool) -> String {
    let mut sql = format!("{} {}", quote_native(&column.name), column.data_type.native_type());
    if alias {
        sql.push_str(" PRIMARY KEY AUTOINCREMENT");
        return sql;
    }
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(collation) = native_collation(table, column) {
        sql.push_str(" COLLATE ");
        sql.push_str(collation);
    }
    sql
}

fn quoted_list<'s>(names: impl IntoIterator<Item = &'s String>) -> String {
    names.into_iter().map(|n| quote_native(n)).collect::<Vec<_>>().join(", ")
}

/// `"a" = OLD."b" AND ...` joining column lists pairwise.
fn pairs(left: &[String], right_prefix: &str, right: &[String], joiner: &str) -> String {
    left.iter()
        .zip(right)
        .map(|(l, r)| format!("{} = {}{}", quote_native(l), right_prefix, quote_native(r)))
        .collect::<Vec<_>>()
        .join(joiner)
}

impl Compiler<'_> {
    /// `CREATE TABLE` for the native table of `table`, named `native`.
    pub(crate) fn create_table_sql(&self, table: &TableSchema, native: &str) -> Result<String> {
        if table.auto_increment_column().is_some() && rowid_alias(table).is_none() {
            return Err(DriverError::NotSupported(
                "AUTO_INCREMENT on a column that is not the sole integer key".into(),
            ));
        }
        let alias = rowid_alias(table).map(|c| c.name.as_str());
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| column_sql(table, c, Some(c.name.as_str()) == alias))
            .collect();
        if let (Some(pk), None) = (table.primary_key(), alias) {
            parts.push(format!("PRIMARY KEY ({})", quoted_list(pk.parts.iter().map(|p| &p.column))));
        }
        for check in table.checks.iter().filter(|c| c.enforced) {
            parts.push(format!("CONSTRAINT {} CHECK ({})", quote_native(&check.name), self.check_sql(table, &check.expr)?));
        }
        Ok(if table.temporary {
            format!("CREATE TEMP TABLE {} ({})", quote_native(native), parts.join(", "))
        } else {
            format!("CREATE TABLE \"main\".{} ({})", quote_native(native), parts.join(", "))
        })
    }

    /// A CHECK expression over bare column names with inline literals.
    fn check_sql(&self, table: &TableSchema, text: &str) -> Result<String> {
        let expr = parse_expression(text, LexerOptions::default())?;
        let scope = Scope::bare(table);
        let mut out = Emit::inline();
        self.expr(&expr, &scope, &mut out)
    }
}

/// Native indexes of `table`; PRIMARY is part of the table itself and
/// FULLTEXT / SPATIAL live in the catalog only. Prefix lengths are dropped.
pub(crate) fn index_set(catalog: &Catalog, table: &TableSchema) -> Vec<NativeIndex> {
    let native = catalog.native_name(table);
    let schema = schema_of(table);
    table
        .indexes
        .iter()
        .filter(|i| i.kind.is_native())
        .filter(|i| !(i.kind == IndexKind::Unique && rowid_alias(table).map_or(false, |c| i.parts.len() == 1 && i.covers(&c.name))))
        .map(|index| {
            let name = catalog.native_index_name(table, &index.name);
            let parts: Vec<String> = index
                .parts
                .iter()
                .map(|p| {
                    if p.desc {
                        format!("{} DESC", quote_native(&p.column))
                    } else {
                        quote_native(&p.column)
                    }
                })
                .collect();
            let sql = format!(
                "CREATE {}INDEX {}.{} ON {} ({})",
                if index.kind == IndexKind::Unique { "UNIQUE " } else { "" },
                quote_native(schema),
                quote_native(&name),
                quote_native(&native),
                parts.join(", ")
            );
            NativeIndex {
                name,
                schema,
                table: native.clone(),
                sql,
            }
        })
        .collect()
}

/// Statements setting the next AUTOINCREMENT value of a native table.
pub(crate) fn sequence_sql(schema: &str, native: &str, next: u64) -> Vec<String> {
    let sequence = format!("{}.\"sqlite_sequence\"", quote_native(schema));
    vec![
        format!("DELETE FROM {} WHERE name = {}", sequence, quote_literal(native)),
        format!(
            "INSERT INTO {} (name, seq) VALUES ({}, {})",
            sequence,
            quote_literal(native),
            next.saturating_sub(1)
        ),
    ]
}

/// Current time as MySQL renders it at `fsp` fractional digits, computed by the engine.
fn now_sql(fsp: u32) -> String {
    if fsp == 0 {
        "strftime('%Y-%m-%d %H:%M:%S', 'now')".to_string()
    } else {
        format!("substr(strftime('%Y-%m-%d %H:%M:%f', 'now') || '000', 1, {})", 20 + fsp.min(6))
    }
}

fn trigger(table: &TableSchema, native: &str, name: String, body: String) -> NativeTrigger {
    let schema = schema_of(table);
    let sql = if table.temporary {
        format!("CREATE TEMP TRIGGER {} {}", quote_native(&name), body)
    } else {
        format!("CREATE TRIGGER \"main\".{} {}", quote_native(&name), body)
    };
    NativeTrigger {
        name,
        schema,
        table: native.to_string(),
        sql,
    }
}

fn raise(code: u16, message: &str) -> String {
    format!("SELECT RAISE(ABORT, {});", quote_literal(&raise_message(code, message)))
}

/// Every trigger that fires on `table`: ON UPDATE CURRENT_TIMESTAMP
/// maintenance, child-side checks of its own foreign keys, and parent-side
/// actions of foreign keys referencing it.
pub fn trigger_set(catalog: &Catalog, table: &TableSchema) -> Vec<NativeTrigger> {
    let native = catalog.native_name(table);
    let mut out = Vec::new();

    for column in table.columns.iter().filter(|c| c.on_update_current_timestamp) {
        let c = quote_native(&column.name);
        out.push(trigger(
            table,
            &native,
            format!("{}__ts_{}", native, column.name),
            format!(
                "AFTER UPDATE ON {t} FOR EACH ROW WHEN NEW.{c} IS OLD.{c} BEGIN UPDATE {t} SET {c} = {now} WHERE rowid = NEW.rowid; END",
                t = quote_native(&native),
                c = c,
                now = now_sql(column.data_type.fsp())
            ),
        ));
    }
    if table.temporary {
        return out;
    }

    for fk in &table.foreign_keys {
        if let Some(parent) = catalog.lookup_table(&fk.ref_database, &fk.ref_table, false) {
            out.extend(child_triggers(catalog, table, fk, parent));
        }
    }
    for (child, fk) in catalog.referencing_foreign_keys(&table.database, &table.name) {
        if !child.temporary {
            out.extend(parent_triggers(catalog, child, fk, table));
        }
    }
    out
}

/// Every generated trigger of the catalog.
pub(crate) fn all_triggers(catalog: &Catalog) -> Vec<NativeTrigger> {
    catalog
        .tables()
        .chain(catalog.temporary_tables())
        .flat_map(|t| trigger_set(catalog, t))
        .collect()
}

/// Inserted or updated child rows must find their parent.
fn child_triggers(catalog: &Catalog, child: &TableSchema, fk: &ForeignKeySchema, parent: &TableSchema) -> Vec<NativeTrigger> {
    let native = catalog.native_name(child);
    let message = format!(
        "Cannot add or update a child row: a foreign key constraint fails (`{}`.`{}`, {})",
        child.database,
        child.name,
        foreign_key_clause(child, fk)
    );
    let present: Vec<String> = fk.columns.iter().map(|c| format!("NEW.{} IS NOT NULL", quote_native(c))).collect();
    let condition = format!(
        "_mysqlite_fk_checks() AND {} AND NOT EXISTS (SELECT 1 FROM {} WHERE {})",
        present.join(" AND "),
        quote_native(&catalog.native_name(parent)),
        pairs(&fk.ref_columns, "NEW.", &fk.columns, " AND ")
    );
    let t = quote_native(&native);
    vec![
        trigger(
            child,
            &native,
            format!("{}__fk_{}_ins", native, fk.name),
            format!("BEFORE INSERT ON {} FOR EACH ROW WHEN {} BEGIN {} END", t, condition, raise(1452, &message)),
        ),
        trigger(
            child,
            &native,
            format!("{}__fk_{}_upd", native, fk.name),
            format!(
                "BEFORE UPDATE OF {} ON {} FOR EACH ROW WHEN {} BEGIN {} END",
                quoted_list(&fk.columns),
                t,
                condition,
                raise(1452, &message)
            ),
        ),
    ]
}

/// Deleting or re-keying a parent row restricts, cascades or nulls out its children.
fn parent_triggers(catalog: &Catalog, child: &TableSchema, fk: &ForeignKeySchema, parent: &TableSchema) -> Vec<NativeTrigger> {
    let child_native = quote_native(&catalog.native_name(child));
    let native = catalog.native_name(parent);
    let p = quote_native(&native);
    let prefix = format!("{}__fk_{}", catalog.native_name(child), fk.name);
    let message = format!(
        "Cannot delete or update a parent row: a foreign key constraint fails (`{}`.`{}`, {})",
        child.database,
        child.name,
        foreign_key_clause(child, fk)
    );
    let matches = pairs(&fk.columns, "OLD.", &fk.ref_columns, " AND ");
    let referenced = format!("EXISTS (SELECT 1 FROM {} WHERE {})", child_native, matches);
    let nulls = fk
        .columns
        .iter()
        .map(|c| format!("{} = NULL", quote_native(c)))
        .collect::<Vec<_>>()
        .join(", ");

    let on_delete = match fk.on_delete {
        ReferentialAction::Cascade => format!(
            "AFTER DELETE ON {} FOR EACH ROW WHEN _mysqlite_fk_checks() BEGIN DELETE FROM {} WHERE {}; END",
            p, child_native, matches
        ),
        ReferentialAction::SetNull => format!(
            "AFTER DELETE ON {} FOR EACH ROW WHEN _mysqlite_fk_checks() BEGIN UPDATE {} SET {} WHERE {}; END",
            p, child_native, nulls, matches
        ),
        _ => format!(
            "BEFORE DELETE ON {} FOR EACH ROW WHEN _mysqlite_fk_checks() AND {} BEGIN {} END",
            p,
            referenced,
            raise(1451, &message)
        ),
    };

    let changed = fk
        .ref_columns
        .iter()
        .map(|c| format!("NEW.{c} IS NOT OLD.{c}", c = quote_native(c)))
        .collect::<Vec<_>>()
        .join(" OR ");
    let of = quoted_list(&fk.ref_columns);
    let on_update = match fk.on_update {
        ReferentialAction::Cascade => format!(
            "AFTER UPDATE OF {} ON {} FOR EACH ROW WHEN _mysqlite_fk_checks() AND ({}) BEGIN UPDATE {} SET {} WHERE {}; END",
            of,
            p,
            changed,
            child_native,
            pairs(&fk.columns, "NEW.", &fk.ref_columns, ", "),
            matches
        ),
        ReferentialAction::SetNull => format!(
            "AFTER UPDATE OF {} ON {} FOR EACH ROW WHEN _mysqlite_fk_checks() AND ({}) BEGIN UPDATE {} SET {} WHERE {}; END",
            of, p, changed, child_native, nulls, matches
        ),
        _ => format!(
            "BEFORE UPDATE OF {} ON {} FOR EACH ROW WHEN _mysqlite_fk_checks() AND ({}) AND {} BEGIN {} END",
            of,
            p,
            changed,
            referenced,
            raise(1451, &message)
        ),
    };

    vec![
        trigger(parent, &native, format!("{}_del", prefix), on_delete),
        trigger(parent, &native, format!("{}_pupd", prefix), on_update),
    ]
}

#[cfg(test)]
mod tests {
    use super::super::testing::{catalog, session};
    use super::*;

    #[test]
    fn test_table_body() {
        let catalog = catalog(&[
            "CREATE TABLE users (id INT AUTO_INCREMENT PRIMARY KEY, name VARCHAR(20) NOT NULL, \
             code VARBINARY(8), age INT, CONSTRAINT adult CHECK (age >= 18))",
        ]);
        let session = session();
        let compiler = Compiler::new(&catalog, &session, &[]);
        let users = catalog.lookup_table("app", "users", true).unwrap();
        assert_eq!(
            compiler.create_table_sql(users, "users").unwrap(),
            "CREATE TABLE \"main\".\"users\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"name\" TEXT NOT NULL COLLATE NOCASE, \"code\" BLOB, \"age\" INTEGER, \
             CONSTRAINT \"adult\" CHECK ((\"age\" >= 18)))"
        );
    }

    #[test]
    fn test_composite_key_and_indexes() {
        let catalog = catalog(&[
            "CREATE TABLE pairs (a INT, b VARCHAR(10) COLLATE utf8mb4_bin, PRIMARY KEY (a, b), \
             KEY idx_b (b(4) DESC), FULLTEXT KEY ft (b))",
        ]);
        let session = session();
        let compiler = Compiler::new(&catalog, &session, &[]);
        let pairs = catalog.lookup_table("app", "pairs", true).unwrap();
        let sql = compiler.create_table_sql(pairs, "pairs").unwrap();
        assert!(sql.ends_with("\"b\" TEXT NOT NULL, PRIMARY KEY (\"a\", \"b\"))"));
        let indexes = index_set(&catalog, pairs);
        assert_eq!(indexes.len(), 1);
        assert_eq!(
            indexes[0].sql,
            "CREATE INDEX \"main\".\"pairs__idx_b\" ON \"pairs\" (\"b\" DESC)"
        );
    }

    #[test]
    fn test_foreign_key_triggers() {
        let catalog = catalog(&[
            "CREATE TABLE parent (id INT PRIMARY KEY)",
            "CREATE TABLE child (id INT, pid INT, FOREIGN KEY (pid) REFERENCES parent (id) ON DELETE CASCADE)",
        ]);
        let parent = catalog.lookup_table("app", "parent", true).unwrap();
        let child = catalog.lookup_table("app", "child", true).unwrap();

        let on_child = trigger_set(&catalog, child);
        let names: Vec<&str> = on_child.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["child__fk_child_ibfk_1_ins", "child__fk_child_ibfk_1_upd"]);
        assert!(on_child[0].sql.contains("NOT EXISTS (SELECT 1 FROM \"parent\" WHERE \"id\" = NEW.\"pid\")"));
        assert!(on_child[0].sql.contains("a foreign key constraint fails (`app`.`child`, CONSTRAINT `child_ibfk_1`"));

        let on_parent = trigger_set(&catalog, parent);
        assert_eq!(on_parent.len(), 2);
        assert!(on_parent[0]
            .sql
            .contains("AFTER DELETE ON \"parent\" FOR EACH ROW WHEN _mysqlite_fk_checks() BEGIN DELETE FROM \"child\" WHERE \"pid\" = OLD.\"id\"; END"));
        assert!(on_parent[1].sql.contains("RAISE(ABORT, '_mysqlite_constraint:1451:"));
        assert_eq!(all_triggers(&catalog).len(), 4);
    }

    #[test]
    fn test_on_update_timestamp_trigger() {
        let catalog = catalog(&[
            "CREATE TABLE t (id INT, changed TIMESTAMP(3) DEFAULT CURRENT_TIMESTAMP(3) ON UPDATE CURRENT_TIMESTAMP(3))",
        ]);
        let t = catalog.lookup_table("app", "t", true).unwrap();
        let triggers = trigger_set(&catalog, t);
        assert_eq!(triggers.len(), 1);
        assert_eq!(
            triggers[0].sql,
            "CREATE TRIGGER \"main\".\"t__ts_changed\" AFTER UPDATE ON \"t\" FOR EACH ROW \
             WHEN NEW.\"changed\" IS OLD.\"changed\" BEGIN UPDATE \"t\" SET \"changed\" = \
             substr(strftime('%Y-%m-%d %H:%M:%f', 'now') || '000', 1, 23) WHERE rowid = NEW.rowid; END"
        );
    }

    #[test]
    fn test_sequence_statements() {
        let sql = sequence_sql("main", "t", 100);
        assert_eq!(sql[1], "INSERT INTO \"main\".\"sqlite_sequence\" (name, seq) VALUES ('t', 99)");
    }
}
