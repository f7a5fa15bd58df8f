//! Result formatting
//!
//! Native rows come back with the engine's loose typing. Before they reach
//! the host they are rendered the way the emulated server sends them: each
//! value in the canonical text form of its declared column type, NULL kept
//! apart from the empty string, plus per-column metadata.

use crate::cast::cast_for_read;
use crate::catalog::{ColumnSchema, IndexKind, TableSchema};
use crate::engine::RowSet;
use crate::types::{DataType, Value};
use std::collections::HashMap;

/// Metadata of one result column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    /// Label: the alias, or the expression text
    pub label: String,
    /// Underlying column name, empty for computed columns
    pub name: String,
    /// Table alias the column came through
    pub table: String,
    /// Underlying table name
    pub org_table: String,
    pub database: String,
    /// Declared type text, e.g. `varchar(20)` or `decimal(10,2)`
    pub column_type: String,
    pub nullable: bool,
    /// Key membership, reported next to `nullable` in the field flags
    pub keys: KeyFlags,
    /// Declared type; drives the canonical rendering of values
    pub data_type: Option<DataType>,
}

/// Index membership of a table column as the server flags it: part of the
/// primary key, part of a unique key, or leading a non-unique index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyFlags {
    pub primary_key: bool,
    pub unique_key: bool,
    pub multiple_key: bool,
    pub auto_increment: bool,
}

impl KeyFlags {
    pub fn of(table: &TableSchema, column: &ColumnSchema) -> Self {
        let name = column.name.as_str();
        let has = |kind: IndexKind| table.indexes.iter().any(|i| i.kind == kind && i.covers(name));
        let leads = table.indexes.iter().any(|i| {
            !matches!(i.kind, IndexKind::Primary | IndexKind::Unique)
                && i.parts.first().is_some_and(|p| p.column.eq_ignore_ascii_case(name))
        });
        Self {
            primary_key: has(IndexKind::Primary),
            unique_key: has(IndexKind::Unique),
            multiple_key: leads,
            auto_increment: column.auto_increment,
        }
    }
}

impl ColumnMeta {
    /// Column backed by a table column.
    pub fn for_column(
        label: impl Into<String>,
        database: &str,
        table: &str,
        org_table: &str,
        column: &ColumnSchema,
    ) -> Self {
        Self {
            label: label.into(),
            name: column.name.clone(),
            table: table.to_string(),
            org_table: org_table.to_string(),
            database: database.to_string(),
            column_type: column.data_type.column_type(),
            nullable: column.nullable,
            keys: KeyFlags {
                auto_increment: column.auto_increment,
                ..KeyFlags::default()
            },
            data_type: Some(column.data_type.clone()),
        }
    }

    pub fn with_keys(mut self, keys: KeyFlags) -> Self {
        self.keys = keys;
        self
    }

    /// Computed column, optionally with an inferred type.
    pub fn expression(label: impl Into<String>, data_type: Option<DataType>) -> Self {
        let column_type = data_type.as_ref().map(DataType::column_type).unwrap_or_default();
        Self {
            label: label.into(),
            name: String::new(),
            table: String::new(),
            org_table: String::new(),
            database: String::new(),
            column_type,
            nullable: true,
            keys: KeyFlags::default(),
            data_type,
        }
    }

    /// Plain text column, as used by SHOW output.
    pub fn text(label: impl Into<String>) -> Self {
        Self::expression(label, None)
    }

    /// Upper-case type name the column reports, `VARCHAR` for untyped columns.
    pub fn type_name(&self) -> String {
        match &self.data_type {
            Some(ty) => ty.kind.name().to_ascii_uppercase(),
            None => "VARCHAR".to_string(),
        }
    }
}

/// Outcome of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<Option<String>>>,
    /// Rows inserted, deleted or changed; 0 for result sets
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub warning_count: usize,
}

impl QueryResult {
    pub fn affected(rows: u64) -> Self {
        Self {
            affected_rows: rows,
            ..Default::default()
        }
    }

    /// Whether the statement produced a result set.
    pub fn is_result_set(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }

    /// Position of the first column with this label (case-insensitive).
    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.label.eq_ignore_ascii_case(label))
    }

    /// Value of a labelled column in row `row`; `None` for NULL or a missing cell.
    pub fn get(&self, row: usize, label: &str) -> Option<&str> {
        let i = self.column_index(label)?;
        self.rows.get(row)?.get(i)?.as_deref()
    }

    /// Rows keyed by column label.
    pub fn rows_as_maps(&self) -> Vec<HashMap<String, Option<String>>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(c, v)| (c.label.clone(), v.clone()))
                    .collect()
            })
            .collect()
    }
}

/// Render every cell of `rows` for the given result columns.
pub fn format_rows(columns: &[ColumnMeta], rows: RowSet) -> Vec<Vec<Option<String>>> {
    rows.rows
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, v)| render_value(v, columns.get(i).and_then(|c| c.data_type.as_ref())))
                .collect()
        })
        .collect()
}

/// Canonical text of one value. `None` is SQL NULL.
pub fn render_value(value: &Value, ty: Option<&DataType>) -> Option<String> {
    let shown = match ty {
        Some(ty) => cast_for_read(value, ty),
        None => value.clone(),
    };
    match shown {
        Value::Null => None,
        Value::Bytes(b) => Some(String::from_utf8_lossy(&b).into_owned()),
        other => other.to_text(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{IndexPart, IndexSchema};
    use crate::types::TypeKind;

    fn decimal(precision: u32, scale: u32) -> DataType {
        let mut t = DataType::new(TypeKind::Decimal);
        t.precision = Some(precision);
        t.scale = Some(scale);
        t
    }

    #[test]
    fn test_null_and_empty_string_differ() {
        let columns = vec![ColumnMeta::text("a"), ColumnMeta::text("b")];
        let rows = RowSet {
            columns: vec!["a".into(), "b".into()],
            rows: vec![vec![Value::Null, Value::text("")]],
        };
        let formatted = format_rows(&columns, rows);
        assert_eq!(formatted, vec![vec![None, Some(String::new())]]);
    }

    #[test]
    fn test_key_flags_follow_indexes() {
        let mut table = TableSchema::new("app", "rt");
        let mut id = ColumnSchema::new("id", DataType::int());
        id.nullable = false;
        id.auto_increment = true;
        table.columns = vec![id, ColumnSchema::new("code", DataType::varchar(8)), ColumnSchema::new("n", DataType::int())];
        let index = |name: &str, kind: IndexKind, column: &str| IndexSchema {
            name: name.to_string(),
            kind,
            parts: vec![IndexPart::column(column)],
            visible: true,
            comment: String::new(),
        };
        table.indexes = vec![
            index("PRIMARY", IndexKind::Primary, "id"),
            index("uq", IndexKind::Unique, "code"),
            index("idx_n", IndexKind::Regular, "n"),
        ];

        let flags: Vec<KeyFlags> = table.columns.iter().map(|c| KeyFlags::of(&table, c)).collect();
        assert!(flags[0].primary_key && flags[0].auto_increment && !flags[0].unique_key);
        assert!(flags[1].unique_key && !flags[1].primary_key);
        assert!(flags[2].multiple_key && !flags[2].unique_key);

        let meta = ColumnMeta::for_column("id", "app", "rt", "rt", &table.columns[0]).with_keys(flags[0]);
        assert!(!meta.nullable);
        assert!(meta.keys.primary_key);
        assert_eq!(ColumnMeta::text("x").keys, KeyFlags::default());
    }

    #[test]
    fn test_declared_type_drives_rendering() {
        let column = ColumnSchema::new("price", decimal(10, 2));
        let meta = ColumnMeta::for_column("price", "app", "p", "products", &column);
        assert_eq!(meta.column_type, "decimal(10,2)");
        assert_eq!(meta.type_name(), "DECIMAL");
        assert_eq!(render_value(&Value::Float(9.5), meta.data_type.as_ref()).as_deref(), Some("9.50"));
        assert_eq!(render_value(&Value::Integer(3), None).as_deref(), Some("3"));
        assert_eq!(render_value(&Value::Float(0.5), None).as_deref(), Some("0.5"));
    }

    #[test]
    fn test_lookup_by_label() {
        let result = QueryResult {
            columns: vec![ColumnMeta::text("id"), ColumnMeta::text("Name")],
            rows: vec![vec![Some("1".into()), None]],
            ..Default::default()
        };
        assert!(result.is_result_set());
        assert_eq!(result.get(0, "ID"), Some("1"));
        assert_eq!(result.get(0, "name"), None);
        assert_eq!(result.labels(), vec!["id", "Name"]);
        let maps = result.rows_as_maps();
        assert_eq!(maps[0].get("id"), Some(&Some("1".to_string())));
    }
}
