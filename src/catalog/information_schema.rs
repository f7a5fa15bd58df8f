//! `information_schema` views computed from catalog state
//!
//! Each view is materialized as a [`RowSet`] with the column names and order
//! of MySQL 8. Temporary tables never appear. Anything beyond the simple
//! schema/table filter (joins, arbitrary WHERE) is evaluated by the caller.

use super::charset::{CHARSETS, COLLATIONS};
use super::schema::*;
use super::{Catalog, INFORMATION_SCHEMA};
use crate::cast::cast_for_read;
use crate::engine::RowSet;
use crate::error::CatalogError;
use crate::types::{TypeFamily, Value};

/// Views this module serves, in `SHOW TABLES FROM information_schema` order.
pub const VIEWS: &[&str] = &[
    "CHARACTER_SETS",
    "CHECK_CONSTRAINTS",
    "COLLATIONS",
    "COLUMNS",
    "KEY_COLUMN_USAGE",
    "REFERENTIAL_CONSTRAINTS",
    "SCHEMATA",
    "STATISTICS",
    "TABLES",
    "TABLE_CONSTRAINTS",
];

/// Live numbers the catalog does not hold.
pub trait TableStats {
    fn row_count(&self, table: &TableSchema) -> Option<u64>;
    /// Value the next generated AUTO_INCREMENT id would take.
    fn next_auto_increment(&self, table: &TableSchema) -> Option<u64>;
}

/// Stats source that knows nothing.
pub struct NoStats;

impl TableStats for NoStats {
    fn row_count(&self, _: &TableSchema) -> Option<u64> {
        None
    }

    fn next_auto_increment(&self, _: &TableSchema) -> Option<u64> {
        None
    }
}

/// Equality restrictions on the schema and table columns of a view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub schema: Option<String>,
    pub table: Option<String>,
}

impl Filter {
    pub fn schema(name: impl Into<String>) -> Self {
        Self {
            schema: Some(name.into()),
            table: None,
        }
    }

    pub fn table(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            table: Some(table.into()),
        }
    }

    fn accepts(&self, schema: &str, table: Option<&str>) -> bool {
        let schema_ok = self
            .schema
            .as_ref()
            .map_or(true, |s| s.eq_ignore_ascii_case(schema));
        let table_ok = match (&self.table, table) {
            (Some(want), Some(t)) => want.eq_ignore_ascii_case(t),
            _ => true,
        };
        schema_ok && table_ok
    }
}

fn text(s: &str) -> Value {
    Value::text(s)
}

fn int(n: usize) -> Value {
    Value::Integer(n as i64)
}

fn opt_u64(n: Option<u64>) -> Value {
    n.map_or(Value::Null, |n| Value::Integer(n as i64))
}

fn yes_no(b: bool) -> Value {
    text(if b { "YES" } else { "NO" })
}

fn rowset(columns: &[&str], rows: Vec<Vec<Value>>) -> RowSet {
    RowSet {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows,
    }
}

/// Materialize one view.
pub fn query_information_schema(
    catalog: &Catalog,
    view: &str,
    filter: &Filter,
    stats: &dyn TableStats,
) -> Result<RowSet, CatalogError> {
    let tables: Vec<&TableSchema> = catalog
        .tables()
        .filter(|t| filter.accepts(&t.database, Some(&t.name)))
        .collect();
    let rows = match view.to_ascii_uppercase().as_str() {
        "SCHEMATA" => schemata(catalog, filter),
        "TABLES" => tables_view(&tables, filter, stats),
        "COLUMNS" => columns_view(&tables),
        "STATISTICS" => statistics(&tables),
        "TABLE_CONSTRAINTS" => table_constraints(&tables),
        "KEY_COLUMN_USAGE" => key_column_usage(&tables),
        "REFERENTIAL_CONSTRAINTS" => referential_constraints(catalog, &tables),
        "CHECK_CONSTRAINTS" => check_constraints(&tables),
        "COLLATIONS" => collations(),
        "CHARACTER_SETS" => character_sets(),
        _ => {
            return Err(CatalogError::NoSuchTable {
                database: INFORMATION_SCHEMA.to_string(),
                table: view.to_string(),
            })
        }
    };
    Ok(rows)
}

/// Column names of a view, `None` when no such view is served.
pub fn view_columns(view: &str) -> Option<Vec<String>> {
    let empty = Catalog::new(INFORMATION_SCHEMA, "utf8mb3", "utf8mb3_general_ci");
    let none = Filter::table("", "");
    query_information_schema(&empty, view, &none, &NoStats)
        .ok()
        .map(|rows| rows.columns)
}

fn schemata(catalog: &Catalog, filter: &Filter) -> RowSet {
    let mut rows = Vec::new();
    if filter.accepts(INFORMATION_SCHEMA, None) {
        rows.push(vec![
            text("def"),
            text(INFORMATION_SCHEMA),
            text("utf8mb3"),
            text("utf8mb3_general_ci"),
            Value::Null,
            text("NO"),
        ]);
    }
    for db in catalog.databases().filter(|d| filter.accepts(&d.name, None)) {
        rows.push(vec![
            text("def"),
            text(&db.name),
            text(&db.charset),
            text(&db.collation),
            Value::Null,
            text("NO"),
        ]);
    }
    rowset(
        &[
            "CATALOG_NAME",
            "SCHEMA_NAME",
            "DEFAULT_CHARACTER_SET_NAME",
            "DEFAULT_COLLATION_NAME",
            "SQL_PATH",
            "DEFAULT_ENCRYPTION",
        ],
        rows,
    )
}

fn tables_view(tables: &[&TableSchema], filter: &Filter, stats: &dyn TableStats) -> RowSet {
    let mut rows = Vec::new();
    for view in VIEWS.iter().filter(|v| filter.accepts(INFORMATION_SCHEMA, Some(**v))) {
        let mut row = vec![text("def"), text(INFORMATION_SCHEMA), text(view), text("SYSTEM VIEW")];
        row.extend([Value::Null, int(10)]);
        row.extend(std::iter::repeat(Value::Null).take(14));
        row.push(text(""));
        rows.push(row);
    }
    for t in tables {
        let rows_now = stats.row_count(t);
        rows.push(vec![
            text("def"),
            text(&t.database),
            text(&t.name),
            text("BASE TABLE"),
            text(&t.engine),
            int(10),
            text("Dynamic"),
            opt_u64(rows_now),
            Value::Integer(0),
            Value::Integer(16384),
            Value::Integer(0),
            Value::Integer(0),
            Value::Integer(0),
            opt_u64(t.auto_increment_column().and(stats.next_auto_increment(t).or(Some(1)))),
            Value::Null,
            Value::Null,
            Value::Null,
            text(&t.collation),
            Value::Null,
            text(""),
            text(&t.comment),
        ]);
    }
    rowset(
        &[
            "TABLE_CATALOG",
            "TABLE_SCHEMA",
            "TABLE_NAME",
            "TABLE_TYPE",
            "ENGINE",
            "VERSION",
            "ROW_FORMAT",
            "TABLE_ROWS",
            "AVG_ROW_LENGTH",
            "DATA_LENGTH",
            "MAX_DATA_LENGTH",
            "INDEX_LENGTH",
            "DATA_FREE",
            "AUTO_INCREMENT",
            "CREATE_TIME",
            "UPDATE_TIME",
            "CHECK_TIME",
            "TABLE_COLLATION",
            "CHECKSUM",
            "CREATE_OPTIONS",
            "TABLE_COMMENT",
        ],
        rows,
    )
}

/// `COLUMN_DEFAULT` text: the stored value, unquoted.
pub fn column_default_text(column: &ColumnSchema) -> Value {
    match &column.default {
        ColumnDefault::None | ColumnDefault::Null => Value::Null,
        ColumnDefault::Literal(v) => match column.data_type.family() {
            TypeFamily::Bit => text(&format!("b'{:b}'", v.as_f64().unwrap_or(0.0) as u64)),
            _ => cast_for_read(v, &column.data_type)
                .to_text()
                .map_or(Value::Null, Value::Text),
        },
        ColumnDefault::CurrentTimestamp { fsp: 0 } => text("CURRENT_TIMESTAMP"),
        ColumnDefault::CurrentTimestamp { fsp } => text(&format!("CURRENT_TIMESTAMP({})", fsp)),
        ColumnDefault::Expression(expr) => text(expr),
    }
}

/// `EXTRA` text shown by `COLUMNS` and `SHOW COLUMNS`.
pub fn column_extra(column: &ColumnSchema) -> String {
    let mut parts = Vec::new();
    if column.auto_increment {
        parts.push("auto_increment".to_string());
    }
    if matches!(
        column.default,
        ColumnDefault::CurrentTimestamp { .. } | ColumnDefault::Expression(_)
    ) {
        parts.push("DEFAULT_GENERATED".to_string());
    }
    if column.on_update_current_timestamp {
        let fsp = column.data_type.fsp();
        parts.push(if fsp == 0 {
            "on update CURRENT_TIMESTAMP".to_string()
        } else {
            format!("on update CURRENT_TIMESTAMP({})", fsp)
        });
    }
    parts.join(" ")
}

/// Character set and collation in effect for a column, if it has any.
pub fn column_charset(table: &TableSchema, column: &ColumnSchema) -> (Value, Value) {
    if !column.data_type.is_textual() {
        return (Value::Null, Value::Null);
    }
    let charset = column.data_type.charset.clone().unwrap_or_else(|| table.charset.clone());
    let collation = column
        .data_type
        .collation
        .clone()
        .unwrap_or_else(|| match &column.data_type.charset {
            Some(cs) if !cs.eq_ignore_ascii_case(&table.charset) => super::default_collation(cs),
            _ => table.collation.clone(),
        });
    (Value::Text(charset), Value::Text(collation))
}

fn columns_view(tables: &[&TableSchema]) -> RowSet {
    let mut rows = Vec::new();
    for t in tables {
        for (i, c) in t.columns.iter().enumerate() {
            let ty = &c.data_type;
            let (charset, collation) = column_charset(t, c);
            rows.push(vec![
                text("def"),
                text(&t.database),
                text(&t.name),
                text(&c.name),
                int(i + 1),
                column_default_text(c),
                text(if c.nullable { "YES" } else { "NO" }),
                text(ty.kind.name()),
                opt_u64(ty.max_length()),
                opt_u64(ty.octet_length()),
                opt_u64(ty.numeric_precision()),
                opt_u64(ty.numeric_scale()),
                opt_u64(ty.datetime_precision()),
                charset,
                collation,
                text(&ty.column_type()),
                text(t.column_key(&c.name)),
                text(&column_extra(c)),
                text("select,insert,update,references"),
                text(&c.comment),
                text(""),
                Value::Null,
            ]);
        }
    }
    rowset(
        &[
            "TABLE_CATALOG",
            "TABLE_SCHEMA",
            "TABLE_NAME",
            "COLUMN_NAME",
            "ORDINAL_POSITION",
            "COLUMN_DEFAULT",
            "IS_NULLABLE",
            "DATA_TYPE",
            "CHARACTER_MAXIMUM_LENGTH",
            "CHARACTER_OCTET_LENGTH",
            "NUMERIC_PRECISION",
            "NUMERIC_SCALE",
            "DATETIME_PRECISION",
            "CHARACTER_SET_NAME",
            "COLLATION_NAME",
            "COLUMN_TYPE",
            "COLUMN_KEY",
            "EXTRA",
            "PRIVILEGES",
            "COLUMN_COMMENT",
            "GENERATION_EXPRESSION",
            "SRS_ID",
        ],
        rows,
    )
}

/// Index kind as `INDEX_TYPE` reports it.
pub fn index_type(kind: IndexKind) -> &'static str {
    match kind {
        IndexKind::Fulltext => "FULLTEXT",
        IndexKind::Spatial => "SPATIAL",
        _ => "BTREE",
    }
}

fn statistics(tables: &[&TableSchema]) -> RowSet {
    let mut rows = Vec::new();
    for t in tables {
        for index in &t.indexes {
            for (seq, part) in index.parts.iter().enumerate() {
                let nullable = t.column(&part.column).map_or(false, |c| c.nullable);
                let collation = match index.kind {
                    IndexKind::Fulltext | IndexKind::Spatial => Value::Null,
                    _ => text(if part.desc { "D" } else { "A" }),
                };
                rows.push(vec![
                    text("def"),
                    text(&t.database),
                    text(&t.name),
                    int(!index.kind.is_unique() as usize),
                    text(&t.database),
                    text(&index.name),
                    int(seq + 1),
                    text(&part.column),
                    collation,
                    Value::Integer(0),
                    part.prefix.map_or(Value::Null, |p| Value::Integer(p as i64)),
                    Value::Null,
                    text(if nullable { "YES" } else { "" }),
                    text(index_type(index.kind)),
                    text(""),
                    text(&index.comment),
                    yes_no(index.visible),
                    Value::Null,
                ]);
            }
        }
    }
    rowset(
        &[
            "TABLE_CATALOG",
            "TABLE_SCHEMA",
            "TABLE_NAME",
            "NON_UNIQUE",
            "INDEX_SCHEMA",
            "INDEX_NAME",
            "SEQ_IN_INDEX",
            "COLUMN_NAME",
            "COLLATION",
            "CARDINALITY",
            "SUB_PART",
            "PACKED",
            "NULLABLE",
            "INDEX_TYPE",
            "COMMENT",
            "INDEX_COMMENT",
            "IS_VISIBLE",
            "EXPRESSION",
        ],
        rows,
    )
}

fn table_constraints(tables: &[&TableSchema]) -> RowSet {
    let mut rows = Vec::new();
    for t in tables {
        let mut push = |name: &str, kind: &str, enforced: bool| {
            rows.push(vec![
                text("def"),
                text(&t.database),
                text(name),
                text(&t.database),
                text(&t.name),
                text(kind),
                yes_no(enforced),
            ]);
        };
        for index in t.indexes.iter().filter(|i| i.kind.is_unique()) {
            let kind = if index.kind == IndexKind::Primary { "PRIMARY KEY" } else { "UNIQUE" };
            push(&index.name, kind, true);
        }
        for fk in &t.foreign_keys {
            push(&fk.name, "FOREIGN KEY", true);
        }
        for check in &t.checks {
            push(&check.name, "CHECK", check.enforced);
        }
    }
    rowset(
        &[
            "CONSTRAINT_CATALOG",
            "CONSTRAINT_SCHEMA",
            "CONSTRAINT_NAME",
            "TABLE_SCHEMA",
            "TABLE_NAME",
            "CONSTRAINT_TYPE",
            "ENFORCED",
        ],
        rows,
    )
}

fn key_column_usage(tables: &[&TableSchema]) -> RowSet {
    let mut rows = Vec::new();
    for t in tables {
        for index in t.indexes.iter().filter(|i| i.kind.is_unique()) {
            for (i, part) in index.parts.iter().enumerate() {
                rows.push(vec![
                    text("def"),
                    text(&t.database),
                    text(&index.name),
                    text("def"),
                    text(&t.database),
                    text(&t.name),
                    text(&part.column),
                    int(i + 1),
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Null,
                ]);
            }
        }
        for fk in &t.foreign_keys {
            for (i, (column, referenced)) in fk.columns.iter().zip(&fk.ref_columns).enumerate() {
                rows.push(vec![
                    text("def"),
                    text(&t.database),
                    text(&fk.name),
                    text("def"),
                    text(&t.database),
                    text(&t.name),
                    text(column),
                    int(i + 1),
                    int(i + 1),
                    text(&fk.ref_database),
                    text(&fk.ref_table),
                    text(referenced),
                ]);
            }
        }
    }
    rowset(
        &[
            "CONSTRAINT_CATALOG",
            "CONSTRAINT_SCHEMA",
            "CONSTRAINT_NAME",
            "TABLE_CATALOG",
            "TABLE_SCHEMA",
            "TABLE_NAME",
            "COLUMN_NAME",
            "ORDINAL_POSITION",
            "POSITION_IN_UNIQUE_CONSTRAINT",
            "REFERENCED_TABLE_SCHEMA",
            "REFERENCED_TABLE_NAME",
            "REFERENCED_COLUMN_NAME",
        ],
        rows,
    )
}

fn referential_constraints(catalog: &Catalog, tables: &[&TableSchema]) -> RowSet {
    let mut rows = Vec::new();
    for t in tables {
        for fk in &t.foreign_keys {
            let unique_name = catalog
                .lookup_table(&fk.ref_database, &fk.ref_table, false)
                .and_then(|parent| {
                    parent.indexes.iter().find(|i| {
                        i.kind.is_unique()
                            && i.parts.len() == fk.ref_columns.len()
                            && i.starts_with(&fk.ref_columns)
                    })
                })
                .map_or(Value::Null, |i| text(&i.name));
            rows.push(vec![
                text("def"),
                text(&t.database),
                text(&fk.name),
                text("def"),
                text(&fk.ref_database),
                unique_name,
                text("NONE"),
                text(fk.on_update.sql()),
                text(fk.on_delete.sql()),
                text(&t.name),
                text(&fk.ref_table),
            ]);
        }
    }
    rowset(
        &[
            "CONSTRAINT_CATALOG",
            "CONSTRAINT_SCHEMA",
            "CONSTRAINT_NAME",
            "UNIQUE_CONSTRAINT_CATALOG",
            "UNIQUE_CONSTRAINT_SCHEMA",
            "UNIQUE_CONSTRAINT_NAME",
            "MATCH_OPTION",
            "UPDATE_RULE",
            "DELETE_RULE",
            "TABLE_NAME",
            "REFERENCED_TABLE_NAME",
        ],
        rows,
    )
}

fn check_constraints(tables: &[&TableSchema]) -> RowSet {
    let rows = tables
        .iter()
        .flat_map(|t| {
            t.checks.iter().map(move |c| {
                vec![text("def"), text(&t.database), text(&c.name), text(&c.expr)]
            })
        })
        .collect();
    rowset(
        &["CONSTRAINT_CATALOG", "CONSTRAINT_SCHEMA", "CONSTRAINT_NAME", "CHECK_CLAUSE"],
        rows,
    )
}

fn collations() -> RowSet {
    let rows = COLLATIONS
        .iter()
        .map(|(name, charset, id, pad)| {
            let is_default = CHARSETS.iter().any(|(cs, _, default, _)| cs == charset && default == name);
            vec![
                text(name),
                text(charset),
                Value::Integer(*id as i64),
                text(if is_default { "Yes" } else { "" }),
                text("Yes"),
                Value::Integer(if pad.starts_with("NO") { 0 } else { 1 }),
                text(pad),
            ]
        })
        .collect();
    rowset(
        &[
            "COLLATION_NAME",
            "CHARACTER_SET_NAME",
            "ID",
            "IS_DEFAULT",
            "IS_COMPILED",
            "SORTLEN",
            "PAD_ATTRIBUTE",
        ],
        rows,
    )
}

fn character_sets() -> RowSet {
    let rows = CHARSETS
        .iter()
        .map(|(name, description, default, maxlen)| {
            vec![text(name), text(default), text(description), Value::Integer(*maxlen as i64)]
        })
        .collect();
    rowset(
        &["CHARACTER_SET_NAME", "DEFAULT_COLLATE_NAME", "DESCRIPTION", "MAXLEN"],
        rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Mutation;
    use crate::types::DataType;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new("app", "utf8mb4", "utf8mb4_0900_ai_ci");
        let mut parent = TableSchema::new("app", "parent");
        let mut id = ColumnSchema::new("id", DataType::int());
        id.nullable = false;
        parent.columns.push(id);
        parent.indexes.push(IndexSchema {
            name: "PRIMARY".into(),
            kind: IndexKind::Primary,
            parts: vec![IndexPart::column("id")],
            visible: true,
            comment: String::new(),
        });
        catalog.apply(&Mutation::CreateTable(parent)).unwrap();

        let mut child = TableSchema::new("app", "child");
        let mut name = ColumnSchema::new("name", DataType::varchar(20));
        name.default = ColumnDefault::Literal(Value::text("x"));
        child.columns.push(ColumnSchema::new("pid", DataType::int()));
        child.columns.push(name);
        child.indexes.push(IndexSchema {
            name: "fk1".into(),
            kind: IndexKind::Regular,
            parts: vec![IndexPart::column("pid")],
            visible: true,
            comment: String::new(),
        });
        child.foreign_keys.push(ForeignKeySchema {
            name: "fk1".into(),
            columns: vec!["pid".into()],
            ref_database: "app".into(),
            ref_table: "parent".into(),
            ref_columns: vec!["id".into()],
            on_delete: ReferentialAction::Cascade,
            on_update: ReferentialAction::NoAction,
        });
        child.checks.push(CheckSchema {
            name: "child_chk_1".into(),
            expr: "(`pid` > 0)".into(),
            enforced: true,
        });
        catalog.apply(&Mutation::CreateTable(child)).unwrap();

        let mut temp = TableSchema::new("app", "scratch");
        temp.temporary = true;
        temp.columns.push(ColumnSchema::new("x", DataType::int()));
        catalog.apply(&Mutation::CreateTable(temp)).unwrap();
        catalog
    }

    fn column<'a>(rows: &'a RowSet, name: &str) -> Vec<&'a Value> {
        let i = rows.columns.iter().position(|c| c == name).unwrap();
        rows.rows.iter().map(|r| &r[i]).collect()
    }

    #[test]
    fn test_columns_view() {
        let catalog = catalog();
        let rows = query_information_schema(&catalog, "columns", &Filter::table("app", "child"), &NoStats).unwrap();
        assert_eq!(column(&rows, "COLUMN_NAME"), vec![&text("pid"), &text("name")]);
        assert_eq!(column(&rows, "COLUMN_KEY"), vec![&text("MUL"), &text("")]);
        assert_eq!(column(&rows, "COLUMN_DEFAULT"), vec![&Value::Null, &text("x")]);
        assert_eq!(column(&rows, "COLUMN_TYPE"), vec![&text("int"), &text("varchar(20)")]);
        assert_eq!(column(&rows, "CHARACTER_SET_NAME")[1], &text("utf8mb4"));
    }

    #[test]
    fn test_temporary_tables_hidden() {
        let catalog = catalog();
        let rows = query_information_schema(&catalog, "TABLES", &Filter::schema("app"), &NoStats).unwrap();
        assert_eq!(column(&rows, "TABLE_NAME"), vec![&text("child"), &text("parent")]);
    }

    #[test]
    fn test_constraint_views() {
        let catalog = catalog();
        let filter = Filter::schema("app");
        let rows = query_information_schema(&catalog, "TABLE_CONSTRAINTS", &filter, &NoStats).unwrap();
        assert_eq!(
            column(&rows, "CONSTRAINT_TYPE"),
            vec![&text("FOREIGN KEY"), &text("CHECK"), &text("PRIMARY KEY")]
        );

        let rows = query_information_schema(&catalog, "REFERENTIAL_CONSTRAINTS", &filter, &NoStats).unwrap();
        assert_eq!(column(&rows, "UNIQUE_CONSTRAINT_NAME"), vec![&text("PRIMARY")]);
        assert_eq!(column(&rows, "DELETE_RULE"), vec![&text("CASCADE")]);
        assert_eq!(column(&rows, "UPDATE_RULE"), vec![&text("NO ACTION")]);

        let rows = query_information_schema(&catalog, "KEY_COLUMN_USAGE", &filter, &NoStats).unwrap();
        assert_eq!(column(&rows, "REFERENCED_COLUMN_NAME"), vec![&text("id"), &Value::Null]);

        let rows = query_information_schema(&catalog, "check_constraints", &filter, &NoStats).unwrap();
        assert_eq!(column(&rows, "CHECK_CLAUSE"), vec![&text("(`pid` > 0)")]);
    }

    #[test]
    fn test_schemata_and_unknown_view() {
        let catalog = catalog();
        let rows = query_information_schema(&catalog, "SCHEMATA", &Filter::default(), &NoStats).unwrap();
        assert_eq!(column(&rows, "SCHEMA_NAME"), vec![&text("information_schema"), &text("app")]);
        let err = query_information_schema(&catalog, "ENGINES", &Filter::default(), &NoStats).unwrap_err();
        assert_eq!(err.code(), 1146);
    }

    #[test]
    fn test_view_columns() {
        let columns = view_columns("tables").unwrap();
        assert_eq!(&columns[1..3], &["TABLE_SCHEMA".to_string(), "TABLE_NAME".to_string()]);
        assert!(view_columns("COLLATIONS").unwrap().contains(&"COLLATION_NAME".to_string()));
        assert!(view_columns("PROCESSLIST").is_none());
    }
}
