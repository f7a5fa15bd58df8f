//! SHOW and DESCRIBE
//!
//! Every SHOW statement reads a virtual table: an `information_schema` view,
//! rows computed here from catalog or session state, or the live
//! `SHOW CREATE TABLE` text. The native query only renames, filters and
//! orders, so `LIKE` and `WHERE` filters behave exactly like a SELECT.

use super::scope::{Clause, Scope, ScopeColumn, ScopeTable};
use super::{Compiler, Emit, Plan, Role, VirtualSource};
use crate::catalog::information_schema::{column_charset, column_default_text, column_extra, index_type, Filter};
use crate::catalog::{quote_native, show_create_database, DatabaseSchema, IndexKind, TableSchema, INFORMATION_SCHEMA};
use crate::engine::RowSet;
use crate::error::{CatalogError, DriverError, Result};
use crate::formatter::{ColumnMeta, KeyFlags};
use crate::sql::ast::{ColumnRef, Expr, Literal, ObjectName, ShowFilter, ShowStmt};
use crate::types::{DataType, Value};

const SHOW_ALIAS: &str = "_mysqlite_show";

/// One output column of a SHOW statement.
struct ShowColumn {
    label: String,
    /// Column of the virtual source
    source: String,
    numeric: bool,
}

fn col(label: &str, source: &str) -> ShowColumn {
    ShowColumn {
        label: label.to_string(),
        source: source.to_string(),
        numeric: false,
    }
}

fn num(label: &str, source: &str) -> ShowColumn {
    ShowColumn {
        numeric: true,
        ..col(label, source)
    }
}

/// Columns whose source carries the label as its name.
fn own(labels: &[&str]) -> Vec<ShowColumn> {
    labels.iter().map(|l| col(l, l)).collect()
}

fn text(s: &str) -> Value {
    Value::text(s)
}

fn rowset(columns: &[ShowColumn], rows: Vec<Vec<Value>>) -> RowSet {
    RowSet {
        columns: columns.iter().map(|c| c.source.clone()).collect(),
        rows,
    }
}

/// What a SHOW statement selects from.
struct ShowQuery<'f> {
    source: VirtualSource,
    columns: Vec<ShowColumn>,
    filter: Option<&'f ShowFilter>,
    /// Column `LIKE` patterns match against
    like: usize,
    order_by: Option<usize>,
}

impl Compiler<'_> {
    pub(super) fn compile_show(&self, show: &ShowStmt) -> Result<Plan> {
        match show {
            ShowStmt::Databases { filter } => self.show(ShowQuery {
                source: VirtualSource::InformationSchema {
                    view: "SCHEMATA".into(),
                    filter: Filter::default(),
                },
                columns: vec![col("Database", "SCHEMA_NAME")],
                filter: filter.as_ref(),
                like: 0,
                order_by: Some(0),
            }),
            ShowStmt::Tables { database, full, filter } => {
                let database = self.shown_database(database.as_deref())?;
                let mut columns = vec![col(&format!("Tables_in_{}", database), "TABLE_NAME")];
                if *full {
                    columns.push(col("Table_type", "TABLE_TYPE"));
                }
                self.show(ShowQuery {
                    source: VirtualSource::InformationSchema {
                        view: "TABLES".into(),
                        filter: Filter::schema(database),
                    },
                    columns,
                    filter: filter.as_ref(),
                    like: 0,
                    order_by: Some(0),
                })
            }
            ShowStmt::TableStatus { database, filter } => {
                let database = self.shown_database(database.as_deref())?;
                self.show(ShowQuery {
                    source: VirtualSource::InformationSchema {
                        view: "TABLES".into(),
                        filter: Filter::schema(database),
                    },
                    columns: table_status_columns(),
                    filter: filter.as_ref(),
                    like: 0,
                    order_by: Some(0),
                })
            }
            ShowStmt::Columns { table, full, filter } => self.show_columns(table, *full, filter.as_ref()),
            ShowStmt::Index { table, filter } => self.show_index(table, filter.as_ref()),
            ShowStmt::CreateTable(name) => self.show_create_table(name),
            ShowStmt::CreateDatabase { name, if_not_exists } => self.show_create_database(name, *if_not_exists),
            ShowStmt::Variables { filter, .. } => {
                let columns = own(&["Variable_name", "Value"]);
                let rows = self
                    .session
                    .variables()
                    .into_iter()
                    .map(|(name, value)| vec![Value::Text(name), Value::Text(value)])
                    .collect();
                self.show(ShowQuery {
                    source: VirtualSource::Rows(rowset(&columns, rows)),
                    columns,
                    filter: filter.as_ref(),
                    like: 0,
                    order_by: None,
                })
            }
            ShowStmt::Collation { filter } => self.show(ShowQuery {
                source: VirtualSource::InformationSchema {
                    view: "COLLATIONS".into(),
                    filter: Filter::default(),
                },
                columns: vec![
                    col("Collation", "COLLATION_NAME"),
                    col("Charset", "CHARACTER_SET_NAME"),
                    num("Id", "ID"),
                    col("Default", "IS_DEFAULT"),
                    col("Compiled", "IS_COMPILED"),
                    num("Sortlen", "SORTLEN"),
                    col("Pad_attribute", "PAD_ATTRIBUTE"),
                ],
                filter: filter.as_ref(),
                like: 0,
                order_by: Some(0),
            }),
            ShowStmt::CharacterSet { filter } => self.show(ShowQuery {
                source: VirtualSource::InformationSchema {
                    view: "CHARACTER_SETS".into(),
                    filter: Filter::default(),
                },
                columns: vec![
                    col("Charset", "CHARACTER_SET_NAME"),
                    col("Description", "DESCRIPTION"),
                    col("Default collation", "DEFAULT_COLLATE_NAME"),
                    num("Maxlen", "MAXLEN"),
                ],
                filter: filter.as_ref(),
                like: 0,
                order_by: Some(0),
            }),
            ShowStmt::Warnings => {
                let columns = vec![col("Level", "Level"), num("Code", "Code"), col("Message", "Message")];
                let rows = self
                    .session
                    .warnings
                    .iter()
                    .map(|w| vec![text(w.level), Value::Integer(w.code as i64), text(&w.message)])
                    .collect();
                self.show(ShowQuery {
                    source: VirtualSource::Rows(rowset(&columns, rows)),
                    columns,
                    filter: None,
                    like: 0,
                    order_by: None,
                })
            }
        }
    }

    /// `DESCRIBE t [column]`: SHOW COLUMNS with the column as a LIKE pattern.
    pub(super) fn compile_describe(&self, table: &ObjectName, column: Option<&str>) -> Result<Plan> {
        let filter = column.map(|c| ShowFilter::Like(c.to_string()));
        self.show_columns(table, false, filter.as_ref())
    }

    /// Database a SHOW TABLES / TABLE STATUS lists.
    fn shown_database(&self, named: Option<&str>) -> Result<String> {
        let database = match named {
            Some(db) => db.to_string(),
            None => self.current_database()?.to_string(),
        };
        if database.eq_ignore_ascii_case(INFORMATION_SCHEMA) {
            return Ok(INFORMATION_SCHEMA.to_string());
        }
        self.catalog
            .database(&database)
            .map(|db| db.name.clone())
            .ok_or_else(|| CatalogError::UnknownDatabase(database).into())
    }

    /// Table a SHOW statement describes; temporary tables included.
    fn shown_table(&self, name: &ObjectName) -> Result<&TableSchema> {
        if self.is_information_schema(name) {
            return Err(DriverError::NotSupported(format!(
                "describing information_schema.{}",
                name.name
            )));
        }
        self.table(name)
    }

    fn show_columns(&self, name: &ObjectName, full: bool, filter: Option<&ShowFilter>) -> Result<Plan> {
        let table = self.shown_table(name)?;
        let columns = if full {
            own(&["Field", "Type", "Collation", "Null", "Key", "Default", "Extra", "Privileges", "Comment"])
        } else {
            own(&["Field", "Type", "Null", "Key", "Default", "Extra"])
        };
        let rows = table
            .columns
            .iter()
            .map(|c| {
                let mut row = vec![text(&c.name), text(&c.data_type.column_type())];
                if full {
                    row.push(column_charset(table, c).1);
                }
                row.extend([
                    text(if c.nullable { "YES" } else { "NO" }),
                    text(table.column_key(&c.name)),
                    column_default_text(c),
                    text(&column_extra(c)),
                ]);
                if full {
                    row.extend([text("select,insert,update,references"), text(&c.comment)]);
                }
                row
            })
            .collect();
        self.show(ShowQuery {
            source: VirtualSource::Rows(rowset(&columns, rows)),
            columns,
            filter,
            like: 0,
            order_by: None,
        })
    }

    fn show_index(&self, name: &ObjectName, filter: Option<&ShowFilter>) -> Result<Plan> {
        let table = self.shown_table(name)?;
        let columns = vec![
            col("Table", "Table"),
            num("Non_unique", "Non_unique"),
            col("Key_name", "Key_name"),
            num("Seq_in_index", "Seq_in_index"),
            col("Column_name", "Column_name"),
            col("Collation", "Collation"),
            num("Cardinality", "Cardinality"),
            num("Sub_part", "Sub_part"),
            col("Packed", "Packed"),
            col("Null", "Null"),
            col("Index_type", "Index_type"),
            col("Comment", "Comment"),
            col("Index_comment", "Index_comment"),
            col("Visible", "Visible"),
            col("Expression", "Expression"),
        ];
        let mut rows = Vec::new();
        for index in &table.indexes {
            let ordered = !matches!(index.kind, IndexKind::Fulltext | IndexKind::Spatial);
            for (seq, part) in index.parts.iter().enumerate() {
                let nullable = table.column(&part.column).map_or(false, |c| c.nullable);
                rows.push(vec![
                    text(&table.name),
                    Value::Integer(!index.kind.is_unique() as i64),
                    text(&index.name),
                    Value::Integer(seq as i64 + 1),
                    text(&part.column),
                    match (ordered, part.desc) {
                        (false, _) => Value::Null,
                        (true, true) => text("D"),
                        (true, false) => text("A"),
                    },
                    Value::Integer(0),
                    part.prefix.map_or(Value::Null, |p| Value::Integer(p as i64)),
                    Value::Null,
                    text(if nullable { "YES" } else { "" }),
                    text(index_type(index.kind)),
                    text(""),
                    text(&index.comment),
                    text(if index.visible { "YES" } else { "NO" }),
                    Value::Null,
                ]);
            }
        }
        self.show(ShowQuery {
            source: VirtualSource::Rows(rowset(&columns, rows)),
            columns,
            filter,
            like: 2,
            order_by: None,
        })
    }

    fn show_create_table(&self, name: &ObjectName) -> Result<Plan> {
        let table = self.shown_table(name)?;
        self.show(ShowQuery {
            source: VirtualSource::ShowCreateTable {
                database: table.database.clone(),
                table: table.name.clone(),
            },
            columns: own(&["Table", "Create Table"]),
            filter: None,
            like: 0,
            order_by: None,
        })
    }

    fn show_create_database(&self, name: &str, if_not_exists: bool) -> Result<Plan> {
        let db = if name.eq_ignore_ascii_case(INFORMATION_SCHEMA) {
            DatabaseSchema {
                name: INFORMATION_SCHEMA.to_string(),
                charset: "utf8mb3".to_string(),
                collation: "utf8mb3_general_ci".to_string(),
            }
        } else {
            self.catalog
                .database(name)
                .cloned()
                .ok_or_else(|| CatalogError::UnknownDatabase(name.to_string()))?
        };
        let mut sql = show_create_database(&db);
        if if_not_exists {
            sql = sql.replacen("CREATE DATABASE ", "CREATE DATABASE /*!32312 IF NOT EXISTS*/ ", 1);
        }
        let columns = own(&["Database", "Create Database"]);
        let rows = vec![vec![Value::Text(db.name), Value::Text(sql)]];
        self.show(ShowQuery {
            source: VirtualSource::Rows(rowset(&columns, rows)),
            columns,
            filter: None,
            like: 0,
            order_by: None,
        })
    }

    fn show(&self, query: ShowQuery<'_>) -> Result<Plan> {
        let native = self.add_virtual(query.source);
        let mut scope = Scope::new(None);
        self.push_table(
            &mut scope,
            ScopeTable {
                alias: SHOW_ALIAS.to_string(),
                database: String::new(),
                org_table: String::new(),
                columns: query
                    .columns
                    .iter()
                    .map(|c| ScopeColumn {
                        name: c.label.clone(),
                        native: c.source.clone(),
                        data_type: None,
                        schema: None,
                        binary: false,
                        merged: false,
                        keys: KeyFlags::default(),
                    })
                    .collect(),
            },
        )?;

        let alias = quote_native(SHOW_ALIAS);
        let reference = |c: &ShowColumn| format!("{}.{}", alias, quote_native(&c.source));
        let mut sql = format!(
            "SELECT {} FROM {}.{} AS {}",
            query.columns.iter().map(&reference).collect::<Vec<_>>().join(", "),
            quote_native("temp"),
            quote_native(&native),
            alias
        );

        let mut out = Emit::default();
        if let Some(filter) = query.filter {
            scope.set_clause(Clause::Where);
            let condition = match filter {
                ShowFilter::Like(pattern) => Expr::Like {
                    expr: Box::new(Expr::Column(ColumnRef {
                        database: None,
                        table: None,
                        column: query.columns[query.like].label.clone(),
                    })),
                    pattern: Box::new(Expr::Literal(Literal::String(pattern.clone()))),
                    escape: None,
                    negated: false,
                },
                ShowFilter::Where(e) => e.clone(),
            };
            sql.push_str(" WHERE ");
            sql.push_str(&self.expr(&condition, &scope, &mut out)?);
        }
        if let Some(i) = query.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(&reference(&query.columns[i]));
        }

        let meta = query
            .columns
            .iter()
            .map(|c| {
                if c.numeric {
                    ColumnMeta::expression(c.label.clone(), Some(DataType::int()))
                } else {
                    ColumnMeta::text(c.label.clone())
                }
            })
            .collect();
        Ok(Plan::Direct(out.finish(sql, Role::Rows(meta))))
    }
}

fn table_status_columns() -> Vec<ShowColumn> {
    vec![
        col("Name", "TABLE_NAME"),
        col("Engine", "ENGINE"),
        num("Version", "VERSION"),
        col("Row_format", "ROW_FORMAT"),
        num("Rows", "TABLE_ROWS"),
        num("Avg_row_length", "AVG_ROW_LENGTH"),
        num("Data_length", "DATA_LENGTH"),
        num("Max_data_length", "MAX_DATA_LENGTH"),
        num("Index_length", "INDEX_LENGTH"),
        num("Data_free", "DATA_FREE"),
        num("Auto_increment", "AUTO_INCREMENT"),
        col("Create_time", "CREATE_TIME"),
        col("Update_time", "UPDATE_TIME"),
        col("Check_time", "CHECK_TIME"),
        col("Collation", "TABLE_COLLATION"),
        col("Checksum", "CHECKSUM"),
        col("Create_options", "CREATE_OPTIONS"),
        col("Comment", "TABLE_COMMENT"),
    ]
}

#[cfg(test)]
mod tests {
    use super::super::testing::{catalog, plan, session};
    use super::super::{CatalogRead, NativeStatement};
    use super::*;
    use crate::catalog::Catalog;
    use crate::session::Warning;

    fn show_read(catalog: &Catalog, session: &crate::session::Session, sql: &str) -> (CatalogRead, NativeStatement) {
        let Plan::CatalogRead(read) = plan(catalog, session, sql).unwrap() else {
            panic!("expected a catalog read for {}", sql);
        };
        let Plan::Direct(stmt) = (*read.plan).clone() else {
            panic!("expected a single statement");
        };
        (read, stmt)
    }

    fn labels(stmt: &NativeStatement) -> Vec<String> {
        match &stmt.role {
            Role::Rows(columns) => columns.iter().map(|c| c.label.clone()).collect(),
            other => panic!("expected rows, got {:?}", other),
        }
    }

    fn rows(read: &CatalogRead) -> &RowSet {
        match &read.sources[0].source {
            VirtualSource::Rows(rows) => rows,
            other => panic!("expected computed rows, got {:?}", other),
        }
    }

    fn fixture() -> Catalog {
        catalog(&[
            "CREATE TABLE t (id INT NOT NULL AUTO_INCREMENT PRIMARY KEY, name VARCHAR(20) DEFAULT 'x', \
             code CHAR(4), UNIQUE KEY uq_code (code), KEY idx_name (name(5) DESC))",
        ])
    }

    #[test]
    fn test_show_tables_reads_information_schema() {
        let (read, stmt) = show_read(&fixture(), &session(), "SHOW TABLES");
        assert_eq!(
            read.sources[0].source,
            VirtualSource::InformationSchema {
                view: "TABLES".into(),
                filter: Filter::schema("app"),
            }
        );
        assert_eq!(
            stmt.sql,
            "SELECT \"_mysqlite_show\".\"TABLE_NAME\" FROM \"temp\".\"_mysqlite_tmp_v1\" AS \"_mysqlite_show\" \
             ORDER BY \"_mysqlite_show\".\"TABLE_NAME\""
        );
        assert_eq!(labels(&stmt), vec!["Tables_in_app"]);

        let (_, stmt) = show_read(&fixture(), &session(), "SHOW FULL TABLES WHERE Table_type = 'BASE TABLE'");
        assert_eq!(labels(&stmt), vec!["Tables_in_app", "Table_type"]);
        assert!(stmt.sql.contains(" WHERE "));
        assert!(stmt.sql.contains("\"_mysqlite_show\".\"TABLE_TYPE\""));
    }

    #[test]
    fn test_show_unknown_database() {
        let err = plan(&fixture(), &session(), "SHOW TABLES FROM nope").unwrap_err();
        assert_eq!(err.code(), 1049);
        let err = plan(&fixture(), &session(), "SHOW COLUMNS FROM nope").unwrap_err();
        assert_eq!(err.code(), 1146);
    }

    #[test]
    fn test_show_columns_rows() {
        let (read, stmt) = show_read(&fixture(), &session(), "SHOW COLUMNS FROM t");
        assert_eq!(labels(&stmt), vec!["Field", "Type", "Null", "Key", "Default", "Extra"]);
        let rows = rows(&read);
        assert_eq!(
            rows.rows[0],
            vec![text("id"), text("int"), text("NO"), text("PRI"), Value::Null, text("auto_increment")]
        );
        assert_eq!(
            rows.rows[1],
            vec![text("name"), text("varchar(20)"), text("YES"), text("MUL"), text("x"), text("")]
        );
        assert_eq!(rows.rows[2][3], text("UNI"));
    }

    #[test]
    fn test_describe_column_pattern() {
        let (_, stmt) = show_read(&fixture(), &session(), "DESCRIBE t name");
        assert!(stmt
            .sql
            .contains("WHERE (\"_mysqlite_show\".\"Field\" LIKE ?1 ESCAPE '\\')"));
        assert_eq!(stmt.params, vec![text("name")]);
    }

    #[test]
    fn test_show_index_rows() {
        let (read, stmt) = show_read(&fixture(), &session(), "SHOW INDEX FROM t");
        assert_eq!(labels(&stmt).len(), 15);
        let rows = rows(&read);
        let keys: Vec<&Value> = rows.rows.iter().map(|r| &r[2]).collect();
        assert_eq!(keys, vec![&text("PRIMARY"), &text("uq_code"), &text("idx_name")]);
        assert_eq!(rows.rows[1][1], Value::Integer(0));
        assert_eq!(rows.rows[2][1], Value::Integer(1));
        assert_eq!(rows.rows[2][5], text("D"));
        assert_eq!(rows.rows[2][7], Value::Integer(5));
    }

    #[test]
    fn test_show_create() {
        let (read, stmt) = show_read(&fixture(), &session(), "SHOW CREATE TABLE t");
        assert_eq!(
            read.sources[0].source,
            VirtualSource::ShowCreateTable {
                database: "app".into(),
                table: "t".into(),
            }
        );
        assert_eq!(labels(&stmt), vec!["Table", "Create Table"]);

        let (read, _) = show_read(&fixture(), &session(), "SHOW CREATE DATABASE IF NOT EXISTS app");
        assert_eq!(
            rows(&read).rows[0][1],
            text(
                "CREATE DATABASE /*!32312 IF NOT EXISTS*/ `app` /*!40100 DEFAULT CHARACTER SET utf8mb4 \
                 COLLATE utf8mb4_0900_ai_ci */ /*!80016 DEFAULT ENCRYPTION='N' */"
            )
        );
    }

    #[test]
    fn test_show_variables_like() {
        let (read, stmt) = show_read(&fixture(), &session(), "SHOW VARIABLES LIKE 'sql_mode'");
        assert_eq!(labels(&stmt), vec!["Variable_name", "Value"]);
        assert_eq!(stmt.params, vec![text("sql_mode")]);
        assert!(rows(&read).rows.iter().any(|r| r[0] == text("autocommit") && r[1] == text("ON")));
    }

    #[test]
    fn test_show_warnings_lists_session_diagnostics() {
        let mut session = session();
        session.warnings.push(Warning {
            level: "Note",
            code: 1050,
            message: "Table 't' already exists".into(),
        });
        let (read, stmt) = show_read(&fixture(), &session, "SHOW WARNINGS");
        assert_eq!(labels(&stmt), vec!["Level", "Code", "Message"]);
        assert_eq!(rows(&read).rows[0][1], Value::Integer(1050));
    }
}
