//! `SHOW CREATE TABLE` / `SHOW CREATE DATABASE` text, rendered from catalog state

use super::schema::*;
use crate::cast::cast_for_read;
use crate::sql::display::{hex_literal, quote_identifier as q, quote_string};
use crate::types::{TypeFamily, TypeKind, Value};

fn column_list(columns: &[String]) -> String {
    columns.iter().map(|c| q(c)).collect::<Vec<_>>().join(",")
}

fn current_timestamp(fsp: u32) -> String {
    if fsp == 0 {
        "CURRENT_TIMESTAMP".to_string()
    } else {
        format!("CURRENT_TIMESTAMP({})", fsp)
    }
}

/// Whether a nullable column without a DEFAULT clause shows `DEFAULT NULL`.
fn shows_default_null(column: &ColumnSchema) -> bool {
    !column.data_type.is_lob()
        && !matches!(column.data_type.family(), TypeFamily::Json | TypeFamily::Geometry)
}

fn literal_default(value: &Value, column: &ColumnSchema) -> String {
    match column.data_type.family() {
        TypeFamily::Bit => {
            let n = value.as_f64().unwrap_or(0.0) as u64;
            format!("b'{:b}'", n)
        }
        TypeFamily::Binary => match value {
            Value::Bytes(b) => hex_literal(b),
            other => quote_string(&other.to_text().unwrap_or_default()),
        },
        _ => {
            let shown = cast_for_read(value, &column.data_type);
            quote_string(&shown.to_text().unwrap_or_default())
        }
    }
}

fn column_line(table: &TableSchema, column: &ColumnSchema) -> String {
    let ty = &column.data_type;
    let mut line = format!("  {} {}", q(&column.name), ty.column_type());

    if ty.is_textual() {
        match (&ty.charset, &ty.collation) {
            (Some(cs), collation) if !cs.eq_ignore_ascii_case(&table.charset) => {
                line.push_str(&format!(" CHARACTER SET {}", cs));
                if let Some(c) = collation {
                    line.push_str(&format!(" COLLATE {}", c));
                }
            }
            (_, Some(c)) if !c.eq_ignore_ascii_case(&table.collation) => {
                line.push_str(&format!(" COLLATE {}", c));
            }
            _ => {}
        }
    }

    if !column.nullable {
        line.push_str(" NOT NULL");
    } else if ty.kind == TypeKind::Timestamp {
        line.push_str(" NULL");
    }
    if column.auto_increment {
        line.push_str(" AUTO_INCREMENT");
    }

    match &column.default {
        ColumnDefault::None => {
            if column.nullable && !column.auto_increment && shows_default_null(column) {
                line.push_str(" DEFAULT NULL");
            }
        }
        ColumnDefault::Null => line.push_str(" DEFAULT NULL"),
        ColumnDefault::Literal(v) => {
            line.push_str(" DEFAULT ");
            line.push_str(&literal_default(v, column));
        }
        ColumnDefault::CurrentTimestamp { fsp } => {
            line.push_str(" DEFAULT ");
            line.push_str(&current_timestamp(*fsp));
        }
        ColumnDefault::Expression(expr) => line.push_str(&format!(" DEFAULT ({})", expr)),
    }

    if column.on_update_current_timestamp {
        line.push_str(" ON UPDATE ");
        line.push_str(&current_timestamp(ty.fsp()));
    }
    if !column.comment.is_empty() {
        line.push_str(&format!(" COMMENT {}", quote_string(&column.comment)));
    }
    line
}

fn index_line(index: &IndexSchema) -> String {
    let parts: Vec<String> = index
        .parts
        .iter()
        .map(|p| {
            let mut part = q(&p.column);
            if let Some(len) = p.prefix {
                part.push_str(&format!("({})", len));
            }
            if p.desc {
                part.push_str(" DESC");
            }
            part
        })
        .collect();
    let parts = parts.join(",");
    let mut line = match index.kind {
        IndexKind::Primary => format!("  PRIMARY KEY ({})", parts),
        IndexKind::Unique => format!("  UNIQUE KEY {} ({})", q(&index.name), parts),
        IndexKind::Regular => format!("  KEY {} ({})", q(&index.name), parts),
        IndexKind::Fulltext => format!("  FULLTEXT KEY {} ({})", q(&index.name), parts),
        IndexKind::Spatial => format!("  SPATIAL KEY {} ({})", q(&index.name), parts),
    };
    if !index.comment.is_empty() {
        line.push_str(&format!(" COMMENT {}", quote_string(&index.comment)));
    }
    if !index.visible {
        line.push_str(" /*!80000 INVISIBLE */");
    }
    line
}

fn foreign_key_line(table: &TableSchema, fk: &ForeignKeySchema) -> String {
    format!("  {}", foreign_key_clause(table, fk))
}

/// `CONSTRAINT ... FOREIGN KEY ... REFERENCES ...`, also quoted in constraint errors.
pub fn foreign_key_clause(table: &TableSchema, fk: &ForeignKeySchema) -> String {
    let target = if fk.ref_database.eq_ignore_ascii_case(&table.database) {
        q(&fk.ref_table)
    } else {
        format!("{}.{}", q(&fk.ref_database), q(&fk.ref_table))
    };
    let mut line = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        q(&fk.name),
        column_list(&fk.columns),
        target,
        column_list(&fk.ref_columns)
    );
    if fk.on_delete != ReferentialAction::NoAction {
        line.push_str(&format!(" ON DELETE {}", fk.on_delete.sql()));
    }
    if fk.on_update != ReferentialAction::NoAction {
        line.push_str(&format!(" ON UPDATE {}", fk.on_update.sql()));
    }
    line
}

fn check_line(check: &CheckSchema) -> String {
    let mut line = format!("  CONSTRAINT {} CHECK ({})", q(&check.name), check.expr);
    if !check.enforced {
        line.push_str(" /*!80016 NOT ENFORCED */");
    }
    line
}

/// `CREATE TABLE` statement for `table`. `next_auto_increment` is the value
/// the next generated id would take, shown when above 1.
pub fn show_create_table(table: &TableSchema, next_auto_increment: Option<u64>) -> String {
    let mut lines: Vec<String> = table.columns.iter().map(|c| column_line(table, c)).collect();
    lines.extend(table.indexes.iter().map(index_line));
    lines.extend(table.foreign_keys.iter().map(|fk| foreign_key_line(table, fk)));
    lines.extend(table.checks.iter().map(check_line));

    let mut out = format!(
        "CREATE {}TABLE {} (\n{}\n) ENGINE={}",
        if table.temporary { "TEMPORARY " } else { "" },
        q(&table.name),
        lines.join(",\n"),
        table.engine
    );
    let next = next_auto_increment.or(table.auto_increment).unwrap_or(0);
    if next > 1 {
        out.push_str(&format!(" AUTO_INCREMENT={}", next));
    }
    out.push_str(&format!(" DEFAULT CHARSET={} COLLATE={}", table.charset, table.collation));
    if !table.comment.is_empty() {
        out.push_str(&format!(" COMMENT={}", quote_string(&table.comment)));
    }
    out
}

pub fn show_create_database(db: &DatabaseSchema) -> String {
    format!(
        "CREATE DATABASE {} /*!40100 DEFAULT CHARACTER SET {} COLLATE {} */ /*!80016 DEFAULT ENCRYPTION='N' */",
        q(&db.name),
        db.charset,
        db.collation
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn ty(name: &str, args: &[u32]) -> DataType {
        DataType::from_parts(name, args, Vec::new()).unwrap()
    }

    fn orders() -> TableSchema {
        let mut t = TableSchema::new("app", "orders");
        let mut id = ColumnSchema::new("id", ty("INT", &[]));
        id.nullable = false;
        id.auto_increment = true;
        let mut status = ColumnSchema::new("status", ty("VARCHAR", &[20]));
        status.nullable = false;
        status.default = ColumnDefault::Literal(Value::text("new"));
        let mut total = ColumnSchema::new("total", ty("DECIMAL", &[10, 2]));
        total.default = ColumnDefault::Literal(Value::Float(0.0));
        let mut updated = ColumnSchema::new("updated_at", ty("TIMESTAMP", &[]));
        updated.default = ColumnDefault::CurrentTimestamp { fsp: 0 };
        updated.on_update_current_timestamp = true;
        let note = ColumnSchema::new("note", ty("TEXT", &[]));
        let customer = ColumnSchema::new("customer_id", ty("INT", &[]));
        t.columns = vec![id, status, total, updated, note, customer];
        t.indexes = vec![
            IndexSchema {
                name: "PRIMARY".into(),
                kind: IndexKind::Primary,
                parts: vec![IndexPart::column("id")],
                visible: true,
                comment: String::new(),
            },
            IndexSchema {
                name: "fk_customer".into(),
                kind: IndexKind::Regular,
                parts: vec![IndexPart::column("customer_id")],
                visible: true,
                comment: String::new(),
            },
            IndexSchema {
                name: "note_idx".into(),
                kind: IndexKind::Regular,
                parts: vec![IndexPart {
                    column: "note".into(),
                    prefix: Some(10),
                    desc: true,
                }],
                visible: false,
                comment: "hint".into(),
            },
        ];
        t.foreign_keys.push(ForeignKeySchema {
            name: "fk_customer".into(),
            columns: vec!["customer_id".into()],
            ref_database: "app".into(),
            ref_table: "customers".into(),
            ref_columns: vec!["id".into()],
            on_delete: ReferentialAction::Cascade,
            on_update: ReferentialAction::NoAction,
        });
        t.checks.push(CheckSchema {
            name: "orders_chk_1".into(),
            expr: "(`total` >= 0)".into(),
            enforced: false,
        });
        t
    }

    #[test]
    fn test_show_create_table_layout() {
        let expected = "CREATE TABLE `orders` (\n\
  `id` int NOT NULL AUTO_INCREMENT,\n\
  `status` varchar(20) NOT NULL DEFAULT 'new',\n\
  `total` decimal(10,2) DEFAULT '0.00',\n\
  `updated_at` timestamp NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,\n\
  `note` text,\n\
  `customer_id` int DEFAULT NULL,\n\
  PRIMARY KEY (`id`),\n\
  KEY `fk_customer` (`customer_id`),\n\
  KEY `note_idx` (`note`(10) DESC) COMMENT 'hint' /*!80000 INVISIBLE */,\n\
  CONSTRAINT `fk_customer` FOREIGN KEY (`customer_id`) REFERENCES `customers` (`id`) ON DELETE CASCADE,\n\
  CONSTRAINT `orders_chk_1` CHECK ((`total` >= 0)) /*!80016 NOT ENFORCED */\n\
) ENGINE=InnoDB AUTO_INCREMENT=7 DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_0900_ai_ci";
        assert_eq!(show_create_table(&orders(), Some(7)), expected);
    }

    #[test]
    fn test_auto_increment_hidden_at_start() {
        let text = show_create_table(&orders(), Some(1));
        assert!(!text.contains("AUTO_INCREMENT="));
    }

    #[test]
    fn test_column_collation_shown_when_different() {
        let mut t = TableSchema::new("app", "t");
        let mut name = ColumnSchema::new("name", ty("VARCHAR", &[5]));
        name.data_type.collation = Some("utf8mb4_bin".into());
        let mut legacy = ColumnSchema::new("legacy", ty("CHAR", &[2]));
        legacy.data_type.charset = Some("latin1".into());
        legacy.data_type.collation = Some("latin1_swedish_ci".into());
        t.columns = vec![name, legacy];
        t.comment = "it's".into();
        let text = show_create_table(&t, None);
        assert!(text.contains("`name` varchar(5) COLLATE utf8mb4_bin DEFAULT NULL"));
        assert!(text.contains("`legacy` char(2) CHARACTER SET latin1 COLLATE latin1_swedish_ci DEFAULT NULL"));
        assert!(text.ends_with("COMMENT='it''s'"));
    }

    #[test]
    fn test_show_create_database() {
        let db = DatabaseSchema {
            name: "shop".into(),
            charset: "utf8mb4".into(),
            collation: "utf8mb4_0900_ai_ci".into(),
        };
        assert_eq!(
            show_create_database(&db),
            "CREATE DATABASE `shop` /*!40100 DEFAULT CHARACTER SET utf8mb4 COLLATE utf8mb4_0900_ai_ci */ /*!80016 DEFAULT ENCRYPTION='N' */"
        );
    }
}
