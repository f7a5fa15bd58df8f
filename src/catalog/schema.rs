//! Catalog object definitions
//!
//! These are the persisted shapes: every field here survives a bincode round
//! trip through the internal catalog tables.

use crate::types::{DataType, Value};
use serde::{Deserialize, Serialize};

/// Prefix reserved for the driver's own objects.
pub const RESERVED_PREFIX: &str = "_mysqlite_";

pub fn is_reserved_name(name: &str) -> bool {
    name.len() >= RESERVED_PREFIX.len()
        && name[..RESERVED_PREFIX.len()].eq_ignore_ascii_case(RESERVED_PREFIX)
}

/// Case-insensitive key used for every name lookup.
pub fn fold(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub name: String,
    pub charset: String,
    pub collation: String,
}

/// DEFAULT clause of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnDefault {
    /// No DEFAULT clause
    None,
    Null,
    /// Literal, already cast to the column type
    Literal(Value),
    /// `CURRENT_TIMESTAMP[(fsp)]`
    CurrentTimestamp { fsp: u32 },
    /// `DEFAULT (expr)`, canonical text without the outer parentheses
    Expression(String),
}

impl ColumnDefault {
    pub fn is_none(&self) -> bool {
        matches!(self, ColumnDefault::None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub default: ColumnDefault,
    pub on_update_current_timestamp: bool,
    pub auto_increment: bool,
    pub comment: String,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            default: ColumnDefault::None,
            on_update_current_timestamp: false,
            auto_increment: false,
            comment: String::new(),
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Whether an omitted value has something to fall back on.
    pub fn has_default(&self) -> bool {
        self.nullable || self.auto_increment || !self.default.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Primary,
    Unique,
    Regular,
    Fulltext,
    Spatial,
}

impl IndexKind {
    pub fn is_unique(&self) -> bool {
        matches!(self, IndexKind::Primary | IndexKind::Unique)
    }

    /// Whether the index exists natively; FULLTEXT and SPATIAL live in the catalog only.
    pub fn is_native(&self) -> bool {
        matches!(self, IndexKind::Unique | IndexKind::Regular)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPart {
    pub column: String,
    pub prefix: Option<u32>,
    pub desc: bool,
}

impl IndexPart {
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            column: name.into(),
            prefix: None,
            desc: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSchema {
    /// `PRIMARY` for the primary key
    pub name: String,
    pub kind: IndexKind,
    pub parts: Vec<IndexPart>,
    pub visible: bool,
    pub comment: String,
}

impl IndexSchema {
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.parts.iter().map(|p| p.column.as_str()).collect()
    }

    pub fn covers(&self, column: &str) -> bool {
        self.parts.iter().any(|p| p.column.eq_ignore_ascii_case(column))
    }

    /// Whether `columns` are a leftmost prefix of this index.
    pub fn starts_with(&self, columns: &[String]) -> bool {
        columns.len() <= self.parts.len()
            && columns
                .iter()
                .zip(&self.parts)
                .all(|(c, p)| p.column.eq_ignore_ascii_case(c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeySchema {
    pub name: String,
    pub columns: Vec<String>,
    pub ref_database: String,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

impl ForeignKeySchema {
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn references(&self, database: &str, table: &str) -> bool {
        self.ref_database.eq_ignore_ascii_case(database) && self.ref_table.eq_ignore_ascii_case(table)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSchema {
    pub name: String,
    /// Canonical expression text, without the outer parentheses
    pub expr: String,
    pub enforced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub database: String,
    pub name: String,
    pub temporary: bool,
    pub columns: Vec<ColumnSchema>,
    /// PRIMARY first, then in creation order
    pub indexes: Vec<IndexSchema>,
    pub foreign_keys: Vec<ForeignKeySchema>,
    pub checks: Vec<CheckSchema>,
    pub engine: String,
    pub charset: String,
    pub collation: String,
    pub comment: String,
    /// AUTO_INCREMENT table option as written
    pub auto_increment: Option<u64>,
}

impl TableSchema {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
            temporary: false,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
            engine: "InnoDB".to_string(),
            charset: "utf8mb4".to_string(),
            collation: "utf8mb4_0900_ai_ci".to_string(),
            comment: String::new(),
            auto_increment: None,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.is_named(name))
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnSchema> {
        self.columns.iter_mut().find(|c| c.is_named(name))
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.is_named(name))
    }

    pub fn primary_key(&self) -> Option<&IndexSchema> {
        self.indexes.iter().find(|i| i.kind == IndexKind::Primary)
    }

    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|i| i.is_named(name))
    }

    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKeySchema> {
        self.foreign_keys.iter().find(|f| f.is_named(name))
    }

    pub fn check(&self, name: &str) -> Option<&CheckSchema> {
        self.checks.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn auto_increment_column(&self) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.auto_increment)
    }

    /// `COLUMN_KEY` of a column: PRI, UNI, MUL or empty.
    pub fn column_key(&self, column: &str) -> &'static str {
        let leads = |i: &&IndexSchema| {
            i.parts
                .first()
                .map(|p| p.column.eq_ignore_ascii_case(column))
                .unwrap_or(false)
        };
        if self.primary_key().map(|pk| pk.covers(column)).unwrap_or(false) {
            return "PRI";
        }
        if self
            .indexes
            .iter()
            .filter(leads)
            .any(|i| i.kind == IndexKind::Unique && i.parts.len() == 1)
        {
            return "UNI";
        }
        if self.indexes.iter().any(|i| leads(&i)) {
            return "MUL";
        }
        ""
    }

    /// Index name that is free: `base`, else `base_2`, `base_3`, ...
    pub fn unique_index_name(&self, base: &str) -> String {
        if self.index(base).is_none() && !base.eq_ignore_ascii_case("PRIMARY") {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| self.index(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    /// Next implicit constraint name of the form `<table>_<infix>_<n>`.
    pub fn next_constraint_name(&self, infix: &str, taken: impl Fn(&str) -> bool) -> String {
        (1..)
            .map(|n| format!("{}_{}_{}", self.name, infix, n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| format!("{}_{}", self.name, infix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableSchema {
        let mut t = TableSchema::new("app", "orders");
        t.columns.push(ColumnSchema::new("id", DataType::int()));
        t.columns.push(ColumnSchema::new("customer", DataType::int()));
        t.columns.push(ColumnSchema::new("code", DataType::varchar(10)));
        t.indexes.push(IndexSchema {
            name: "PRIMARY".into(),
            kind: IndexKind::Primary,
            parts: vec![IndexPart::column("id")],
            visible: true,
            comment: String::new(),
        });
        t.indexes.push(IndexSchema {
            name: "code".into(),
            kind: IndexKind::Unique,
            parts: vec![IndexPart::column("code")],
            visible: true,
            comment: String::new(),
        });
        t.indexes.push(IndexSchema {
            name: "customer".into(),
            kind: IndexKind::Regular,
            parts: vec![IndexPart::column("customer"), IndexPart::column("code")],
            visible: true,
            comment: String::new(),
        });
        t
    }

    #[test]
    fn test_reserved_prefix() {
        assert!(is_reserved_name("_MYSQLITE_tables"));
        assert!(!is_reserved_name("mysqlite"));
    }

    #[test]
    fn test_column_keys() {
        let t = table();
        assert_eq!(t.column_key("ID"), "PRI");
        assert_eq!(t.column_key("code"), "UNI");
        assert_eq!(t.column_key("customer"), "MUL");
    }

    #[test]
    fn test_unique_index_name() {
        let t = table();
        assert_eq!(t.unique_index_name("code"), "code_2");
        assert_eq!(t.unique_index_name("other"), "other");
        assert_eq!(t.unique_index_name("PRIMARY"), "PRIMARY_2");
    }

    #[test]
    fn test_leftmost_prefix() {
        let t = table();
        let idx = t.index("customer").unwrap();
        assert!(idx.starts_with(&["customer".to_string()]));
        assert!(!idx.starts_with(&["code".to_string()]));
    }

    #[test]
    fn test_constraint_names() {
        let t = table();
        let name = t.next_constraint_name("ibfk", |n| n == "orders_ibfk_1");
        assert_eq!(name, "orders_ibfk_2");
    }
}
