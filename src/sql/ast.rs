/// Abstract Syntax Tree for MySQL-dialect statements
use super::token::VariableScope;
use crate::types::DataType;

/// Top-level SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Query),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    CreateTable(CreateTableStmt),
    AlterTable(AlterTableStmt),
    DropTable(DropTableStmt),
    RenameTable(Vec<(ObjectName, ObjectName)>),
    TruncateTable(ObjectName),
    CreateIndex(CreateIndexStmt),
    DropIndex { name: String, table: ObjectName },
    CreateDatabase(CreateDatabaseStmt),
    DropDatabase { name: String, if_exists: bool },
    Use(String),
    Set(Vec<SetAssignment>),
    SetNames { charset: String, collation: Option<String> },
    SetTransaction, // isolation level / access mode accepted, no effect
    Show(ShowStmt),
    Describe { table: ObjectName, column: Option<String> },
    Begin,
    Commit,
    Rollback,
    Savepoint(String),
    ReleaseSavepoint(String),
    RollbackToSavepoint(String),
    LockTables(Vec<LockTarget>),
    UnlockTables,
}

impl Statement {
    /// Whether the statement reads or writes rows only (no schema change).
    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            Statement::Select(_) | Statement::Insert(_) | Statement::Update(_) | Statement::Delete(_)
        )
    }
}

/// Optionally database-qualified name: `t` or `db.t`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectName {
    pub database: Option<String>,
    pub name: String,
}

impl ObjectName {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            database: None,
            name: name.into(),
        }
    }

    pub fn qualified(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            name: name.into(),
        }
    }
}

/// SELECT with optional UNION chain; ORDER BY / LIMIT apply to the whole
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub select: Box<SelectStmt>,
    pub unions: Vec<UnionPart>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<Limit>,
}

impl Query {
    pub fn simple(select: SelectStmt) -> Self {
        Self {
            select: Box::new(select),
            unions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionPart {
    pub all: bool,
    pub select: SelectStmt,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStmt {
    pub distinct: bool,
    pub calc_found_rows: bool, // SQL_CALC_FOUND_ROWS
    pub columns: Vec<SelectItem>,
    pub from: Vec<TableRef>, // comma-separated; empty for FROM DUAL
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,                       // *
    QualifiedWildcard(ObjectName),  // t.* or db.t.*
    Expr {
        expr: Expr,
        alias: Option<String>,
        /// Source text of the expression, the default column label
        text: String,
    },
}

/// Table reference in FROM clause
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Table {
        name: ObjectName,
        alias: Option<String>,
    },
    Derived {
        query: Box<Query>,
        alias: String,
    },
    Join {
        left: Box<TableRef>,
        right: Box<TableRef>,
        kind: JoinKind,
        constraint: JoinConstraint,
    },
}

impl TableRef {
    /// Every base table reachable from this reference, left to right.
    pub fn tables(&self) -> Vec<(&ObjectName, Option<&str>)> {
        match self {
            TableRef::Table { name, alias } => vec![(name, alias.as_deref())],
            TableRef::Derived { .. } => Vec::new(),
            TableRef::Join { left, right, .. } => {
                let mut out = left.tables();
                out.extend(right.tables());
                out
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
    Straight,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    On(Expr),
    Using(Vec<String>),
    Natural,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub asc: bool, // true = ASC, false = DESC
}

#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub count: Expr,
    pub offset: Option<Expr>,
}

/// Column reference: `c`, `t.c` or `db.t.c`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub database: Option<String>,
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn bare(column: impl Into<String>) -> Self {
        Self {
            database: None,
            table: None,
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    /// Numeric text as written
    Number(String),
    String(String),
    Hex(Vec<u8>),
    Bit(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Minus,
    Plus,
    Not,    // NOT and !
    BitNot, // ~
    Binary, // BINARY expr
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    Xor,
    And,
    Eq,
    NullSafeEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitOr,
    BitAnd,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NullSafeEq
                | BinaryOperator::Ne
                | BinaryOperator::Lt
                | BinaryOperator::Le
                | BinaryOperator::Gt
                | BinaryOperator::Ge
        )
    }

    /// Binding strength, higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::Xor => 2,
            BinaryOperator::And => 3,
            BinaryOperator::Eq
            | BinaryOperator::NullSafeEq
            | BinaryOperator::Ne
            | BinaryOperator::Lt
            | BinaryOperator::Le
            | BinaryOperator::Gt
            | BinaryOperator::Ge => 5,
            BinaryOperator::BitOr => 6,
            BinaryOperator::BitAnd => 7,
            BinaryOperator::ShiftLeft | BinaryOperator::ShiftRight => 8,
            BinaryOperator::Add | BinaryOperator::Sub => 9,
            BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::IntDiv | BinaryOperator::Mod => 10,
            BinaryOperator::BitXor => 11,
        }
    }

    /// MySQL spelling, as shown in canonical expression text
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Or => "or",
            BinaryOperator::Xor => "xor",
            BinaryOperator::And => "and",
            BinaryOperator::Eq => "=",
            BinaryOperator::NullSafeEq => "<=>",
            BinaryOperator::Ne => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitXor => "^",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::IntDiv => "DIV",
            BinaryOperator::Mod => "%",
        }
    }
}

/// Target of CAST / CONVERT
#[derive(Debug, Clone, PartialEq)]
pub enum CastTarget {
    Signed,
    Unsigned,
    Char(Option<u32>),
    Binary(Option<u32>),
    Decimal(Option<u32>, Option<u32>),
    Double,
    Date,
    DateTime(Option<u32>),
    Time(Option<u32>),
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    Literal(Literal),
    /// `?`, numbered left to right from zero
    Placeholder(usize),
    UserVariable(String),
    SystemVariable {
        scope: Option<VariableScope>,
        name: String,
    },
    /// `@v := expr`
    AssignUserVariable {
        name: String,
        value: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    /// `IS [NOT] TRUE|FALSE`
    IsBool {
        expr: Box<Expr>,
        value: bool,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        query: Box<Query>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
        negated: bool,
    },
    Regexp {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    Function {
        /// Upper-cased function name
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// `*` inside `COUNT(*)`
    Wildcard,
    GroupConcat {
        distinct: bool,
        args: Vec<Expr>,
        order_by: Vec<OrderByExpr>,
        separator: Option<String>,
    },
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        else_result: Option<Box<Expr>>,
    },
    Cast {
        expr: Box<Expr>,
        target: CastTarget,
    },
    /// `INTERVAL expr unit`, only meaningful inside date arithmetic
    Interval {
        value: Box<Expr>,
        unit: String,
    },
    Collate {
        expr: Box<Expr>,
        collation: String,
    },
    /// `col->'$.path'` / `col->>'$.path'`
    JsonExtract {
        expr: Box<Expr>,
        path: String,
        unquote: bool,
    },
    Subquery(Box<Query>),
    Exists {
        query: Box<Query>,
        negated: bool,
    },
    /// Parenthesized expression, kept for canonical display
    Nested(Box<Expr>),
    /// Row constructor `(a, b)`
    Tuple(Vec<Expr>),
    /// `DEFAULT` in VALUES / SET
    Default,
    /// `VALUES(col)` inside ON DUPLICATE KEY UPDATE
    InsertedValue(String),
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::bare(name))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(s.into()))
    }

    pub fn number(n: impl ToString) -> Self {
        Expr::Literal(Literal::Number(n.to_string()))
    }

    /// Strip redundant parentheses.
    pub fn unnested(&self) -> &Expr {
        match self {
            Expr::Nested(inner) => inner.unnested(),
            other => other,
        }
    }

    pub fn is_literal(&self) -> bool {
        match self.unnested() {
            Expr::Literal(_) => true,
            Expr::Unary {
                op: UnaryOperator::Minus | UnaryOperator::Plus,
                expr,
            } => matches!(expr.unnested(), Expr::Literal(Literal::Number(_))),
            _ => false,
        }
    }

    /// Whether any aggregate function appears outside subqueries.
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if let Expr::Function { name, .. } = e {
                if is_aggregate(name) {
                    found = true;
                }
            }
            if matches!(e, Expr::GroupConcat { .. }) {
                found = true;
            }
        });
        found
    }

    /// Pre-order traversal that does not descend into subqueries.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::AssignUserVariable { value, .. } => value.walk(visit),
            Expr::Unary { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::IsBool { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::Collate { expr, .. }
            | Expr::JsonExtract { expr, .. }
            | Expr::Nested(expr)
            | Expr::InSubquery { expr, .. } => expr.walk(visit),
            Expr::Interval { value, .. } => value.walk(visit),
            Expr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::InList { expr, list, .. } => {
                expr.walk(visit);
                list.iter().for_each(|e| e.walk(visit));
            }
            Expr::Between { expr, low, high, .. } => {
                expr.walk(visit);
                low.walk(visit);
                high.walk(visit);
            }
            Expr::Like {
                expr, pattern, escape, ..
            } => {
                expr.walk(visit);
                pattern.walk(visit);
                if let Some(e) = escape {
                    e.walk(visit);
                }
            }
            Expr::Regexp { expr, pattern, .. } => {
                expr.walk(visit);
                pattern.walk(visit);
            }
            Expr::Function { args, .. } | Expr::Tuple(args) => {
                args.iter().for_each(|e| e.walk(visit))
            }
            Expr::GroupConcat { args, order_by, .. } => {
                args.iter().for_each(|e| e.walk(visit));
                order_by.iter().for_each(|o| o.expr.walk(visit));
            }
            Expr::Case {
                operand,
                branches,
                else_result,
            } => {
                if let Some(o) = operand {
                    o.walk(visit);
                }
                for (w, t) in branches {
                    w.walk(visit);
                    t.walk(visit);
                }
                if let Some(e) = else_result {
                    e.walk(visit);
                }
            }
            _ => {}
        }
    }

    /// Columns referenced outside subqueries, in source order.
    pub fn referenced_columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Column(c) = e {
                out.push(c);
            }
        });
        out
    }
}

pub fn is_aggregate(name: &str) -> bool {
    matches!(
        name,
        "COUNT" | "SUM" | "AVG" | "MIN" | "MAX" | "BIT_AND" | "BIT_OR" | "BIT_XOR" | "STD"
            | "STDDEV" | "STDDEV_POP" | "STDDEV_SAMP" | "VARIANCE" | "VAR_POP" | "VAR_SAMP"
            | "GROUP_CONCAT" | "JSON_ARRAYAGG" | "JSON_OBJECTAGG"
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: ColumnRef,
    pub value: Expr,
}

/// INSERT / REPLACE statement
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub table: ObjectName,
    pub columns: Vec<String>, // empty means all columns in order
    pub source: InsertSource,
    pub ignore: bool,
    pub replace: bool,
    pub on_duplicate: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Select(Box<Query>),
}

/// UPDATE statement (single or multi-table)
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    pub tables: Vec<TableRef>,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<Limit>,
    pub ignore: bool,
}

/// DELETE statement
///
/// `targets` is empty for the single-table form; the multi-table forms
/// (`DELETE t1, t2 FROM ...` and `DELETE FROM t1, t2 USING ...`) list the
/// tables rows are removed from.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub targets: Vec<ObjectName>,
    pub from: Vec<TableRef>,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<Limit>,
    pub ignore: bool,
}

/// Column definition inside CREATE / ALTER TABLE
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: Option<bool>, // None = not specified
    pub default: Option<Expr>,
    pub on_update_current_timestamp: bool,
    pub auto_increment: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub comment: Option<String>,
    pub check: Option<CheckDef>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: None,
            default: None,
            on_update_current_timestamp: false,
            auto_increment: false,
            primary_key: false,
            unique: false,
            comment: None,
            check: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckDef {
    pub name: Option<String>,
    pub expr: Expr,
    pub enforced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPart {
    pub column: String,
    pub prefix: Option<u32>,
    pub desc: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Regular,
    Unique,
    Fulltext,
    Spatial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraint {
    PrimaryKey {
        parts: Vec<IndexPart>,
        comment: Option<String>,
    },
    Index {
        /// CONSTRAINT name (UNIQUE only)
        constraint_name: Option<String>,
        name: Option<String>,
        kind: IndexKind,
        parts: Vec<IndexPart>,
        comment: Option<String>,
        visible: bool,
    },
    ForeignKey {
        name: Option<String>,
        index_name: Option<String>,
        columns: Vec<String>,
        ref_table: ObjectName,
        ref_columns: Vec<String>,
        on_delete: ReferentialAction,
        on_update: ReferentialAction,
    },
    Check(CheckDef),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableOptions {
    pub engine: Option<String>,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub comment: Option<String>,
    pub auto_increment: Option<u64>,
}

impl TableOptions {
    pub fn is_empty(&self) -> bool {
        *self == TableOptions::default()
    }
}

/// CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStmt {
    pub name: ObjectName,
    pub temporary: bool,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<TableConstraint>,
    pub options: TableOptions,
    /// CREATE TABLE t LIKE other
    pub like: Option<ObjectName>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnPosition {
    First,
    After(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterAction {
    AddColumn {
        column: ColumnDef,
        position: Option<ColumnPosition>,
    },
    AddConstraint(TableConstraint),
    DropColumn(String),
    DropPrimaryKey,
    DropIndex(String),
    DropForeignKey(String),
    DropCheck(String),
    DropConstraint(String),
    ModifyColumn {
        column: ColumnDef,
        position: Option<ColumnPosition>,
    },
    ChangeColumn {
        old_name: String,
        column: ColumnDef,
        position: Option<ColumnPosition>,
    },
    RenameColumn {
        old_name: String,
        new_name: String,
    },
    RenameIndex {
        old_name: String,
        new_name: String,
    },
    RenameTable(ObjectName),
    SetDefault {
        column: String,
        default: Expr,
    },
    DropDefault(String),
    IndexVisibility {
        name: String,
        visible: bool,
    },
    CheckEnforcement {
        name: String,
        enforced: bool,
    },
    ConvertCharset {
        charset: String,
        collation: Option<String>,
    },
    Options(TableOptions),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableStmt {
    pub name: ObjectName,
    pub actions: Vec<AlterAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStmt {
    pub names: Vec<ObjectName>,
    pub if_exists: bool,
    pub temporary: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStmt {
    pub name: String,
    pub table: ObjectName,
    pub kind: IndexKind,
    pub parts: Vec<IndexPart>,
    pub comment: Option<String>,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateDatabaseStmt {
    pub name: String,
    pub if_not_exists: bool,
    pub charset: Option<String>,
    pub collation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetTarget {
    User(String),
    System {
        scope: Option<VariableScope>,
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetAssignment {
    pub target: SetTarget,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShowFilter {
    Like(String),
    Where(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShowStmt {
    Databases {
        filter: Option<ShowFilter>,
    },
    Tables {
        database: Option<String>,
        full: bool,
        filter: Option<ShowFilter>,
    },
    Columns {
        table: ObjectName,
        full: bool,
        filter: Option<ShowFilter>,
    },
    Index {
        table: ObjectName,
        filter: Option<ShowFilter>,
    },
    CreateTable(ObjectName),
    CreateDatabase {
        name: String,
        if_not_exists: bool,
    },
    TableStatus {
        database: Option<String>,
        filter: Option<ShowFilter>,
    },
    Variables {
        global: bool,
        filter: Option<ShowFilter>,
    },
    Collation {
        filter: Option<ShowFilter>,
    },
    CharacterSet {
        filter: Option<ShowFilter>,
    },
    Warnings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LockTarget {
    pub table: ObjectName,
    pub alias: Option<String>,
    pub write: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_precedence() {
        assert!(BinaryOperator::Mul.precedence() > BinaryOperator::Add.precedence());
        assert!(BinaryOperator::And.precedence() > BinaryOperator::Or.precedence());
        assert!(BinaryOperator::Eq.is_comparison());
        assert!(!BinaryOperator::BitAnd.is_comparison());
    }

    #[test]
    fn test_contains_aggregate() {
        let expr = Expr::Binary {
            left: Box::new(Expr::Function {
                name: "COUNT".into(),
                args: vec![Expr::Wildcard],
                distinct: false,
            }),
            op: BinaryOperator::Add,
            right: Box::new(Expr::number(1)),
        };
        assert!(expr.contains_aggregate());
        assert!(!Expr::column("a").contains_aggregate());
    }

    #[test]
    fn test_referenced_columns() {
        let expr = Expr::Between {
            expr: Box::new(Expr::column("a")),
            low: Box::new(Expr::column("b")),
            high: Box::new(Expr::number(3)),
            negated: false,
        };
        let cols: Vec<&str> = expr
            .referenced_columns()
            .iter()
            .map(|c| c.column.as_str())
            .collect();
        assert_eq!(cols, vec!["a", "b"]);
    }
}
