//! Canonical MySQL text for expressions
//!
//! Every binary operation is printed inside its own parentheses and
//! redundant grouping is dropped, so displaying a re-parsed display gives
//! the same text again. CHECK clauses and expression defaults are stored in
//! this form.

use super::ast::*;
use std::fmt::{self, Write};

/// Backtick-quote an identifier.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Single-quote a string the way SHOW CREATE TABLE prints it.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

pub fn hex_literal(bytes: &[u8]) -> String {
    let mut out = String::from("0x");
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// `CHECK`/`DEFAULT (...)` body: the canonical text wrapped once.
pub fn parenthesized(expr: &Expr) -> String {
    let inner = expr.unnested();
    let text = inner.to_string();
    if text.starts_with('(') && text.ends_with(')') && balanced_outer(&text) {
        text
    } else {
        format!("({})", text)
    }
}

// Whether the first '(' closes at the very end
fn balanced_outer(text: &str) -> bool {
    let mut depth = 0usize;
    let mut in_string = false;
    let chars: Vec<char> = text.chars().collect();
    for (i, ch) in chars.iter().enumerate() {
        match ch {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != chars.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Boolean(true) => write!(f, "true"),
            Literal::Boolean(false) => write!(f, "false"),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "_utf8mb4{}", quote_string(s)),
            Literal::Hex(b) | Literal::Bit(b) => write!(f, "{}", hex_literal(b)),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(db) = &self.database {
            write!(f, "{}.", quote_identifier(db))?;
        }
        if let Some(t) = &self.table {
            write!(f, "{}.", quote_identifier(t))?;
        }
        write!(f, "{}", quote_identifier(&self.column))
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(db) = &self.database {
            write!(f, "{}.", quote_identifier(db))?;
        }
        write!(f, "{}", quote_identifier(&self.name))
    }
}

impl fmt::Display for CastTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastTarget::Signed => write!(f, "signed"),
            CastTarget::Unsigned => write!(f, "unsigned"),
            CastTarget::Char(None) => write!(f, "char charset utf8mb4"),
            CastTarget::Char(Some(n)) => write!(f, "char({}) charset utf8mb4", n),
            CastTarget::Binary(None) => write!(f, "char charset binary"),
            CastTarget::Binary(Some(n)) => write!(f, "char({}) charset binary", n),
            CastTarget::Decimal(p, s) => write!(f, "decimal({},{})", p.unwrap_or(10), s.unwrap_or(0)),
            CastTarget::Double => write!(f, "double"),
            CastTarget::Date => write!(f, "date"),
            CastTarget::DateTime(None) => write!(f, "datetime"),
            CastTarget::DateTime(Some(n)) => write!(f, "datetime({})", n),
            CastTarget::Time(None) => write!(f, "time"),
            CastTarget::Time(Some(n)) => write!(f, "time({})", n),
            CastTarget::Json => write!(f, "json"),
        }
    }
}

impl fmt::Display for OrderByExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.expr, if self.asc { "" } else { " desc" })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(c) => write!(f, "{}", c),
            Expr::Literal(l) => write!(f, "{}", l),
            Expr::Placeholder(_) => write!(f, "?"),
            Expr::UserVariable(name) => write!(f, "@{}", quote_identifier(name)),
            Expr::SystemVariable { scope, name } => match scope {
                Some(super::token::VariableScope::Global) => write!(f, "@@global.{}", name),
                Some(super::token::VariableScope::Session) => write!(f, "@@session.{}", name),
                None => write!(f, "@@{}", name),
            },
            Expr::AssignUserVariable { name, value } => {
                write!(f, "(@{} := {})", quote_identifier(name), value)
            }
            Expr::Unary { op, expr } => match op {
                UnaryOperator::Minus => write!(f, "-{}", expr),
                UnaryOperator::Plus => write!(f, "{}", expr),
                UnaryOperator::Not => write!(f, "(not({}))", expr),
                UnaryOperator::BitNot => write!(f, "~({})", expr),
                UnaryOperator::Binary => write!(f, "cast({} as char charset binary)", expr),
            },
            Expr::Binary { left, op, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::IsNull { expr, negated } => {
                write!(f, "({} is {}null)", expr, if *negated { "not " } else { "" })
            }
            Expr::IsBool {
                expr,
                value,
                negated,
            } => write!(
                f,
                "({} is {}{})",
                expr,
                if *negated { "not " } else { "" },
                if *value { "true" } else { "false" }
            ),
            Expr::InList {
                expr,
                list,
                negated,
            } => write!(
                f,
                "({} {}in ({}))",
                expr,
                if *negated { "not " } else { "" },
                join(list, ",")
            ),
            Expr::InSubquery {
                expr,
                query,
                negated,
            } => write!(
                f,
                "({} {}in ({}))",
                expr,
                if *negated { "not " } else { "" },
                query
            ),
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => write!(
                f,
                "({} {}between {} and {})",
                expr,
                if *negated { "not " } else { "" },
                low,
                high
            ),
            Expr::Like {
                expr,
                pattern,
                escape,
                negated,
            } => {
                write!(
                    f,
                    "({} {}like {}",
                    expr,
                    if *negated { "not " } else { "" },
                    pattern
                )?;
                if let Some(e) = escape {
                    write!(f, " escape {}", e)?;
                }
                write!(f, ")")
            }
            Expr::Regexp {
                expr,
                pattern,
                negated,
            } => write!(
                f,
                "({} {}regexp {})",
                expr,
                if *negated { "not " } else { "" },
                pattern
            ),
            Expr::Function {
                name,
                args,
                distinct,
            } => write!(
                f,
                "{}({}{})",
                name.to_ascii_lowercase(),
                if *distinct { "distinct " } else { "" },
                join(args, ",")
            ),
            Expr::Wildcard => write!(f, "*"),
            Expr::GroupConcat {
                distinct,
                args,
                order_by,
                separator,
            } => {
                write!(
                    f,
                    "group_concat({}{}",
                    if *distinct { "distinct " } else { "" },
                    join(args, ",")
                )?;
                if !order_by.is_empty() {
                    write!(f, " order by {}", join(order_by, ","))?;
                }
                write!(
                    f,
                    " separator {})",
                    quote_string(separator.as_deref().unwrap_or(","))
                )
            }
            Expr::Case {
                operand,
                branches,
                else_result,
            } => {
                write!(f, "(case")?;
                if let Some(o) = operand {
                    write!(f, " {}", o)?;
                }
                for (when, then) in branches {
                    write!(f, " when {} then {}", when, then)?;
                }
                if let Some(e) = else_result {
                    write!(f, " else {}", e)?;
                }
                write!(f, " end)")
            }
            Expr::Cast { expr, target } => write!(f, "cast({} as {})", expr, target),
            Expr::Interval { value, unit } => {
                write!(f, "interval {} {}", value, unit.to_ascii_lowercase())
            }
            Expr::Collate { expr, collation } => write!(f, "({} collate {})", expr, collation),
            Expr::JsonExtract {
                expr,
                path,
                unquote,
            } => {
                if *unquote {
                    write!(f, "json_unquote(json_extract({},{}))", expr, quote_string(path))
                } else {
                    write!(f, "json_extract({},{})", expr, quote_string(path))
                }
            }
            Expr::Subquery(q) => write!(f, "({})", q),
            Expr::Exists { query, negated } => {
                write!(f, "{}exists({})", if *negated { "not " } else { "" }, query)
            }
            // Grouping is implied by the operator forms above
            Expr::Nested(inner) => write!(f, "{}", inner),
            Expr::Tuple(items) => write!(f, "({})", join(items, ",")),
            Expr::Default => write!(f, "DEFAULT"),
            Expr::InsertedValue(col) => write!(f, "values({})", quote_identifier(col)),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRef::Table { name, alias } => {
                write!(f, "{}", name)?;
                if let Some(a) = alias {
                    write!(f, " {}", quote_identifier(a))?;
                }
                Ok(())
            }
            TableRef::Derived { query, alias } => {
                write!(f, "({}) {}", query, quote_identifier(alias))
            }
            TableRef::Join {
                left,
                right,
                kind,
                constraint,
            } => {
                let kw = match kind {
                    JoinKind::Inner => "join",
                    JoinKind::Left => "left join",
                    JoinKind::Right => "right join",
                    JoinKind::Cross => "join",
                    JoinKind::Straight => "straight_join",
                };
                if matches!(constraint, JoinConstraint::Natural) {
                    write!(f, "{} natural {} {}", left, kw, right)
                } else {
                    write!(f, "{} {} {}", left, kw, right)?;
                    match constraint {
                        JoinConstraint::On(e) => write!(f, " on({})", e),
                        JoinConstraint::Using(cols) => {
                            let cols: Vec<String> = cols.iter().map(|c| quote_identifier(c)).collect();
                            write!(f, " using ({})", cols.join(","))
                        }
                        _ => Ok(()),
                    }
                }
            }
        }
    }
}

impl fmt::Display for SelectStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select ")?;
        if self.distinct {
            write!(f, "distinct ")?;
        }
        let items: Vec<String> = self
            .columns
            .iter()
            .map(|item| match item {
                SelectItem::Wildcard => "*".to_string(),
                SelectItem::QualifiedWildcard(t) => format!("{}.*", t),
                SelectItem::Expr { expr, alias, .. } => match alias {
                    Some(a) => format!("{} AS {}", expr, quote_identifier(a)),
                    None => expr.to_string(),
                },
            })
            .collect();
        write!(f, "{}", items.join(","))?;
        if !self.from.is_empty() {
            write!(f, " from {}", join(&self.from, " join "))?;
        }
        if let Some(w) = &self.where_clause {
            write!(f, " where {}", w)?;
        }
        if !self.group_by.is_empty() {
            write!(f, " group by {}", join(&self.group_by, ","))?;
        }
        if let Some(h) = &self.having {
            write!(f, " having {}", h)?;
        }
        Ok(())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.select)?;
        for part in &self.unions {
            write!(f, " union {}{}", if part.all { "all " } else { "" }, part.select)?;
        }
        if !self.order_by.is_empty() {
            write!(f, " order by {}", join(&self.order_by, ","))?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " limit ")?;
            if let Some(o) = &limit.offset {
                write!(f, "{},", o)?;
            }
            write!(f, "{}", limit.count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("it's"), "'it''s'");
        assert_eq!(quote_string("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn test_binary_display() {
        let e = Expr::Binary {
            left: Box::new(Expr::column("price")),
            op: BinaryOperator::Gt,
            right: Box::new(Expr::number(0)),
        };
        assert_eq!(e.to_string(), "(`price` > 0)");
        assert_eq!(parenthesized(&e), "(`price` > 0)");
        assert_eq!(parenthesized(&Expr::number(5)), "(5)");
    }

    #[test]
    fn test_nested_is_transparent() {
        let e = Expr::Nested(Box::new(Expr::InList {
            expr: Box::new(Expr::column("s")),
            list: vec![Expr::string("a"), Expr::string("b")],
            negated: false,
        }));
        assert_eq!(e.to_string(), "(`s` in (_utf8mb4'a',_utf8mb4'b'))");
    }

    #[test]
    fn test_balanced_outer() {
        assert!(balanced_outer("(a)"));
        assert!(!balanced_outer("(a) + (b)"));
        assert!(balanced_outer("(')')"));
    }
}
