//! Expression rendering
//!
//! Operators that mean the same thing natively pass through; the rest are
//! rewritten: `<=>` becomes `IS`, `XOR` and `DIV` are spelled out, LIKE gets
//! the escape character the dialect implies, and MySQL functions map onto
//! native ones or the registered `_mysqlite_*` helpers.

use super::scope::{Clause, Scope};
use super::{Compiler, Emit};
use crate::catalog::is_case_insensitive;
use crate::cast::ColumnTarget;
use crate::error::{DriverError, Result};
use crate::sql::ast::{
    BinaryOperator, CastTarget, Expr, Literal, OrderByExpr, UnaryOperator,
};
use crate::types::temporal::numeric_prefix;
use crate::types::{format_float, DataType, TypeFamily, Value};

/// Literal SQL for a value, used where no parameter can be bound.
pub(crate) fn literal_sql(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Unsigned(u) => u.to_string(),
        Value::Float(f) if f.is_finite() => {
            let text = format_float(*f);
            if text.contains(['.', 'e', 'E']) {
                text
            } else {
                format!("{}.0", text)
            }
        }
        Value::Float(_) => "NULL".to_string(),
        Value::Text(s) => quote_literal(s),
        Value::Bytes(b) => format!("X'{}'", hex(b)),
    }
}

pub(crate) fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Numeric value of a number literal's text.
pub(crate) fn number_value(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(u) = text.parse::<u64>() {
        return Value::Unsigned(u);
    }
    text.parse::<f64>().map(Value::Float).unwrap_or(Value::Null)
}

fn negate(value: Value) -> Value {
    match value {
        Value::Integer(i) => i.checked_neg().map(Value::Integer).unwrap_or(Value::Float(-(i as f64))),
        Value::Unsigned(u) if u == i64::MAX as u64 + 1 => Value::Integer(i64::MIN),
        Value::Unsigned(u) => Value::Float(-(u as f64)),
        Value::Float(f) => Value::Float(-f),
        other => other,
    }
}

fn bits_value(bytes: &[u8]) -> Value {
    if bytes.len() > 8 {
        return Value::Bytes(bytes.to_vec());
    }
    let n = bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
    i64::try_from(n).map(Value::Integer).unwrap_or(Value::Unsigned(n))
}

/// strftime field for an EXTRACT / YEAR()-style unit.
fn strftime_field(unit: &str) -> Option<&'static str> {
    Some(match unit {
        "YEAR" => "%Y",
        "MONTH" => "%m",
        "DAY" | "DAYOFMONTH" => "%d",
        "HOUR" => "%H",
        "MINUTE" => "%M",
        "SECOND" => "%S",
        "DAYOFYEAR" => "%j",
        _ => return None,
    })
}

/// Seconds in a fixed-length TIMESTAMPDIFF unit.
fn unit_seconds(unit: &str) -> Option<i64> {
    Some(match unit {
        "SECOND" => 1,
        "MINUTE" => 60,
        "HOUR" => 3600,
        "DAY" => 86_400,
        "WEEK" => 604_800,
        _ => return None,
    })
}

impl Compiler<'_> {
    /// Value of an expression known before execution: literals, signed
    /// numbers and placeholders.
    pub(crate) fn literal_value(&self, e: &Expr) -> Option<Value> {
        match e.unnested() {
            Expr::Literal(lit) => Some(match lit {
                Literal::Null => Value::Null,
                Literal::Boolean(b) => Value::from_bool(*b),
                Literal::Number(n) => number_value(n),
                Literal::String(s) => Value::text(s.clone()),
                Literal::Hex(b) => Value::Bytes(b.clone()),
                Literal::Bit(b) => bits_value(b),
            }),
            Expr::Placeholder(i) => Some(self.args.get(*i).cloned().unwrap_or(Value::Null)),
            Expr::Unary {
                op: UnaryOperator::Minus,
                expr,
            } => match self.literal_value(expr)? {
                v @ (Value::Integer(_) | Value::Unsigned(_) | Value::Float(_)) => Some(negate(v)),
                _ => None,
            },
            Expr::Unary {
                op: UnaryOperator::Plus,
                expr,
            } => self.literal_value(expr),
            _ => None,
        }
    }

    fn no_backslash_escapes(&self, out: &Emit) -> bool {
        !out.inline && self.session.sql_mode.no_backslash_escapes
    }

    /// Whether string comparison on the expression is case-sensitive.
    pub(crate) fn is_case_sensitive(&self, e: &Expr, scope: &Scope) -> bool {
        match e.unnested() {
            Expr::Unary {
                op: UnaryOperator::Binary,
                ..
            } => true,
            Expr::Cast {
                target: CastTarget::Binary(_),
                ..
            } => true,
            Expr::Collate { collation, .. } => !is_case_insensitive(collation),
            Expr::Literal(Literal::Hex(_) | Literal::Bit(_)) => true,
            Expr::Column(c) => scope.resolve(c).map(|r| r.binary).unwrap_or(false),
            _ => false,
        }
    }

    /// `_mysqlite_cast(expr, target, mode, row)` for storing into a column.
    pub(crate) fn cast_call(&self, sql: &str, target: &ColumnTarget, row_sql: &str, relaxed: bool, out: &mut Emit) -> Result<String> {
        let json = serde_json::to_string(target).map_err(|e| DriverError::Serialization(e.to_string()))?;
        let mode = if relaxed {
            self.session.sql_mode.relaxed()
        } else {
            self.session.sql_mode.clone()
        };
        let target = out.bind(Value::Text(json));
        let bits = out.bind(Value::Integer(mode.bits()));
        Ok(format!("_mysqlite_cast({}, {}, {}, {})", sql, target, bits, row_sql))
    }

    fn session_value(&self, value: Value, what: &str, out: &mut Emit) -> Result<String> {
        if out.inline {
            return Err(DriverError::NotSupported(format!("{} in a stored expression", what)));
        }
        Ok(out.bind(value))
    }

    pub(crate) fn exprs(&self, list: &[Expr], scope: &Scope, out: &mut Emit) -> Result<Vec<String>> {
        list.iter().map(|e| self.expr(e, scope, out)).collect()
    }

    /// Render an expression in the native dialect.
    pub(crate) fn expr(&self, e: &Expr, scope: &Scope, out: &mut Emit) -> Result<String> {
        match e {
            Expr::Column(c) => {
                if c.table.is_none() {
                    // the nearest select-list label wins over FROM columns
                    if matches!(scope.clause(), Clause::GroupBy | Clause::Having | Clause::OrderBy) {
                        if let Some(label) = scope.label(&c.column)? {
                            return Ok(label.sql);
                        }
                    }
                }
                Ok(scope.resolve(c)?.sql)
            }
            Expr::Literal(lit) => Ok(match lit {
                Literal::Null => "NULL".to_string(),
                Literal::Boolean(b) => (if *b { "1" } else { "0" }).to_string(),
                Literal::Number(n) => match number_value(n) {
                    Value::Null => out.bind(Value::text(n.clone())),
                    v => literal_sql(&v),
                },
                Literal::String(s) => out.bind(Value::text(s.clone())),
                Literal::Hex(b) => format!("X'{}'", hex(b)),
                Literal::Bit(b) => literal_sql(&bits_value(b)),
            }),
            Expr::Placeholder(i) => {
                if out.inline {
                    return Err(DriverError::NotSupported("parameter markers in a stored expression".into()));
                }
                Ok(out.bind(self.args.get(*i).cloned().unwrap_or(Value::Null)))
            }
            Expr::UserVariable(name) => {
                self.session_value(self.session.user_variable(name), "user variables", out)
            }
            Expr::SystemVariable { name, .. } => {
                let value = self.session.system_variable(name)?;
                self.session_value(value, "system variables", out)
            }
            Expr::AssignUserVariable { .. } => Err(DriverError::NotSupported(
                "user variable assignment inside expressions".into(),
            )),
            Expr::Unary { op, expr } => {
                let inner = self.expr(expr, scope, out)?;
                Ok(match op {
                    UnaryOperator::Minus => format!("(-{})", inner),
                    UnaryOperator::Plus => inner,
                    UnaryOperator::Not => format!("(NOT {})", inner),
                    UnaryOperator::BitNot => format!("(~{})", inner),
                    UnaryOperator::Binary => format!("({} COLLATE BINARY)", inner),
                })
            }
            Expr::Binary { left, op, right } => self.binary(left, *op, right, scope, out),
            Expr::IsNull { expr, negated } => {
                let inner = self.expr(expr, scope, out)?;
                Ok(format!("({} IS {}NULL)", inner, if *negated { "NOT " } else { "" }))
            }
            Expr::IsBool { expr, value, negated } => {
                let inner = self.expr(expr, scope, out)?;
                Ok(format!(
                    "({} IS {}{})",
                    inner,
                    if *negated { "NOT " } else { "" },
                    if *value { "TRUE" } else { "FALSE" }
                ))
            }
            Expr::InList { expr, list, negated } => {
                let inner = self.expr(expr, scope, out)?;
                let items = self.exprs(list, scope, out)?;
                Ok(format!(
                    "({} {}IN ({}))",
                    inner,
                    if *negated { "NOT " } else { "" },
                    items.join(", ")
                ))
            }
            Expr::InSubquery { expr, query, negated } => {
                let inner = self.expr(expr, scope, out)?;
                let sub = self.subquery(query, scope, out)?;
                Ok(format!("({} {}IN ({}))", inner, if *negated { "NOT " } else { "" }, sub))
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let inner = self.expr(expr, scope, out)?;
                let low = self.expr(low, scope, out)?;
                let high = self.expr(high, scope, out)?;
                Ok(format!(
                    "({} {}BETWEEN {} AND {})",
                    inner,
                    if *negated { "NOT " } else { "" },
                    low,
                    high
                ))
            }
            Expr::Like {
                expr,
                pattern,
                escape,
                negated,
            } => self.like(expr, pattern, escape.as_deref(), *negated, scope, out),
            Expr::Regexp { expr, pattern, negated } => {
                let binary = self.is_case_sensitive(expr, scope) || self.is_case_sensitive(pattern, scope);
                let text = self.expr(expr, scope, out)?;
                let pattern = self.expr(pattern, scope, out)?;
                let call = if binary {
                    format!("_mysqlite_regexp_bin({}, {})", pattern, text)
                } else {
                    format!("regexp({}, {})", pattern, text)
                };
                Ok(if *negated { format!("(NOT {})", call) } else { call })
            }
            Expr::Function { name, args, distinct } => self.function(name, args, *distinct, scope, out),
            Expr::Wildcard => Ok("*".to_string()),
            Expr::GroupConcat {
                distinct,
                args,
                order_by,
                separator,
            } => self.group_concat(*distinct, args, order_by, separator.as_deref(), scope, out),
            Expr::Case {
                operand,
                branches,
                else_result,
            } => {
                let mut sql = String::from("CASE");
                if let Some(operand) = operand {
                    sql.push(' ');
                    sql.push_str(&self.expr(operand, scope, out)?);
                }
                for (when, then) in branches {
                    let when = self.expr(when, scope, out)?;
                    let then = self.expr(then, scope, out)?;
                    sql.push_str(&format!(" WHEN {} THEN {}", when, then));
                }
                if let Some(else_result) = else_result {
                    sql.push_str(&format!(" ELSE {}", self.expr(else_result, scope, out)?));
                }
                sql.push_str(" END");
                Ok(sql)
            }
            Expr::Cast { expr, target } => {
                let inner = self.expr(expr, scope, out)?;
                Ok(cast_sql(&inner, target))
            }
            Expr::Interval { .. } => Err(DriverError::NotSupported("INTERVAL outside date arithmetic".into())),
            Expr::Collate { expr, collation } => {
                let inner = self.expr(expr, scope, out)?;
                let native = if is_case_insensitive(collation) { "NOCASE" } else { "BINARY" };
                Ok(format!("({} COLLATE {})", inner, native))
            }
            Expr::JsonExtract { expr, path, unquote } => {
                let inner = self.expr(expr, scope, out)?;
                let path = out.bind(Value::text(path.clone()));
                Ok(format!("({} {} {})", inner, if *unquote { "->>" } else { "->" }, path))
            }
            Expr::Subquery(query) => Ok(format!("({})", self.subquery(query, scope, out)?)),
            Expr::Exists { query, negated } => Ok(format!(
                "({}EXISTS ({}))",
                if *negated { "NOT " } else { "" },
                self.subquery(query, scope, out)?
            )),
            Expr::Nested(inner) => Ok(format!("({})", self.expr(inner, scope, out)?)),
            Expr::Tuple(items) => Ok(format!("({})", self.exprs(items, scope, out)?.join(", "))),
            Expr::Default => Err(DriverError::NotSupported("DEFAULT outside INSERT or UPDATE".into())),
            Expr::InsertedValue(column) => {
                if !scope.upsert {
                    return Ok("NULL".to_string());
                }
                Ok(format!("excluded.{}", crate::catalog::quote_native(column)))
            }
        }
    }

    fn binary(&self, left: &Expr, op: BinaryOperator, right: &Expr, scope: &Scope, out: &mut Emit) -> Result<String> {
        // Date arithmetic: d + INTERVAL n unit, INTERVAL n unit + d, d - INTERVAL n unit
        if matches!(op, BinaryOperator::Add | BinaryOperator::Sub) {
            let interval = |e: &Expr| match e.unnested() {
                Expr::Interval { value, unit } => Some((value.clone(), unit.clone())),
                _ => None,
            };
            if let Some((value, unit)) = interval(right) {
                return self.date_add(left, &value, &unit, op == BinaryOperator::Sub, scope, out);
            }
            if let (BinaryOperator::Add, Some((value, unit))) = (op, interval(left)) {
                return self.date_add(right, &value, &unit, false, scope, out);
            }
        }

        let (l, r) = if op.is_comparison() {
            (
                self.comparison_operand(left, right, scope, out)?,
                self.comparison_operand(right, left, scope, out)?,
            )
        } else {
            (self.expr(left, scope, out)?, self.expr(right, scope, out)?)
        };
        Ok(match op {
            BinaryOperator::Or => format!("({} OR {})", l, r),
            BinaryOperator::And => format!("({} AND {})", l, r),
            BinaryOperator::Xor => format!("((({}) <> 0) <> (({}) <> 0))", l, r),
            BinaryOperator::NullSafeEq => format!("({} IS {})", l, r),
            BinaryOperator::Eq => format!("({} = {})", l, r),
            BinaryOperator::Ne => format!("({} <> {})", l, r),
            BinaryOperator::Lt => format!("({} < {})", l, r),
            BinaryOperator::Le => format!("({} <= {})", l, r),
            BinaryOperator::Gt => format!("({} > {})", l, r),
            BinaryOperator::Ge => format!("({} >= {})", l, r),
            BinaryOperator::BitOr => format!("({} | {})", l, r),
            BinaryOperator::BitAnd => format!("({} & {})", l, r),
            BinaryOperator::BitXor => format!("(({} | {}) - ({} & {}))", l, r, l, r),
            BinaryOperator::ShiftLeft => format!("({} << {})", l, r),
            BinaryOperator::ShiftRight => format!("({} >> {})", l, r),
            BinaryOperator::Add => format!("({} + {})", l, r),
            BinaryOperator::Sub => format!("({} - {})", l, r),
            BinaryOperator::Mul => format!("({} * {})", l, r),
            BinaryOperator::Div => format!("(CAST({} AS REAL) / {})", l, r),
            BinaryOperator::IntDiv => format!("CAST(({}) / ({}) AS INTEGER)", l, r),
            BinaryOperator::Mod => format!("({} % {})", l, r),
        })
    }

    /// One side of a comparison. A string literal against a numeric operand
    /// compares as its numeric prefix; an unsigned literal against a BIGINT
    /// UNSIGNED column compares in the stored bit pattern.
    fn comparison_operand(&self, e: &Expr, other: &Expr, scope: &Scope, out: &mut Emit) -> Result<String> {
        let literal = match e.unnested() {
            Expr::Literal(Literal::String(s)) => Some(Value::text(s.clone())),
            Expr::Literal(Literal::Number(_)) | Expr::Unary { .. } => self.literal_value(e),
            _ => None,
        };
        match literal {
            Some(Value::Text(s)) if self.is_numeric_operand(other, scope) => {
                let prefix = numeric_prefix(&s).0;
                Ok(match number_value(prefix) {
                    Value::Null => "0".to_string(),
                    v => literal_sql(&v),
                })
            }
            Some(Value::Unsigned(u)) if expr_type(other, scope).is_some_and(|t| t.is_unsigned_bigint()) => {
                Ok((u as i64).to_string())
            }
            _ => self.expr(e, scope, out),
        }
    }

    fn is_numeric_operand(&self, e: &Expr, scope: &Scope) -> bool {
        match e.unnested() {
            Expr::Literal(Literal::Number(_)) => true,
            Expr::Literal(_) => false,
            _ => expr_type(e, scope).is_some_and(|t| t.is_numeric()),
        }
    }

    fn date_add(&self, date: &Expr, amount: &Expr, unit: &str, subtract: bool, scope: &Scope, out: &mut Emit) -> Result<String> {
        let date = self.expr(date, scope, out)?;
        let amount = self.expr(amount, scope, out)?;
        let amount = if subtract { format!("(-{})", amount) } else { amount };
        let unit = out.bind(Value::text(unit.to_ascii_uppercase()));
        Ok(format!("_mysqlite_date_add({}, {}, {})", date, amount, unit))
    }

    fn like(
        &self,
        expr: &Expr,
        pattern: &Expr,
        escape: Option<&Expr>,
        negated: bool,
        scope: &Scope,
        out: &mut Emit,
    ) -> Result<String> {
        let binary = self.is_case_sensitive(expr, scope) || self.is_case_sensitive(pattern, scope);
        let text = self.expr(expr, scope, out)?;
        let pattern = self.expr(pattern, scope, out)?;
        let not = if negated { "NOT " } else { "" };
        let escape = match escape {
            Some(e) => Some(self.expr(e, scope, out)?),
            None if self.no_backslash_escapes(out) => None,
            None => Some("'\\'".to_string()),
        };
        if binary {
            return Ok(format!(
                "({}_mysqlite_like({}, {}, {}, 0))",
                not,
                text,
                pattern,
                escape.as_deref().unwrap_or("NULL")
            ));
        }
        Ok(match escape {
            Some(esc) => format!("({} {}LIKE {} ESCAPE {})", text, not, pattern, esc),
            None => format!("({} {}LIKE {})", text, not, pattern),
        })
    }

    fn group_concat(
        &self,
        distinct: bool,
        args: &[Expr],
        order_by: &[OrderByExpr],
        separator: Option<&str>,
        scope: &Scope,
        out: &mut Emit,
    ) -> Result<String> {
        let parts = self.exprs(args, scope, out)?;
        let value = if parts.len() == 1 {
            parts[0].clone()
        } else {
            format!("({})", parts.join(" || "))
        };
        let separator = separator.unwrap_or(",");
        let mut order = Vec::new();
        for item in order_by {
            let sql = self.expr(&item.expr, scope, out)?;
            order.push(format!("{}{}", sql, if item.asc { "" } else { " DESC" }));
        }
        let order = if order.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", order.join(", "))
        };
        if distinct {
            // The native aggregate only takes DISTINCT with its default separator
            if separator != "," {
                return Err(DriverError::NotSupported("GROUP_CONCAT(DISTINCT ... SEPARATOR)".into()));
            }
            return Ok(format!("group_concat(DISTINCT {}{})", value, order));
        }
        let separator = out.bind(Value::text(separator));
        Ok(format!("group_concat({}, {}{})", value, separator, order))
    }

    fn arg<'e>(&self, name: &str, args: &'e [Expr], i: usize) -> Result<&'e Expr> {
        args.get(i).ok_or_else(|| {
            DriverError::Parse(crate::error::ParseError::syntax(
                format!("Incorrect parameter count in the call to native function '{}'", name),
                1,
                0,
            ))
        })
    }

    fn unit_arg(&self, name: &str, args: &[Expr]) -> Result<String> {
        match self.arg(name, args, 0)? {
            Expr::Literal(Literal::String(unit)) => Ok(unit.to_ascii_uppercase()),
            _ => Err(DriverError::NotSupported(format!("{} without a unit", name))),
        }
    }

    fn fsp_arg(&self, args: &[Expr]) -> u32 {
        args.first()
            .and_then(|a| self.literal_value(a))
            .and_then(|v| v.as_f64())
            .map(|f| f.clamp(0.0, 6.0) as u32)
            .unwrap_or(0)
    }

    fn function(&self, name: &str, args: &[Expr], distinct: bool, scope: &Scope, out: &mut Emit) -> Result<String> {
        let mut render = |i: usize| -> Result<String> {
            let e = self.arg(name, args, i)?;
            self.expr(e, scope, out)
        };
        let strftime_int = |field: &str, x: String| format!("CAST(strftime('{}', {}) AS INTEGER)", field, x);

        let sql = match name {
            // Session and clock values, fixed for the statement
            "NOW" | "SYSDATE" | "UTC_TIMESTAMP" => {
                let fsp = self.fsp_arg(args);
                return self.session_value(Value::text(self.now.format_datetime(fsp)), "NOW()", out);
            }
            "CURDATE" | "UTC_DATE" => {
                return self.session_value(Value::text(self.now.format_date()), "CURDATE()", out);
            }
            "CURTIME" | "UTC_TIME" => {
                let now = &self.now;
                let time = format!("{:02}:{:02}:{:02}", now.hour, now.minute, now.second);
                return self.session_value(Value::text(time), "CURTIME()", out);
            }
            "UNIX_TIMESTAMP" if args.is_empty() => {
                return self.session_value(Value::Integer(self.now.unix_seconds()), "UNIX_TIMESTAMP()", out);
            }
            "LAST_INSERT_ID" if args.is_empty() => {
                return self.session_value(Value::Unsigned(self.session.last_insert_id), "LAST_INSERT_ID()", out);
            }
            "LAST_INSERT_ID" => return Err(DriverError::NotSupported("LAST_INSERT_ID(expr)".into())),
            "FOUND_ROWS" => {
                return self.session_value(Value::Unsigned(self.session.found_rows), "FOUND_ROWS()", out);
            }
            "ROW_COUNT" => {
                return self.session_value(Value::Integer(self.session.last_row_count), "ROW_COUNT()", out);
            }
            "DATABASE" | "SCHEMA" => {
                let db = self.session.current_database.clone();
                return self.session_value(Value::from(db), "DATABASE()", out);
            }
            "VERSION" => {
                let version = self.session.system_variable("version")?;
                return self.session_value(version, "VERSION()", out);
            }
            "USER" | "CURRENT_USER" | "SESSION_USER" | "SYSTEM_USER" => {
                return self.session_value(Value::text(super::SESSION_USER), "USER()", out);
            }
            "CONNECTION_ID" => {
                return self.session_value(Value::Unsigned(self.session.connection_id), "CONNECTION_ID()", out);
            }

            // Dates
            "UNIX_TIMESTAMP" => format!("CAST(strftime('%s', {}) AS INTEGER)", render(0)?),
            "FROM_UNIXTIME" => {
                let date = format!("datetime({}, 'unixepoch')", render(0)?);
                if args.len() > 1 {
                    format!("_mysqlite_date_format({}, {})", date, render(1)?)
                } else {
                    date
                }
            }
            "DATE" => format!("date({})", render(0)?),
            "TIME" => format!("time({})", render(0)?),
            "YEAR" | "MONTH" | "DAY" | "DAYOFMONTH" | "HOUR" | "MINUTE" | "SECOND" | "DAYOFYEAR" => {
                let field = strftime_field(name).unwrap_or("%Y");
                strftime_int(field, render(0)?)
            }
            "DAYOFWEEK" => format!("({} + 1)", strftime_int("%w", render(0)?)),
            "WEEKDAY" => format!("(({} + 6) % 7)", strftime_int("%w", render(0)?)),
            "QUARTER" => format!("(({} + 2) / 3)", strftime_int("%m", render(0)?)),
            "EXTRACT" => {
                let unit = self.unit_arg(name, args)?;
                let x = render(1)?;
                match unit.as_str() {
                    "QUARTER" => format!("(({} + 2) / 3)", strftime_int("%m", x)),
                    other => match strftime_field(other) {
                        Some(field) => strftime_int(field, x),
                        None => return Err(DriverError::NotSupported(format!("EXTRACT({} FROM ...)", other))),
                    },
                }
            }
            "DATE_ADD" | "ADDDATE" | "DATE_SUB" | "SUBDATE" => {
                let subtract = matches!(name, "DATE_SUB" | "SUBDATE");
                let date = self.arg(name, args, 0)?;
                match self.arg(name, args, 1)?.unnested() {
                    Expr::Interval { value, unit } => {
                        return self.date_add(date, value, unit, subtract, scope, out);
                    }
                    days => return self.date_add(date, days, "DAY", subtract, scope, out),
                }
            }
            "TIMESTAMPADD" => {
                let unit = self.unit_arg(name, args)?;
                let amount = self.arg(name, args, 1)?;
                let date = self.arg(name, args, 2)?;
                return self.date_add(date, amount, &unit, false, scope, out);
            }
            "TIMESTAMPDIFF" => {
                let unit = self.unit_arg(name, args)?;
                let Some(seconds) = unit_seconds(&unit) else {
                    return Err(DriverError::NotSupported(format!("TIMESTAMPDIFF({}, ...)", unit)));
                };
                let from = render(1)?;
                let to = render(2)?;
                format!(
                    "CAST((strftime('%s', {}) - strftime('%s', {})) / {} AS INTEGER)",
                    to, from, seconds
                )
            }
            "DATEDIFF" => format!(
                "CAST(julianday(date({})) - julianday(date({})) AS INTEGER)",
                render(0)?,
                render(1)?
            ),
            "DATE_FORMAT" => format!("_mysqlite_date_format({}, {})", render(0)?, render(1)?),

            // Strings
            "CONCAT" => {
                self.arg(name, args, 0)?;
                let parts = self.exprs(args, scope, out)?;
                if parts.len() == 1 {
                    format!("({} || '')", parts[0])
                } else {
                    format!("({})", parts.join(" || "))
                }
            }
            "CONCAT_WS" => format!("_mysqlite_concat_ws({})", self.exprs(args, scope, out)?.join(", ")),
            "IF" => format!("CASE WHEN {} THEN {} ELSE {} END", render(0)?, render(1)?, render(2)?),
            "IFNULL" => format!("ifnull({}, {})", render(0)?, render(1)?),
            "NULLIF" => format!("nullif({}, {})", render(0)?, render(1)?),
            "ISNULL" => format!("({} IS NULL)", render(0)?),
            "COALESCE" => format!("coalesce({})", self.exprs(args, scope, out)?.join(", ")),
            "LENGTH" | "OCTET_LENGTH" => format!("length(CAST({} AS BLOB))", render(0)?),
            "CHAR_LENGTH" | "CHARACTER_LENGTH" => format!("length({})", render(0)?),
            "SUBSTRING" => {
                let s = render(0)?;
                let pos = self.arg(name, args, 1)?;
                let positive = matches!(self.literal_value(pos), Some(Value::Integer(p)) if p > 0);
                let p = self.expr(pos, scope, out)?;
                let call = if args.len() > 2 {
                    let len = self.expr(&args[2], scope, out)?;
                    format!("substr({}, {}, {})", s, p, len)
                } else {
                    format!("substr({}, {})", s, p)
                };
                if positive {
                    call
                } else {
                    format!("CASE WHEN {} = 0 THEN '' ELSE {} END", p, call)
                }
            }
            "LEFT" => format!("substr({}, 1, {})", render(0)?, render(1)?),
            "RIGHT" => {
                let s = render(0)?;
                let n = render(1)?;
                format!("CASE WHEN {n} <= 0 THEN '' ELSE substr({s}, -({n})) END")
            }
            "LOCATE" => {
                let needle = render(0)?;
                let haystack = render(1)?;
                if args.len() > 2 {
                    let pos = render(2)?;
                    format!(
                        "CASE WHEN {pos} < 1 THEN 0 WHEN instr(substr({h}, {pos}), {n}) = 0 THEN 0 \
                         ELSE instr(substr({h}, {pos}), {n}) + {pos} - 1 END",
                        pos = pos,
                        h = haystack,
                        n = needle
                    )
                } else {
                    format!("instr({}, {})", haystack, needle)
                }
            }
            "INSTR" => format!("instr({}, {})", render(0)?, render(1)?),
            "UPPER" | "UCASE" => format!("upper({})", render(0)?),
            "LOWER" | "LCASE" => format!("lower({})", render(0)?),
            "TRIM" | "LTRIM" | "RTRIM" => {
                let target = render(0)?;
                let remove = if args.len() > 1 { render(1)? } else { "' '".to_string() };
                format!("{}({}, {})", name.to_ascii_lowercase(), target, remove)
            }
            "REPLACE" => format!("replace({}, {}, {})", render(0)?, render(1)?, render(2)?),
            "HEX" => format!("hex({})", render(0)?),
            "UNHEX" => format!("unhex({})", render(0)?),
            "ASCII" | "ORD" => format!("unicode({})", render(0)?),
            "CHAR" => format!("char({})", self.exprs(args, scope, out)?.join(", ")),

            // Numbers
            "FLOOR" => {
                let x = render(0)?;
                format!("(CAST({x} AS INTEGER) - ({x} < CAST({x} AS INTEGER)))", x = x)
            }
            "CEIL" | "CEILING" => {
                let x = render(0)?;
                format!("(CAST({x} AS INTEGER) + ({x} > CAST({x} AS INTEGER)))", x = x)
            }
            "ROUND" => {
                if args.len() > 1 {
                    format!("round({}, {})", render(0)?, render(1)?)
                } else {
                    format!("round({})", render(0)?)
                }
            }
            "MOD" => format!("({} % {})", render(0)?, render(1)?),
            "RAND" => "((random() & 9223372036854775807) / 9223372036854775808.0)".to_string(),
            "GREATEST" => format!("max({})", self.exprs(args, scope, out)?.join(", ")),
            "LEAST" => format!("min({})", self.exprs(args, scope, out)?.join(", ")),

            // Aggregates
            "COUNT" if distinct && args.len() > 1 => {
                return Err(DriverError::NotSupported("COUNT(DISTINCT) over several expressions".into()));
            }
            "COUNT" | "SUM" | "AVG" | "MIN" | "MAX" => format!(
                "{}({}{})",
                name.to_ascii_lowercase(),
                if distinct { "DISTINCT " } else { "" },
                self.exprs(args, scope, out)?.join(", ")
            ),

            // JSON
            "JSON_EXTRACT" => format!("json_extract({})", self.exprs(args, scope, out)?.join(", ")),
            "JSON_UNQUOTE" => {
                let x = render(0)?;
                format!(
                    "CASE WHEN json_valid({x}) AND json_type({x}) = 'text' THEN json_extract({x}, '$') ELSE {x} END",
                    x = x
                )
            }
            "JSON_ARRAYAGG" => format!("json_group_array({})", render(0)?),
            "JSON_OBJECTAGG" => format!("json_group_object({}, {})", render(0)?, render(1)?),
            "JSON_LENGTH" => format!("json_array_length({})", self.exprs(args, scope, out)?.join(", ")),
            "JSON_TYPE" => format!("upper(json_type({}))", render(0)?),

            // Same name and meaning natively
            _ => format!(
                "{}({}{})",
                name.to_ascii_lowercase(),
                if distinct { "DISTINCT " } else { "" },
                self.exprs(args, scope, out)?.join(", ")
            ),
        };
        Ok(sql)
    }
}

/// Native rendering of `CAST(x AS target)`.
fn cast_sql(inner: &str, target: &CastTarget) -> String {
    match target {
        CastTarget::Signed | CastTarget::Unsigned => format!("CAST({} AS INTEGER)", inner),
        CastTarget::Char(None) => format!("CAST({} AS TEXT)", inner),
        CastTarget::Char(Some(n)) => format!("substr(CAST({} AS TEXT), 1, {})", inner, n),
        CastTarget::Binary(None) => format!("CAST({} AS BLOB)", inner),
        CastTarget::Binary(Some(n)) => format!("substr(CAST({} AS BLOB), 1, {})", inner, n),
        CastTarget::Decimal(_, scale) => format!("round(CAST({} AS REAL), {})", inner, scale.unwrap_or(0)),
        CastTarget::Double => format!("CAST({} AS REAL)", inner),
        CastTarget::Date => format!("date({})", inner),
        CastTarget::DateTime(Some(fsp)) if *fsp > 0 => format!("strftime('%Y-%m-%d %H:%M:%f', {})", inner),
        CastTarget::DateTime(_) => format!("datetime({})", inner),
        CastTarget::Time(_) => format!("time({})", inner),
        CastTarget::Json => format!("json({})", inner),
    }
}

/// Declared type a cast produces, for result formatting.
pub(crate) fn cast_type(target: &CastTarget) -> Option<DataType> {
    match target {
        CastTarget::Signed => DataType::from_parts("bigint", &[], Vec::new()),
        CastTarget::Unsigned => Some(DataType::bigint_unsigned()),
        CastTarget::Decimal(p, s) => DataType::from_parts("decimal", &[p.unwrap_or(10), s.unwrap_or(0)], Vec::new()),
        CastTarget::Date => DataType::from_parts("date", &[], Vec::new()),
        CastTarget::DateTime(fsp) => DataType::from_parts("datetime", &fsp.map(|f| vec![f]).unwrap_or_default(), Vec::new()),
        CastTarget::Time(fsp) => DataType::from_parts("time", &fsp.map(|f| vec![f]).unwrap_or_default(), Vec::new()),
        CastTarget::Json => DataType::from_parts("json", &[], Vec::new()),
        _ => None,
    }
}

/// Declared type of a select-list expression, when it has one.
pub(crate) fn expr_type(e: &Expr, scope: &Scope) -> Option<DataType> {
    match e.unnested() {
        Expr::Column(c) => scope.resolve(c).ok()?.data_type,
        Expr::Cast { target, .. } => cast_type(target),
        Expr::Function { name, args, .. } => match name.as_str() {
            "MIN" | "MAX" => args.first().and_then(|a| expr_type(a, scope)),
            "COUNT" => DataType::from_parts("bigint", &[], Vec::new()),
            "SUM" => match args.first().and_then(|a| expr_type(a, scope)) {
                Some(t) if t.family() == TypeFamily::Decimal => Some(t),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::DriverConfig;
    use crate::session::Session;
    use crate::sql::{parse_expression, LexerOptions};

    fn render_with(session: &Session, text: &str) -> (String, Vec<Value>) {
        let catalog = Catalog::new("app", "utf8mb4", "utf8mb4_0900_ai_ci");
        let compiler = Compiler::new(&catalog, session, &[]);
        let expr = parse_expression(text, session.lexer_options()).unwrap();
        let scope = Scope::new(None);
        let mut out = Emit::default();
        let sql = compiler.expr(&expr, &scope, &mut out).unwrap();
        (sql, out.params)
    }

    fn render(text: &str) -> (String, Vec<Value>) {
        let session = Session::new(&DriverConfig::in_memory("app"), 1).unwrap();
        render_with(&session, text)
    }

    #[test]
    fn test_operators() {
        assert_eq!(render("1 <=> NULL").0, "(1 IS NULL)");
        assert_eq!(render("7 DIV 2").0, "CAST((7) / (2) AS INTEGER)");
        assert_eq!(render("7 / 2").0, "(CAST(7 AS REAL) / 2)");
        assert_eq!(render("1 XOR 0").0, "(((1) <> 0) <> ((0) <> 0))");
        assert_eq!(render("NOT 1").0, "(NOT 1)");
    }

    #[test]
    fn test_string_compared_with_number_uses_numeric_prefix() {
        assert_eq!(render("1 = '1abc'").0, "(1 = 1)");
        assert_eq!(render("'abc' < 2").0, "(0 < 2)");
        assert_eq!(render("'2.5x' >= 2").0, "(2.5 >= 2)");
        let (sql, params) = render("'1' = '1abc'");
        assert_eq!(sql, "(?1 = ?2)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_strings_are_bound() {
        let (sql, params) = render("CONCAT('a', 'b')");
        assert_eq!(sql, "(?1 || ?2)");
        assert_eq!(params, vec![Value::text("a"), Value::text("b")]);
    }

    #[test]
    fn test_like_escape_follows_sql_mode() {
        let (sql, params) = render("'10%' LIKE '10\\%'");
        assert_eq!(sql, "(?1 LIKE ?2 ESCAPE '\\')");
        assert_eq!(params[1], Value::text("10\\%"));

        let mut session = Session::new(&DriverConfig::in_memory("app"), 1).unwrap();
        session
            .set_system_variable("sql_mode", &Value::text("NO_BACKSLASH_ESCAPES"))
            .unwrap();
        let (sql, params) = render_with(&session, "'a\\b' LIKE 'a\\b'");
        assert_eq!(sql, "(?1 LIKE ?2)");
        assert_eq!(params[1], Value::text("a\\b"));
    }

    #[test]
    fn test_binary_like_uses_helper() {
        let (sql, _) = render("BINARY 'abc' LIKE 'A%'");
        assert_eq!(sql, "(_mysqlite_like((?1 COLLATE BINARY), ?2, '\\', 0))");
    }

    #[test]
    fn test_date_arithmetic() {
        let (sql, params) = render("'2024-01-31' + INTERVAL 1 MONTH");
        assert_eq!(sql, "_mysqlite_date_add(?1, 1, ?2)");
        assert_eq!(params[1], Value::text("MONTH"));
        let (sql, _) = render("DATE_SUB('2024-01-31', INTERVAL 2 DAY)");
        assert_eq!(sql, "_mysqlite_date_add(?1, (-2), ?2)");
    }

    #[test]
    fn test_session_functions_bound() {
        let (sql, params) = render("DATABASE()");
        assert_eq!(sql, "?1");
        assert_eq!(params, vec![Value::text("app")]);
    }

    #[test]
    fn test_literal_values() {
        let session = Session::new(&DriverConfig::in_memory("app"), 1).unwrap();
        let catalog = Catalog::new("app", "utf8mb4", "utf8mb4_0900_ai_ci");
        let args = [Value::text("x")];
        let compiler = Compiler::new(&catalog, &session, &args);
        let parse = |t: &str| parse_expression(t, LexerOptions::default()).unwrap();
        assert_eq!(compiler.literal_value(&parse("-5")), Some(Value::Integer(-5)));
        assert_eq!(compiler.literal_value(&parse("2.5")), Some(Value::Float(2.5)));
        assert_eq!(compiler.literal_value(&parse("TRUE")), Some(Value::Integer(1)));
        assert_eq!(compiler.literal_value(&parse("?")), Some(Value::text("x")));
        assert_eq!(compiler.literal_value(&parse("18446744073709551615")), Some(Value::Unsigned(u64::MAX)));
        assert_eq!(compiler.literal_value(&parse("a + 1")), None);
    }

    #[test]
    fn test_inline_literals() {
        assert_eq!(literal_sql(&Value::text("it's")), "'it''s'");
        assert_eq!(literal_sql(&Value::Float(2.0)), "2.0");
        assert_eq!(literal_sql(&Value::Bytes(vec![0xab, 1])), "X'AB01'");
    }
}
