//! Integer, DECIMAL, FLOAT/DOUBLE, BIT and YEAR conversions

use super::{as_text, lossy, CastContext, CastResult, StoredValue};
use crate::error::CastError;
use crate::session::SqlMode;
use crate::types::temporal::numeric_prefix;
use crate::types::{DataType, TypeKind, Value};

/// Numeric reading of an arbitrary value.
enum Numeric {
    Int(i128),
    Real(f64),
}

impl Numeric {
    fn as_f64(&self) -> f64 {
        match self {
            Numeric::Int(i) => *i as f64,
            Numeric::Real(f) => *f,
        }
    }

    /// Round half away from zero, the way integer columns take fractions.
    fn as_i128(&self) -> i128 {
        match self {
            Numeric::Int(i) => *i,
            Numeric::Real(f) => f.round() as i128,
        }
    }
}

/// Read a value in numeric context, reporting text that was not entirely a number.
fn read_numeric(value: &Value, type_name: &'static str, ctx: CastContext<'_>) -> (Numeric, Option<CastError>) {
    match value {
        Value::Integer(i) => (Numeric::Int(*i as i128), None),
        Value::Unsigned(u) => (Numeric::Int(*u as i128), None),
        Value::Float(f) => (Numeric::Real(*f), None),
        Value::Null => (Numeric::Int(0), None),
        Value::Text(_) | Value::Bytes(_) => {
            let text = as_text(value);
            let (prefix, complete) = numeric_prefix(&text);
            let number = if prefix.is_empty() {
                Numeric::Int(0)
            } else if prefix.contains(['.', 'e', 'E']) {
                Numeric::Real(prefix.parse().unwrap_or(0.0))
            } else {
                match prefix.parse::<i128>() {
                    Ok(i) => Numeric::Int(i),
                    Err(_) => Numeric::Real(prefix.parse().unwrap_or(0.0)),
                }
            };
            let problem = if prefix.is_empty() {
                Some(CastError::IncorrectValue {
                    type_name,
                    value: text.clone(),
                    column: ctx.column.to_string(),
                    row: ctx.row,
                })
            } else if !complete {
                Some(CastError::Truncated {
                    column: ctx.column.to_string(),
                    row: ctx.row,
                })
            } else {
                None
            };
            (number, problem)
        }
    }
}

fn out_of_range(ctx: CastContext<'_>) -> CastError {
    CastError::OutOfRange {
        column: ctx.column.to_string(),
        row: ctx.row,
    }
}

fn integer_value(n: i128) -> Value {
    if let Ok(i) = i64::try_from(n) {
        Value::Integer(i)
    } else if let Ok(u) = u64::try_from(n) {
        Value::Unsigned(u)
    } else {
        Value::Float(n as f64)
    }
}

/// Apply a parse problem first, then the range outcome.
fn finish(mode: &SqlMode, problem: Option<CastError>, outcome: CastResult) -> CastResult {
    match problem {
        None => outcome,
        Some(err) => {
            let fallback = match outcome {
                Ok(stored) => stored.value,
                Err(_) if !mode.is_strict() => Value::Integer(0),
                Err(e) => return Err(e),
            };
            lossy(mode, err, fallback)
        }
    }
}

pub(super) fn store_integer(value: &Value, ty: &DataType, mode: &SqlMode, ctx: CastContext<'_>) -> CastResult {
    let (number, problem) = read_numeric(value, "integer", ctx);
    let n = number.as_i128();
    let (lo, hi) = ty.integer_range();
    let outcome = if n < lo || n > hi {
        lossy(mode, out_of_range(ctx), integer_value(n.clamp(lo, hi)))
    } else {
        Ok(StoredValue::clean(integer_value(n)))
    };
    finish(mode, problem, outcome)
}

fn round_to(x: f64, scale: u32) -> f64 {
    let factor = 10f64.powi(scale as i32);
    (x * factor).round() / factor
}

/// Largest magnitude of a (precision, scale) column: all nines.
fn decimal_max(precision: u32, scale: u32) -> f64 {
    let int_digits = "9".repeat(precision.saturating_sub(scale) as usize);
    let frac_digits = "9".repeat(scale as usize);
    format!("{}.{}", if int_digits.is_empty() { "0" } else { &int_digits }, frac_digits)
        .trim_end_matches('.')
        .parse()
        .unwrap_or(0.0)
}

/// Decimal digits of a value as written, so rounding happens on the decimal
/// text rather than on its binary approximation.
fn decimal_repr(value: &Value) -> String {
    match value {
        Value::Float(f) => format!("{}", f),
        Value::Text(_) | Value::Bytes(_) => numeric_prefix(&as_text(value)).0.to_string(),
        other => as_text(other),
    }
}

/// Round half away from zero at `scale` fractional digits.
fn round_decimal(repr: &str, scale: u32) -> f64 {
    let trimmed = repr.trim_start_matches('+');
    if trimmed.contains(['e', 'E']) || !trimmed.contains('.') {
        return round_to(trimmed.parse().unwrap_or(0.0), scale);
    }
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let keep = scale as usize;
    if frac_part.len() <= keep {
        return trimmed.parse().unwrap_or(0.0);
    }
    let mut kept: Vec<u8> = format!("{}{}", if int_part.is_empty() { "0" } else { int_part }, &frac_part[..keep])
        .into_bytes();
    if frac_part.as_bytes()[keep] >= b'5' {
        let mut i = kept.len();
        loop {
            if i == 0 {
                kept.insert(0, b'1');
                break;
            }
            i -= 1;
            if kept[i] == b'9' {
                kept[i] = b'0';
            } else {
                kept[i] += 1;
                break;
            }
        }
    }
    let split = kept.len() - keep;
    let text = String::from_utf8_lossy(&kept).into_owned();
    let rounded = format!("{}.{}", &text[..split], &text[split..]);
    let x: f64 = rounded.trim_end_matches('.').parse().unwrap_or(0.0);
    if negative {
        -x
    } else {
        x
    }
}

pub(super) fn store_decimal(value: &Value, ty: &DataType, mode: &SqlMode, ctx: CastContext<'_>) -> CastResult {
    let (number, problem) = read_numeric(value, "decimal", ctx);
    let precision = ty.precision.unwrap_or(10);
    let scale = ty.scale.unwrap_or(0);
    let x = match number {
        Numeric::Int(i) => i as f64,
        Numeric::Real(_) => round_decimal(&decimal_repr(value), scale),
    };
    let max = decimal_max(precision, scale);
    let outcome = if ty.unsigned && x < 0.0 {
        lossy(mode, out_of_range(ctx), Value::Float(0.0))
    } else if x.abs() > max {
        lossy(mode, out_of_range(ctx), Value::Float(max.copysign(x)))
    } else {
        Ok(StoredValue::clean(Value::Float(x)))
    };
    finish(mode, problem, outcome)
}

pub(super) fn store_float(value: &Value, ty: &DataType, mode: &SqlMode, ctx: CastContext<'_>) -> CastResult {
    let (number, problem) = read_numeric(value, "double", ctx);
    let mut x = number.as_f64();
    let mut max = if ty.kind == TypeKind::Float { f32::MAX as f64 } else { f64::MAX };
    if let (Some(m), Some(d)) = (ty.precision, ty.scale) {
        if let Numeric::Real(_) = number {
            x = round_decimal(&decimal_repr(value), d);
        }
        max = decimal_max(m, d);
    }
    let outcome = if ty.unsigned && x < 0.0 {
        lossy(mode, out_of_range(ctx), Value::Float(0.0))
    } else if !x.is_finite() || x.abs() > max {
        lossy(mode, out_of_range(ctx), Value::Float(max.copysign(x)))
    } else {
        Ok(StoredValue::clean(Value::Float(x)))
    };
    finish(mode, problem, outcome)
}

/// Strings into BIT are read as big-endian bit patterns.
pub(super) fn store_bit(value: &Value, ty: &DataType, mode: &SqlMode, ctx: CastContext<'_>) -> CastResult {
    let width = ty.length.unwrap_or(1);
    let max: u128 = (1u128 << width) - 1;
    let bits: Option<u128> = match value {
        Value::Integer(i) if *i >= 0 => Some(*i as u128),
        Value::Integer(_) => None,
        Value::Unsigned(u) => Some(*u as u128),
        Value::Float(f) if *f >= 0.0 => Some(f.round() as u128),
        Value::Float(_) => None,
        Value::Text(s) => big_endian(s.as_bytes()),
        Value::Bytes(b) => big_endian(b),
        Value::Null => Some(0),
    };
    match bits {
        Some(b) if b <= max => Ok(StoredValue::clean(Value::Integer(b as u64 as i64))),
        Some(_) => lossy(mode, out_of_range(ctx), Value::Integer(max as u64 as i64)),
        None => lossy(mode, out_of_range(ctx), Value::Integer(0)),
    }
}

fn big_endian(bytes: &[u8]) -> Option<u128> {
    if bytes.len() > 8 {
        return None;
    }
    Some(bytes.iter().fold(0u128, |acc, b| (acc << 8) | *b as u128))
}

pub(super) fn store_year(value: &Value, mode: &SqlMode, ctx: CastContext<'_>) -> CastResult {
    // '0' and '00' mean 2000, the number 0 means 0000
    let (number, problem, short_text) = match value {
        Value::Text(s) => {
            let trimmed = s.trim();
            let short = trimmed.len() <= 2 && !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit());
            let (n, p) = read_numeric(value, "integer", ctx);
            (n, p, short)
        }
        other => {
            let (n, p) = read_numeric(other, "integer", ctx);
            (n, p, false)
        }
    };
    let n = number.as_i128();
    let year = match n {
        0 if short_text => Some(2000),
        0 => Some(0),
        1..=69 => Some(2000 + n),
        70..=99 => Some(1900 + n),
        1901..=2155 => Some(n),
        _ => None,
    };
    let outcome = match year {
        Some(y) => Ok(StoredValue::clean(Value::Integer(y as i64))),
        None => lossy(mode, out_of_range(ctx), Value::Integer(0)),
    };
    finish(mode, problem, outcome)
}

pub(super) fn read_integer(stored: &Value, ty: &DataType) -> Value {
    let v = match stored {
        Value::Integer(i) if *i < 0 && ty.is_unsigned_bigint() => Value::Unsigned(*i as u64),
        Value::Integer(_) | Value::Unsigned(_) => stored.clone(),
        Value::Float(f) => integer_value(f.round() as i128),
        other => {
            let text = as_text(other);
            match numeric_prefix(&text).0.parse::<f64>() {
                Ok(f) => integer_value(f.round() as i128),
                Err(_) => Value::Integer(0),
            }
        }
    };
    if ty.zerofill {
        let width = ty.length.unwrap_or(0) as usize;
        return Value::Text(format!("{:0>width$}", as_text(&v), width = width));
    }
    v
}

fn stored_f64(stored: &Value) -> f64 {
    match stored {
        Value::Integer(i) => *i as f64,
        Value::Unsigned(u) => *u as f64,
        Value::Float(f) => *f,
        other => numeric_prefix(&as_text(other)).0.parse().unwrap_or(0.0),
    }
}

fn fixed(x: f64, scale: u32) -> String {
    let x = if x == 0.0 { 0.0 } else { x };
    format!("{:.*}", scale as usize, x)
}

pub(super) fn read_decimal(stored: &Value, ty: &DataType) -> Value {
    Value::Text(fixed(stored_f64(stored), ty.scale.unwrap_or(0)))
}

pub(super) fn read_float(stored: &Value, ty: &DataType) -> Value {
    let x = stored_f64(stored);
    if let Some(d) = ty.scale {
        return Value::Text(fixed(x, d));
    }
    if ty.kind == TypeKind::Float {
        // Single precision shows its own shortest form
        return Value::Text(format!("{}", x as f32));
    }
    Value::Float(x)
}

pub(super) fn read_bit(stored: &Value) -> Value {
    match stored {
        Value::Integer(i) if *i < 0 => Value::Unsigned(*i as u64),
        Value::Integer(_) | Value::Unsigned(_) => stored.clone(),
        other => Value::Integer(stored_f64(other) as i64),
    }
}

pub(super) fn read_year(stored: &Value) -> Value {
    match stored_f64(stored) as i64 {
        0 => Value::text("0000"),
        y => Value::Integer(y),
    }
}

#[cfg(test)]
mod tests {
    use super::super::cast_for_store;
    use super::*;

    fn strict() -> SqlMode {
        SqlMode::parse("STRICT_TRANS_TABLES").unwrap()
    }

    fn relaxed() -> SqlMode {
        SqlMode::default()
    }

    fn ty(name: &str, args: &[u32]) -> DataType {
        DataType::from_parts(name, args, Vec::new()).unwrap()
    }

    fn store(v: Value, t: &DataType, mode: &SqlMode) -> Result<StoredValue, CastError> {
        cast_for_store(&v, t, mode, CastContext::new("n", 2))
    }

    #[test]
    fn test_integer_text_prefix() {
        let int = ty("INT", &[]);
        assert_eq!(store(Value::text(" 42 "), &int, &strict()).unwrap().value, Value::Integer(42));
        assert_eq!(store(Value::text("2.5"), &int, &strict()).unwrap().value, Value::Integer(3));
        assert_eq!(store(Value::text("-2.5"), &int, &strict()).unwrap().value, Value::Integer(-3));

        let err = store(Value::text("12abc"), &int, &strict()).unwrap_err();
        assert_eq!(err, CastError::Truncated { column: "n".into(), row: 2 });
        let err = store(Value::text("abc"), &int, &strict()).unwrap_err();
        assert_eq!(err.code(), 1366);

        let stored = store(Value::text("12abc"), &int, &relaxed()).unwrap();
        assert_eq!(stored.value, Value::Integer(12));
        assert_eq!(stored.warning.map(|w| w.code()), Some(1265));
    }

    #[test]
    fn test_unsigned_bounds() {
        let mut t = ty("INT", &[]);
        t.unsigned = true;
        assert!(store(Value::Integer(-1), &t, &strict()).is_err());
        assert_eq!(store(Value::Integer(-1), &t, &relaxed()).unwrap().value, Value::Integer(0));
        let big = DataType::bigint_unsigned();
        assert_eq!(
            store(Value::text("18446744073709551615"), &big, &strict()).unwrap().value,
            Value::Unsigned(u64::MAX)
        );
    }

    #[test]
    fn test_unsigned_bigint_reads_bit_pattern() {
        let big = DataType::bigint_unsigned();
        assert_eq!(read_integer(&Value::Integer(-1), &big), Value::Unsigned(u64::MAX));
        assert_eq!(read_integer(&Value::Integer(i64::MIN), &big), Value::Unsigned(1 << 63));
        assert_eq!(read_integer(&Value::Integer(-1), &ty("BIGINT", &[])), Value::Integer(-1));
        // out-of-range reals no longer wrap to zero
        assert_eq!(read_integer(&Value::Float(1.8446744073709552e19), &big), Value::Float(1.8446744073709552e19));
        assert_eq!(integer_value(u64::MAX as i128), Value::Unsigned(u64::MAX));
    }

    #[test]
    fn test_decimal_rounding_and_range() {
        let d = ty("DECIMAL", &[5, 2]);
        assert_eq!(store(Value::text("1.005"), &d, &strict()).unwrap().value, Value::Float(1.01));
        assert_eq!(store(Value::text("-9.995"), &d, &strict()).unwrap().value, Value::Float(-10.0));
        assert_eq!(store(Value::Float(2.345), &d, &strict()).unwrap().value, Value::Float(2.35));
        assert!(store(Value::Integer(1000), &d, &strict()).is_err());
        assert_eq!(store(Value::Integer(1000), &d, &relaxed()).unwrap().value, Value::Float(999.99));
        assert_eq!(read_decimal(&Value::Float(-0.0), &d), Value::text("0.00"));
    }

    #[test]
    fn test_round_decimal_carry() {
        assert_eq!(round_decimal("99.996", 2), 100.0);
        assert_eq!(round_decimal(".5", 0), 1.0);
        assert_eq!(round_decimal("1.2", 3), 1.2);
        assert_eq!(round_decimal("-0.004", 2), -0.0);
    }

    #[test]
    fn test_float_display() {
        let f = ty("FLOAT", &[]);
        let stored = store(Value::text("1.1"), &f, &strict()).unwrap().value;
        assert_eq!(read_float(&stored, &f), Value::text("1.1"));
        let d = ty("DOUBLE", &[6, 2]);
        assert_eq!(read_float(&Value::Float(3.14159), &d), Value::text("3.14"));
    }

    #[test]
    fn test_bit_values() {
        let b = ty("BIT", &[8]);
        assert_eq!(store(Value::Integer(255), &b, &strict()).unwrap().value, Value::Integer(255));
        assert!(store(Value::Integer(256), &b, &strict()).is_err());
        assert_eq!(store(Value::Bytes(vec![0x01, 0x00]), &ty("BIT", &[16]), &strict()).unwrap().value,
            Value::Integer(256));
        assert_eq!(read_bit(&Value::Integer(-1)), Value::Unsigned(u64::MAX));
    }

    #[test]
    fn test_year_forms() {
        let y = ty("YEAR", &[]);
        assert_eq!(store(Value::Integer(24), &y, &strict()).unwrap().value, Value::Integer(2024));
        assert_eq!(store(Value::Integer(85), &y, &strict()).unwrap().value, Value::Integer(1985));
        assert_eq!(store(Value::text("0"), &y, &strict()).unwrap().value, Value::Integer(2000));
        assert_eq!(store(Value::Integer(0), &y, &strict()).unwrap().value, Value::Integer(0));
        assert!(store(Value::Integer(1800), &y, &strict()).is_err());
        assert_eq!(read_year(&Value::Integer(0)), Value::text("0000"));
    }

    #[test]
    fn test_zerofill_read() {
        let mut t = ty("INT", &[]);
        t.set_zerofill(Some(5));
        assert_eq!(read_integer(&Value::Integer(42), &t), Value::text("00042"));
    }
}
