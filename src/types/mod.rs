//! Value and type model shared by every driver component

mod data_type;
pub mod temporal;

pub use data_type::{DataType, TypeKind};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tagged value flowing between parser, caster, engine and formatter.
///
/// Booleans are integers, as in the emulated dialect. Temporal values travel
/// as canonical text; the declared column type says how to read them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    /// Integers above `i64::MAX` (BIGINT UNSIGNED)
    Unsigned(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn from_bool(b: bool) -> Self {
        Value::Integer(b as i64)
    }

    /// Text form used for messages and string contexts. `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Unsigned(u) => Some(u.to_string()),
            Value::Float(f) => Some(format_float(*f)),
            Value::Text(s) => Some(s.clone()),
            Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Truthiness in a boolean context (NULL is neither, reported as `None`).
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(*i != 0),
            Value::Unsigned(u) => Some(*u != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Text(s) => Some(temporal::leading_number(s).0 != 0.0),
            Value::Bytes(b) => Some(temporal::leading_number(&String::from_utf8_lossy(b)).0 != 0.0),
        }
    }

    /// Numeric view of a value, used by casts and engine functions.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(*i as f64),
            Value::Unsigned(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => Some(temporal::leading_number(s).0),
            Value::Bytes(b) => Some(temporal::leading_number(&String::from_utf8_lossy(b)).0),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Unsigned(_) | Value::Float(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "NULL"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Coercion family of a declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeFamily {
    Integer,
    Decimal,
    Float,
    String,
    Binary,
    Date,
    Time,
    DateTime,
    Timestamp,
    Year,
    Enum,
    Set,
    Bit,
    Json,
    Geometry,
}

impl TypeFamily {
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            TypeFamily::Date
                | TypeFamily::Time
                | TypeFamily::DateTime
                | TypeFamily::Timestamp
                | TypeFamily::Year
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeFamily::Integer | TypeFamily::Decimal | TypeFamily::Float | TypeFamily::Bit
        )
    }
}

/// Shortest round-trip rendering, the way MySQL prints DOUBLE values.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if f == f.trunc() && f.abs() < 1e15 {
        return format!("{}", f as i64);
    }
    let abs = f.abs();
    if !(1e-5..1e15).contains(&abs) {
        return format!("{:e}", f);
    }
    format!("{}", f)
}
