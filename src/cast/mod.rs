//! MySQL value coercion
//!
//! `cast_for_store` turns any incoming value into what a column of the
//! declared type holds, applying the dialect's conversion rules. Under a
//! strict `sql_mode` a lossy conversion is an error; otherwise the closest
//! representable value is stored and the problem is reported as a warning.
//! `cast_for_read` renders stored values back in canonical form.
//!
//! Both functions are total: every (value, type) pair yields a value or a
//! [`CastError`], never a panic.

mod numeric;
mod temporal;
mod text;

pub use text::normalize_json;

use crate::error::CastError;
use crate::session::SqlMode;
use crate::types::{DataType, TypeFamily, TypeKind, Value};
use serde::{Deserialize, Serialize};

/// Where a value is headed, for error messages.
#[derive(Debug, Clone, Copy)]
pub struct CastContext<'a> {
    pub column: &'a str,
    /// 1-based row number within the statement
    pub row: usize,
}

impl<'a> CastContext<'a> {
    pub fn new(column: &'a str, row: usize) -> Self {
        Self { column, row }
    }
}

/// A converted value plus the warning a relaxed conversion produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    pub value: Value,
    pub warning: Option<CastError>,
}

impl StoredValue {
    pub fn clean(value: Value) -> Self {
        Self {
            value,
            warning: None,
        }
    }
}

pub(crate) type CastResult = std::result::Result<StoredValue, CastError>;

/// Strict mode fails; relaxed mode stores `fallback` and keeps the error as a warning.
pub(crate) fn lossy(mode: &SqlMode, err: CastError, fallback: Value) -> CastResult {
    if mode.is_strict() {
        Err(err)
    } else {
        Ok(StoredValue {
            value: fallback,
            warning: Some(err),
        })
    }
}

/// Column type and nullability, the unit the engine-side cast works on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTarget {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnTarget {
    /// Store into this column; NULL into NOT NULL is rejected in every mode.
    pub fn store(&self, value: &Value, mode: &SqlMode, row: usize) -> CastResult {
        if value.is_null() {
            if self.nullable {
                return Ok(StoredValue::clean(Value::Null));
            }
            return Err(CastError::NotNull {
                column: self.name.clone(),
            });
        }
        cast_for_store(value, &self.data_type, mode, CastContext::new(&self.name, row))
    }
}

/// Convert `value` for storage in a column of type `ty`. NULL passes through.
pub fn cast_for_store(value: &Value, ty: &DataType, mode: &SqlMode, ctx: CastContext<'_>) -> CastResult {
    if value.is_null() {
        return Ok(StoredValue::clean(Value::Null));
    }
    match ty.family() {
        TypeFamily::Integer => numeric::store_integer(value, ty, mode, ctx),
        TypeFamily::Decimal => numeric::store_decimal(value, ty, mode, ctx),
        TypeFamily::Float => numeric::store_float(value, ty, mode, ctx),
        TypeFamily::Bit => numeric::store_bit(value, ty, mode, ctx),
        TypeFamily::Year => numeric::store_year(value, mode, ctx),
        TypeFamily::Date | TypeFamily::DateTime | TypeFamily::Timestamp => {
            temporal::store_datetime(value, ty, mode, ctx)
        }
        TypeFamily::Time => temporal::store_time(value, ty, mode, ctx),
        TypeFamily::String => text::store_string(value, ty, mode, ctx),
        TypeFamily::Binary => text::store_binary(value, ty, mode, ctx),
        TypeFamily::Enum => text::store_enum(value, ty, mode, ctx),
        TypeFamily::Set => text::store_set(value, ty, mode, ctx),
        TypeFamily::Json => text::store_json(value, ctx),
        TypeFamily::Geometry => Ok(StoredValue::clean(value.clone())),
    }
}

/// Canonical rendering of a stored value for a column of type `ty`.
pub fn cast_for_read(stored: &Value, ty: &DataType) -> Value {
    if stored.is_null() {
        return Value::Null;
    }
    match ty.family() {
        TypeFamily::Integer => numeric::read_integer(stored, ty),
        TypeFamily::Decimal => numeric::read_decimal(stored, ty),
        TypeFamily::Float => numeric::read_float(stored, ty),
        TypeFamily::Bit => numeric::read_bit(stored),
        TypeFamily::Year => numeric::read_year(stored),
        TypeFamily::Date | TypeFamily::DateTime | TypeFamily::Timestamp => {
            temporal::read_datetime(stored, ty)
        }
        TypeFamily::Time => temporal::read_time(stored, ty),
        TypeFamily::String => text::read_string(stored, ty),
        TypeFamily::Binary => match stored {
            Value::Bytes(_) => stored.clone(),
            other => Value::Bytes(other.to_text().unwrap_or_default().into_bytes()),
        },
        TypeFamily::Json => match stored {
            Value::Text(s) => normalize_json(s).map(Value::Text).unwrap_or_else(|_| stored.clone()),
            other => other.clone(),
        },
        TypeFamily::Enum | TypeFamily::Set => Value::Text(stored.to_text().unwrap_or_default()),
        TypeFamily::Geometry => stored.clone(),
    }
}

/// Value a NOT NULL column without a default receives in relaxed mode.
pub fn implicit_default(ty: &DataType) -> Value {
    match ty.family() {
        TypeFamily::Integer | TypeFamily::Bit | TypeFamily::Year => Value::Integer(0),
        TypeFamily::Decimal | TypeFamily::Float => Value::Float(0.0),
        TypeFamily::String | TypeFamily::Set => Value::text(""),
        TypeFamily::Enum => Value::text(ty.values.first().cloned().unwrap_or_default()),
        TypeFamily::Binary => match ty.kind {
            TypeKind::Binary => Value::Bytes(vec![0; ty.length.unwrap_or(1) as usize]),
            _ => Value::Bytes(Vec::new()),
        },
        TypeFamily::Date => Value::text("0000-00-00"),
        TypeFamily::DateTime | TypeFamily::Timestamp => {
            Value::text(crate::types::temporal::DateTime::default().format_datetime(ty.fsp()))
        }
        TypeFamily::Time => Value::text(crate::types::temporal::Time::default().format(ty.fsp())),
        TypeFamily::Json => Value::text("null"),
        TypeFamily::Geometry => Value::Bytes(Vec::new()),
    }
}

/// Text view of a value for string-consuming conversions.
pub(crate) fn as_text(value: &Value) -> String {
    value.to_text().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CastError;

    fn strict() -> SqlMode {
        SqlMode::parse(crate::config::DEFAULT_SQL_MODE).unwrap()
    }

    fn relaxed() -> SqlMode {
        SqlMode::parse("").unwrap()
    }

    fn ty(name: &str, args: &[u32]) -> DataType {
        DataType::from_parts(name, args, Vec::new()).unwrap()
    }

    fn ctx() -> CastContext<'static> {
        CastContext::new("c", 1)
    }

    #[test]
    fn test_not_null_always_rejected() {
        let target = ColumnTarget {
            name: "name".into(),
            data_type: ty("VARCHAR", &[10]),
            nullable: false,
        };
        for mode in [strict(), relaxed()] {
            let err = target.store(&Value::Null, &mode, 1).unwrap_err();
            assert_eq!(err, CastError::NotNull { column: "name".into() });
        }
    }

    #[test]
    fn test_strict_versus_relaxed_integer() {
        let int = ty("TINYINT", &[]);
        let err = cast_for_store(&Value::Integer(300), &int, &strict(), ctx()).unwrap_err();
        assert!(matches!(err, CastError::OutOfRange { .. }));

        let stored = cast_for_store(&Value::Integer(300), &int, &relaxed(), ctx()).unwrap();
        assert_eq!(stored.value, Value::Integer(127));
        assert!(stored.warning.is_some());
    }

    #[test]
    fn test_cast_is_deterministic() {
        let date = ty("DATETIME", &[]);
        let a = cast_for_store(&Value::text("2024-1-2 3:4:5"), &date, &strict(), ctx()).unwrap();
        let b = cast_for_store(&Value::text("2024-1-2 3:4:5"), &date, &strict(), ctx()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.value, Value::text("2024-01-02 03:04:05"));
    }

    #[test]
    fn test_implicit_defaults() {
        assert_eq!(implicit_default(&ty("VARCHAR", &[5])), Value::text(""));
        assert_eq!(implicit_default(&ty("INT", &[])), Value::Integer(0));
        assert_eq!(implicit_default(&ty("DATETIME", &[])), Value::text("0000-00-00 00:00:00"));
        let e = DataType::from_parts("ENUM", &[], vec!["x".into(), "y".into()]).unwrap();
        assert_eq!(implicit_default(&e), Value::text("x"));
    }

    #[test]
    fn test_read_canonical_forms() {
        assert_eq!(cast_for_read(&Value::Float(2.5), &ty("DECIMAL", &[5, 2])), Value::text("2.50"));
        assert_eq!(cast_for_read(&Value::text("2024-01-02 03:04:05"), &ty("DATETIME", &[3])),
            Value::text("2024-01-02 03:04:05.000"));
        assert_eq!(cast_for_read(&Value::text("ab  "), &ty("CHAR", &[4])), Value::text("ab"));
        assert_eq!(cast_for_read(&Value::Null, &ty("INT", &[])), Value::Null);
    }
}
