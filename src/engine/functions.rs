//! Engine-side functions
//!
//! Conversions that must run per row inside the engine (casting a computed
//! value into a column, REGEXP, escaped LIKE, DATE_FORMAT) are registered as
//! scalar functions on the connection. A cast failure crosses the engine
//! boundary as a tagged error message and is decoded back into a
//! [`CastError`] by the error translation.

use crate::cache::PatternCache;
use crate::cast::ColumnTarget;
use crate::error::CastError;
use crate::session::SqlMode;
use crate::types::temporal::{self, DateTime};
use crate::types::Value;
use parking_lot::Mutex;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const CAST_TAG: &str = "_mysqlite_cast:";
const RAISE_TAG: &str = "_mysqlite_constraint:";

/// `type_name` values the caster produces; decoded names map back to these.
static TYPE_NAMES: &[&str] = &["integer", "decimal", "double", "date", "datetime", "time"];

#[derive(Serialize, Deserialize)]
struct CastWire {
    code: u16,
    column: String,
    #[serde(default)]
    row: usize,
    #[serde(default)]
    type_name: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    reason: String,
}

/// Tagged message carrying a cast failure out of an engine function.
pub fn encode_cast_error(err: &CastError) -> String {
    let mut wire = CastWire {
        code: err.code(),
        column: String::new(),
        row: 0,
        type_name: String::new(),
        value: String::new(),
        reason: String::new(),
    };
    match err {
        CastError::NotNull { column } | CastError::NoDefault { column } => {
            wire.column = column.clone();
        }
        CastError::OutOfRange { column, row }
        | CastError::Truncated { column, row }
        | CastError::TooLong { column, row } => {
            wire.column = column.clone();
            wire.row = *row;
        }
        CastError::IncorrectValue {
            type_name,
            value,
            column,
            row,
        }
        | CastError::IncorrectTemporal {
            type_name,
            value,
            column,
            row,
        } => {
            wire.type_name = type_name.to_string();
            wire.value = value.clone();
            wire.column = column.clone();
            wire.row = *row;
        }
        CastError::InvalidJson { reason, column } => {
            wire.reason = reason.clone();
            wire.column = column.clone();
        }
    }
    // serializing plain strings and integers cannot fail
    format!("{}{}", CAST_TAG, serde_json::to_string(&wire).unwrap_or_default())
}

/// Recover a cast failure from an engine error message.
pub fn decode_cast_error(message: &str) -> Option<CastError> {
    let start = message.find(CAST_TAG)? + CAST_TAG.len();
    let wire: CastWire = serde_json::from_str(&message[start..]).ok()?;
    let type_name = TYPE_NAMES
        .iter()
        .copied()
        .find(|t| *t == wire.type_name)
        .unwrap_or("integer");
    let err = match wire.code {
        1048 => CastError::NotNull { column: wire.column },
        1364 => CastError::NoDefault { column: wire.column },
        1264 => CastError::OutOfRange {
            column: wire.column,
            row: wire.row,
        },
        1265 => CastError::Truncated {
            column: wire.column,
            row: wire.row,
        },
        1406 => CastError::TooLong {
            column: wire.column,
            row: wire.row,
        },
        1366 => CastError::IncorrectValue {
            type_name,
            value: wire.value,
            column: wire.column,
            row: wire.row,
        },
        1292 => CastError::IncorrectTemporal {
            type_name,
            value: wire.value,
            column: wire.column,
            row: wire.row,
        },
        3140 => CastError::InvalidJson {
            reason: wire.reason,
            column: wire.column,
        },
        _ => return None,
    };
    Some(err)
}

/// Message for `RAISE(ABORT, ...)` in constraint-emulating triggers.
pub fn raise_message(code: u16, message: &str) -> String {
    format!("{}{}:{}", RAISE_TAG, code, message)
}

/// Inverse of [`raise_message`].
pub fn decode_raise(message: &str) -> Option<(u16, String)> {
    let rest = &message[message.find(RAISE_TAG)? + RAISE_TAG.len()..];
    let (code, text) = rest.split_once(':')?;
    Some((code.parse().ok()?, text.to_string()))
}

pub(super) fn from_value_ref(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

pub(super) fn to_sql_value(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        // read back through the BIGINT UNSIGNED column type
        Value::Unsigned(u) => SqlValue::Integer(*u as i64),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
    }
}

fn user_error(message: String) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(message.into())
}

fn text_arg(ctx: &Context<'_>, i: usize) -> Option<String> {
    from_value_ref(ctx.get_raw(i)).to_text()
}

/// Shared state the registered functions read.
#[derive(Clone)]
pub(super) struct FunctionState {
    pub foreign_key_checks: Arc<AtomicBool>,
    pub warnings: Arc<Mutex<Vec<CastError>>>,
    pub patterns: Arc<PatternCache>,
}

pub(super) fn register(conn: &Connection, state: &FunctionState) -> rusqlite::Result<()> {
    let pure = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    // _mysqlite_cast(value, target json, sql_mode bits, row)
    // A negative row is a dry run: no warnings, and a failed conversion yields NULL.
    let warnings = AssertUnwindSafe(Arc::clone(&state.warnings));
    conn.create_scalar_function("_mysqlite_cast", 4, FunctionFlags::SQLITE_UTF8, move |ctx| {
        let target = ctx.get_or_create_aux(1, |raw| -> Result<ColumnTarget, serde_json::Error> {
            serde_json::from_slice(raw.as_bytes().unwrap_or_default())
        })?;
        let value = from_value_ref(ctx.get_raw(0));
        let mode = SqlMode::from_bits(ctx.get::<i64>(2)?);
        let row = ctx.get::<i64>(3)?;
        let dry_run = row < 0;
        match target.store(&value, &mode, row.max(1) as usize) {
            Ok(stored) => {
                if let (Some(w), false) = (stored.warning, dry_run) {
                    warnings.lock().push(w);
                }
                Ok(to_sql_value(&stored.value))
            }
            Err(_) if dry_run => Ok(to_sql_value(&Value::Null)),
            Err(err) => Err(user_error(encode_cast_error(&err))),
        }
    })?;

    // X REGEXP Y calls regexp(Y, X)
    for (name, case_insensitive) in [("regexp", true), ("_mysqlite_regexp_bin", false)] {
        let patterns = AssertUnwindSafe(Arc::clone(&state.patterns));
        conn.create_scalar_function(name, 2, pure, move |ctx| {
            let (Some(pattern), Some(text)) = (text_arg(ctx, 0), text_arg(ctx, 1)) else {
                return Ok(None);
            };
            let re = patterns
                .regex(&pattern, case_insensitive)
                .map_err(|e| user_error(format!("Illegal argument to a regular expression: {}", e)))?;
            Ok(Some(re.is_match(&text) as i64))
        })?;
    }

    // _mysqlite_like(text, pattern, escape, case_insensitive)
    let patterns = AssertUnwindSafe(Arc::clone(&state.patterns));
    conn.create_scalar_function("_mysqlite_like", 4, pure, move |ctx| {
        let (Some(text), Some(pattern)) = (text_arg(ctx, 0), text_arg(ctx, 1)) else {
            return Ok(None);
        };
        let escape = text_arg(ctx, 2).and_then(|e| e.chars().next());
        let case_insensitive = ctx.get::<i64>(3)? != 0;
        let re = patterns
            .like(&pattern, escape, case_insensitive)
            .map_err(|e| user_error(e.to_string()))?;
        Ok(Some(re.is_match(&text) as i64))
    })?;

    conn.create_scalar_function("_mysqlite_concat_ws", -1, pure, |ctx| {
        if ctx.is_empty() {
            return Ok(None);
        }
        let Some(separator) = text_arg(ctx, 0) else {
            return Ok(None);
        };
        let parts: Vec<String> = (1..ctx.len()).filter_map(|i| text_arg(ctx, i)).collect();
        Ok(Some(parts.join(&separator)))
    })?;

    conn.create_scalar_function("_mysqlite_date_format", 2, pure, |ctx| {
        let (Some(date), Some(format)) = (text_arg(ctx, 0), text_arg(ctx, 1)) else {
            return Ok(None);
        };
        Ok(date_format(&date, &format))
    })?;

    // _mysqlite_date_add(value, amount, unit)
    conn.create_scalar_function("_mysqlite_date_add", 3, pure, |ctx| {
        let (Some(value), Some(unit)) = (text_arg(ctx, 0), text_arg(ctx, 2)) else {
            return Ok(None);
        };
        let Some(amount) = from_value_ref(ctx.get_raw(1)).as_f64() else {
            return Ok(None);
        };
        Ok(date_add(&value, amount.round() as i64, &unit))
    })?;

    let checks = Arc::clone(&state.foreign_key_checks);
    conn.create_scalar_function("_mysqlite_fk_checks", 0, FunctionFlags::SQLITE_UTF8, move |_| {
        Ok(checks.load(Ordering::Relaxed) as i64)
    })?;

    Ok(())
}

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// 0 = Sunday
fn weekday(dt: &DateTime) -> usize {
    let days = DateTime::date(dt.year, dt.month, dt.day).unix_seconds().div_euclid(86_400);
    (days + 4).rem_euclid(7) as usize
}

fn day_of_year(dt: &DateTime) -> u32 {
    (1..dt.month).map(|m| temporal::days_in_month(dt.year, m)).sum::<u32>() + dt.day
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Week number, weeks starting on Sunday; days before the first Sunday are week 0.
fn week_sunday_first(dt: &DateTime) -> u32 {
    let jan1 = weekday(&DateTime::date(dt.year, 1, 1)) as u32;
    let first_sunday = (7 - jan1) % 7 + 1;
    let yday = day_of_year(dt);
    if yday < first_sunday {
        0
    } else {
        (yday - first_sunday) / 7 + 1
    }
}

/// Week number, weeks starting on Monday; week 1 has four or more days of the year.
fn week_monday_first(dt: &DateTime) -> u32 {
    let jan1 = (weekday(&DateTime::date(dt.year, 1, 1)) + 6) % 7;
    let yday = day_of_year(dt) - 1;
    let week = (yday + jan1 as u32) / 7;
    if 7 - jan1 >= 4 {
        week + 1
    } else {
        week
    }
}

fn add_months(dt: DateTime, months: i64) -> Option<DateTime> {
    let total = (dt.year as i64 * 12 + dt.month as i64 - 1).checked_add(months)?;
    if !(0..=9999 * 12 + 11).contains(&total) {
        return None;
    }
    let year = (total / 12) as u32;
    let month = (total % 12) as u32 + 1;
    Some(DateTime {
        year,
        month,
        day: dt.day.min(temporal::days_in_month(year, month)),
        ..dt
    })
}

fn add_micros(dt: DateTime, delta: i64) -> Option<DateTime> {
    let total = dt
        .unix_seconds()
        .checked_mul(1_000_000)?
        .checked_add(dt.micros as i64)?
        .checked_add(delta)?;
    let mut out = DateTime::from_unix_seconds(total.div_euclid(1_000_000));
    out.micros = total.rem_euclid(1_000_000) as u32;
    (out.year <= 9999 && total >= DateTime::date(1, 1, 1).unix_seconds() * 1_000_000).then_some(out)
}

/// MySQL `DATE_ADD` for single-field units. Month arithmetic clamps the day
/// to the length of the target month; a date stays a date for day-sized
/// units and larger.
pub fn date_add(value: &str, amount: i64, unit: &str) -> Option<String> {
    let (dt, _) = temporal::parse_datetime(value)?;
    if !dt.is_calendar_valid() {
        return None;
    }
    let unit = unit.to_ascii_uppercase();
    let micros_per = |n: i64| amount.checked_mul(n);
    let shifted = match unit.as_str() {
        "YEAR" => add_months(dt, amount.checked_mul(12)?),
        "QUARTER" => add_months(dt, amount.checked_mul(3)?),
        "MONTH" => add_months(dt, amount),
        "WEEK" => add_micros(dt, micros_per(7 * 86_400_000_000)?),
        "DAY" => add_micros(dt, micros_per(86_400_000_000)?),
        "HOUR" => add_micros(dt, micros_per(3_600_000_000)?),
        "MINUTE" => add_micros(dt, micros_per(60_000_000)?),
        "SECOND" => add_micros(dt, micros_per(1_000_000)?),
        "MICROSECOND" => add_micros(dt, amount),
        _ => None,
    }?;
    let date_only = !value.contains(':') && matches!(unit.as_str(), "YEAR" | "QUARTER" | "MONTH" | "WEEK" | "DAY");
    Some(if date_only {
        shifted.format_date()
    } else {
        shifted.format_datetime(if shifted.micros == 0 { 0 } else { 6 })
    })
}

/// MySQL `DATE_FORMAT`. `None` for text that is not a valid date.
pub fn date_format(date: &str, format: &str) -> Option<String> {
    let (dt, _) = temporal::parse_datetime(date)?;
    if dt.is_zero() || !dt.is_calendar_valid() {
        return None;
    }
    let hour12 = match dt.hour % 12 {
        0 => 12,
        h => h,
    };
    let ampm = if dt.hour < 12 { "AM" } else { "PM" };
    let month_name = MONTHS[(dt.month - 1) as usize];
    let day_name = WEEKDAYS[weekday(&dt)];

    let mut out = String::with_capacity(format.len() + 8);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(spec) = chars.next() else {
            out.push('%');
            break;
        };
        match spec {
            'a' => out.push_str(&day_name[..3]),
            'b' => out.push_str(&month_name[..3]),
            'c' => out.push_str(&dt.month.to_string()),
            'D' => out.push_str(&format!("{}{}", dt.day, ordinal_suffix(dt.day))),
            'd' => out.push_str(&format!("{:02}", dt.day)),
            'e' => out.push_str(&dt.day.to_string()),
            'f' => out.push_str(&format!("{:06}", dt.micros)),
            'H' => out.push_str(&format!("{:02}", dt.hour)),
            'h' | 'I' => out.push_str(&format!("{:02}", hour12)),
            'i' => out.push_str(&format!("{:02}", dt.minute)),
            'j' => out.push_str(&format!("{:03}", day_of_year(&dt))),
            'k' => out.push_str(&dt.hour.to_string()),
            'l' => out.push_str(&hour12.to_string()),
            'M' => out.push_str(month_name),
            'm' => out.push_str(&format!("{:02}", dt.month)),
            'p' => out.push_str(ampm),
            'r' => out.push_str(&format!("{:02}:{:02}:{:02} {}", hour12, dt.minute, dt.second, ampm)),
            'S' | 's' => out.push_str(&format!("{:02}", dt.second)),
            'T' => out.push_str(&format!("{:02}:{:02}:{:02}", dt.hour, dt.minute, dt.second)),
            'U' => out.push_str(&format!("{:02}", week_sunday_first(&dt))),
            'u' => out.push_str(&format!("{:02}", week_monday_first(&dt))),
            'W' => out.push_str(day_name),
            'w' => out.push_str(&weekday(&dt).to_string()),
            'Y' => out.push_str(&format!("{:04}", dt.year)),
            'y' => out.push_str(&format!("{:02}", dt.year % 100)),
            other => out.push(other),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_error_codec() {
        let errors = vec![
            CastError::NotNull { column: "a".into() },
            CastError::OutOfRange {
                column: "b".into(),
                row: 3,
            },
            CastError::IncorrectTemporal {
                type_name: "date",
                value: "2023-02-29".into(),
                column: "d".into(),
                row: 1,
            },
            CastError::InvalidJson {
                reason: "Invalid value.".into(),
                column: "j".into(),
            },
        ];
        for err in errors {
            let message = format!("prefix {}", encode_cast_error(&err));
            assert_eq!(decode_cast_error(&message), Some(err));
        }
        assert_eq!(decode_cast_error("no such table: t"), None);
    }

    #[test]
    fn test_raise_codec() {
        let message = raise_message(1452, "Cannot add or update a child row: a: b");
        assert_eq!(
            decode_raise(&message),
            Some((1452, "Cannot add or update a child row: a: b".to_string()))
        );
    }

    #[test]
    fn test_date_format() {
        assert_eq!(
            date_format("2024-03-05 14:07:09", "%Y-%m-%d %H:%i:%s").as_deref(),
            Some("2024-03-05 14:07:09")
        );
        assert_eq!(
            date_format("2024-03-05 14:07:09", "%W %M %D %y %l%p").as_deref(),
            Some("Tuesday March 5th 24 2PM")
        );
        assert_eq!(date_format("2024-01-01", "%j %a %b %c").as_deref(), Some("001 Mon Jan 1"));
        assert_eq!(date_format("0000-00-00", "%Y"), None);
        assert_eq!(date_format("garbage", "%Y"), None);
    }

    #[test]
    fn test_date_add() {
        assert_eq!(date_add("2024-01-31", 1, "MONTH").as_deref(), Some("2024-02-29"));
        assert_eq!(date_add("2024-03-01", -1, "DAY").as_deref(), Some("2024-02-29"));
        assert_eq!(date_add("2024-03-01", 2, "hour").as_deref(), Some("2024-03-01 02:00:00"));
        assert_eq!(date_add("2023-12-31 23:59:59", 1, "SECOND").as_deref(), Some("2024-01-01 00:00:00"));
        assert_eq!(date_add("2020-02-29", 1, "YEAR").as_deref(), Some("2021-02-28"));
        assert_eq!(date_add("not a date", 1, "DAY"), None);
        assert_eq!(date_add("2024-01-01", 1, "FORTNIGHT"), None);
    }

    #[test]
    fn test_week_numbers() {
        // 2023-01-01 is a Sunday
        assert_eq!(date_format("2023-01-01", "%U %u").as_deref(), Some("01 00"));
        assert_eq!(date_format("2023-01-02", "%U %u").as_deref(), Some("01 01"));
    }

    #[test]
    fn test_unsigned_above_i64_is_text() {
        assert_eq!(to_sql_value(&Value::Unsigned(u64::MAX)), SqlValue::Integer(-1));
        assert_eq!(to_sql_value(&Value::Unsigned(5)), SqlValue::Integer(5));
    }
}
