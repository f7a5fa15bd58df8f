//! DATE, DATETIME, TIMESTAMP and TIME conversions

use super::{as_text, lossy, CastContext, CastResult, StoredValue};
use crate::error::CastError;
use crate::session::SqlMode;
use crate::types::temporal::{datetime_from_number, parse_datetime, parse_time, DateTime, Time};
use crate::types::{DataType, TypeFamily, Value};

/// TIME range is +/- 838:59:59.
const MAX_TIME_HOURS: u32 = 838;

/// TIMESTAMP covers 1970-01-01 00:00:01 .. 2038-01-19 03:14:07 UTC.
const TIMESTAMP_MAX: i64 = 2_147_483_647;

fn type_name(ty: &DataType) -> &'static str {
    match ty.family() {
        TypeFamily::Date => "date",
        TypeFamily::Time => "time",
        _ => "datetime",
    }
}

fn incorrect(ty: &DataType, value: &Value, ctx: CastContext<'_>) -> CastError {
    CastError::IncorrectTemporal {
        type_name: type_name(ty),
        value: as_text(value),
        column: ctx.column.to_string(),
        row: ctx.row,
    }
}

fn render(dt: &DateTime, ty: &DataType) -> Value {
    match ty.family() {
        TypeFamily::Date => Value::Text(dt.format_date()),
        _ => Value::Text(dt.format_datetime(ty.fsp())),
    }
}

/// Parse into calendar fields; the flag is `false` when input was truncated.
fn read_datetime_value(value: &Value) -> Option<(DateTime, bool)> {
    match value {
        Value::Integer(i) if *i >= 0 => datetime_from_number(*i as u64).map(|dt| (dt, true)),
        Value::Unsigned(u) => datetime_from_number(*u).map(|dt| (dt, true)),
        Value::Float(f) if *f >= 0.0 => {
            let mut dt = datetime_from_number(f.trunc() as u64)?;
            dt.micros = ((f.fract() * 1_000_000.0).round() as u32).min(999_999);
            Some((dt, true))
        }
        Value::Text(_) | Value::Bytes(_) => parse_datetime(&as_text(value)),
        _ => None,
    }
}

pub(super) fn store_datetime(value: &Value, ty: &DataType, mode: &SqlMode, ctx: CastContext<'_>) -> CastResult {
    let zero = render(&DateTime::default(), ty);
    let Some((dt, clean)) = read_datetime_value(value) else {
        return lossy(mode, incorrect(ty, value, ctx), zero);
    };

    if dt.is_zero() {
        if mode.no_zero_date {
            return lossy(mode, incorrect(ty, value, ctx), zero);
        }
        return Ok(StoredValue::clean(zero));
    }

    let valid = if dt.has_zero_part() {
        !mode.no_zero_in_date
            && dt.month <= 12
            && dt.day <= 31
            && dt.hour < 24
            && dt.minute < 60
            && dt.second < 60
    } else {
        dt.is_calendar_valid()
    };
    if !valid {
        return lossy(mode, incorrect(ty, value, ctx), zero);
    }

    let dt = if ty.family() == TypeFamily::Date {
        DateTime::date(dt.year, dt.month, dt.day)
    } else {
        dt.round_to(ty.fsp())
    };

    if ty.family() == TypeFamily::Timestamp {
        let secs = dt.unix_seconds();
        if dt.has_zero_part() || !(1..=TIMESTAMP_MAX).contains(&secs) {
            return lossy(mode, incorrect(ty, value, ctx), zero);
        }
    }

    let stored = render(&dt, ty);
    if !clean {
        return lossy(mode, incorrect(ty, value, ctx), stored);
    }
    Ok(StoredValue::clean(stored))
}

pub(super) fn store_time(value: &Value, ty: &DataType, mode: &SqlMode, ctx: CastContext<'_>) -> CastResult {
    let fsp = ty.fsp();
    let zero = Value::Text(Time::default().format(fsp));
    let parsed = match value {
        Value::Integer(_) | Value::Unsigned(_) | Value::Float(_) => parse_time(&as_text(value)),
        Value::Text(_) | Value::Bytes(_) => parse_time(&as_text(value)),
        Value::Null => None,
    };
    let Some((time, clean)) = parsed else {
        return lossy(mode, incorrect(ty, value, ctx), zero);
    };
    let time = time.round_to(fsp);
    if time.hours > MAX_TIME_HOURS {
        let clamped = Time {
            negative: time.negative,
            hours: MAX_TIME_HOURS,
            minutes: 59,
            seconds: 59,
            micros: 0,
        };
        return lossy(mode, incorrect(ty, value, ctx), Value::Text(clamped.format(fsp)));
    }
    let stored = Value::Text(time.format(fsp));
    if !clean {
        return lossy(mode, incorrect(ty, value, ctx), stored);
    }
    Ok(StoredValue::clean(stored))
}

pub(super) fn read_datetime(stored: &Value, ty: &DataType) -> Value {
    match read_datetime_value(stored) {
        Some((dt, _)) => {
            let dt = if ty.family() == TypeFamily::Date {
                dt
            } else {
                dt.round_to(ty.fsp())
            };
            render(&dt, ty)
        }
        None => stored.clone(),
    }
}

pub(super) fn read_time(stored: &Value, ty: &DataType) -> Value {
    match parse_time(&as_text(stored)) {
        Some((t, _)) => Value::Text(t.round_to(ty.fsp()).format(ty.fsp())),
        None => stored.clone(),
    }
}
