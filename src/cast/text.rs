//! Character, binary, ENUM, SET and JSON conversions

use super::{as_text, lossy, CastContext, CastResult, StoredValue};
use crate::error::CastError;
use crate::session::SqlMode;
use crate::types::{DataType, TypeKind, Value};

fn truncated(ctx: CastContext<'_>) -> CastError {
    CastError::Truncated {
        column: ctx.column.to_string(),
        row: ctx.row,
    }
}

/// Overflow is `TooLong` in strict mode and a truncation warning otherwise.
fn overflow(mode: &SqlMode, ctx: CastContext<'_>, kept: Value) -> CastResult {
    if mode.is_strict() {
        return Err(CastError::TooLong {
            column: ctx.column.to_string(),
            row: ctx.row,
        });
    }
    Ok(StoredValue {
        value: kept,
        warning: Some(truncated(ctx)),
    })
}

pub(super) fn store_string(value: &Value, ty: &DataType, mode: &SqlMode, ctx: CastContext<'_>) -> CastResult {
    let mut text = as_text(value);
    if ty.kind == TypeKind::Char {
        let trimmed = text.trim_end_matches(' ').len();
        text.truncate(trimmed);
    }
    let Some(max) = ty.max_length() else {
        return Ok(StoredValue::clean(Value::Text(text)));
    };

    // TEXT types are limited in bytes, CHAR and VARCHAR in characters
    let by_chars = matches!(ty.kind, TypeKind::Char | TypeKind::VarChar);
    let len = if by_chars { text.chars().count() as u64 } else { text.len() as u64 };
    if len <= max {
        return Ok(StoredValue::clean(Value::Text(text)));
    }

    let cut = if by_chars {
        text.char_indices().nth(max as usize).map(|(i, _)| i).unwrap_or(text.len())
    } else {
        let mut cut = max as usize;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        cut
    };
    let rest = &text[cut..];
    let kept = text[..cut].to_string();
    if rest.chars().all(|c| c == ' ') {
        return Ok(StoredValue::clean(Value::Text(kept)));
    }
    overflow(mode, ctx, Value::Text(kept))
}

pub(super) fn store_binary(value: &Value, ty: &DataType, mode: &SqlMode, ctx: CastContext<'_>) -> CastResult {
    let mut bytes = match value {
        Value::Bytes(b) => b.clone(),
        other => as_text(other).into_bytes(),
    };
    let max = ty.max_length().unwrap_or(u64::MAX) as usize;
    let mut warning = None;
    if bytes.len() > max {
        let excess_is_padding = bytes[max..].iter().all(|b| *b == 0);
        bytes.truncate(max);
        if !excess_is_padding {
            match overflow(mode, ctx, Value::Null) {
                Err(e) => return Err(e),
                Ok(stored) => warning = stored.warning,
            }
        }
    }
    if ty.kind == TypeKind::Binary {
        bytes.resize(max, 0);
    }
    Ok(StoredValue {
        value: Value::Bytes(bytes),
        warning,
    })
}

fn member_index(members: &[String], text: &str) -> Option<usize> {
    let wanted = text.trim_end_matches(' ');
    members.iter().position(|m| m.eq_ignore_ascii_case(wanted))
}

fn integral(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(i) if *i >= 0 => Some(*i as u64),
        Value::Unsigned(u) => Some(*u),
        Value::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
        _ => None,
    }
}

pub(super) fn store_enum(value: &Value, ty: &DataType, mode: &SqlMode, ctx: CastContext<'_>) -> CastResult {
    let members = &ty.values;
    let index = match integral(value) {
        // numbers are 1-based member indexes; 0 is the error value
        Some(n) => (n >= 1 && n as usize <= members.len()).then(|| n as usize - 1),
        None => {
            let text = as_text(value);
            member_index(members, &text).or_else(|| {
                text.trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n >= 1 && *n <= members.len())
                    .map(|n| n - 1)
            })
        }
    };
    match index {
        Some(i) => Ok(StoredValue::clean(Value::Text(members[i].clone()))),
        None => lossy(mode, truncated(ctx), Value::text("")),
    }
}

pub(super) fn store_set(value: &Value, ty: &DataType, mode: &SqlMode, ctx: CastContext<'_>) -> CastResult {
    let members = &ty.values;
    let mut chosen = vec![false; members.len()];
    let mut clean = true;

    if let Some(mask) = integral(value) {
        for (i, slot) in chosen.iter_mut().enumerate() {
            *slot = mask & (1u64 << i) != 0;
        }
        let known = if members.len() >= 64 { u64::MAX } else { (1u64 << members.len()) - 1 };
        clean = mask & !known == 0;
    } else {
        let text = as_text(value);
        if !text.is_empty() {
            for part in text.split(',') {
                match member_index(members, part) {
                    Some(i) => chosen[i] = true,
                    None => clean = false,
                }
            }
        }
    }

    let joined = members
        .iter()
        .zip(&chosen)
        .filter(|(_, on)| **on)
        .map(|(m, _)| m.as_str())
        .collect::<Vec<_>>()
        .join(",");
    if clean {
        Ok(StoredValue::clean(Value::Text(joined)))
    } else {
        lossy(mode, truncated(ctx), Value::Text(joined))
    }
}

/// JSON is validated in every mode.
pub(super) fn store_json(value: &Value, ctx: CastContext<'_>) -> CastResult {
    normalize_json(&as_text(value))
        .map(|json| StoredValue::clean(Value::Text(json)))
        .map_err(|e| CastError::InvalidJson {
            reason: e.to_string(),
            column: ctx.column.to_string(),
        })
}

/// Re-render JSON text the way MySQL prints stored documents: `", "` and
/// `": "` separators, object keys ordered by length, then bytewise.
pub fn normalize_json(text: &str) -> std::result::Result<String, serde_json::Error> {
    let doc: serde_json::Value = serde_json::from_str(text)?;
    let mut out = String::with_capacity(text.len());
    write_json(&doc, &mut out)?;
    Ok(out)
}

fn write_json(doc: &serde_json::Value, out: &mut String) -> std::result::Result<(), serde_json::Error> {
    use serde_json::Value as Json;
    match doc {
        Json::Null => out.push_str("null"),
        Json::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Json::Number(n) => out.push_str(&n.to_string()),
        Json::String(s) => out.push_str(&serde_json::to_string(s)?),
        Json::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_json(item, out)?;
            }
            out.push(']');
        }
        Json::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.as_bytes().cmp(b.as_bytes())));
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push_str(": ");
                write_json(&map[key], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

pub(super) fn read_string(stored: &Value, ty: &DataType) -> Value {
    let text = as_text(stored);
    if ty.kind == TypeKind::Char {
        return Value::text(text.trim_end_matches(' '));
    }
    Value::Text(text)
}
