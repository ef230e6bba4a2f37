//! Type-directed conversion between decoded scalars and target kinds.
//!
//! Three flavours:
//! - [`convert`]: total best-effort coercion, never fails.
//! - [`widen`]: lossless numeric widening only.
//! - [`scan`]: strict driver-side conversion into a scan buffer; rejects
//!   what a driver would reject.

use chrono::{DateTime, NaiveDateTime};

use crate::temporal;
use crate::value::{Kind, Value};

/// Convert `value` into a value of `kind`.
///
/// Deterministic and side-effect-free. Integer widths truncate like a numeric
/// cast; unparseable text yields zero; `Json` falls back to the string form.
pub fn convert(value: &Value, kind: Kind) -> Value {
    match kind {
        Kind::Int8 | Kind::Int16 | Kind::Int32 | Kind::Int64 => {
            Value::Int(narrow_signed(to_i64(value), kind))
        }
        Kind::UInt8 | Kind::UInt16 | Kind::UInt32 | Kind::UInt64 => {
            Value::UInt(narrow_unsigned(to_u64(value), kind))
        }
        Kind::Float32 => Value::Float(to_f64(value) as f32 as f64),
        Kind::Float64 => Value::Float(to_f64(value)),
        Kind::Bool => Value::Bool(to_bool(value)),
        Kind::Text | Kind::Json => Value::Text(to_text(value)),
        Kind::Bytes => match value {
            Value::Bytes(b) => Value::Bytes(b.clone()),
            other => Value::Bytes(to_text(other).into_bytes()),
        },
        Kind::Time => Value::Time(to_time(value)),
        Kind::Any => value.clone(),
    }
}

/// Lossless conversion into `kind`, or `None` when information would be lost.
pub fn widen(value: &Value, kind: Kind) -> Option<Value> {
    match (value, kind) {
        (Value::Int(v), k) if k.is_signed() => fits_signed(*v, k).then_some(Value::Int(*v)),
        (Value::Int(v), k) if k.is_unsigned() => u64::try_from(*v)
            .ok()
            .filter(|u| fits_unsigned(*u, k))
            .map(Value::UInt),
        (Value::UInt(v), k) if k.is_unsigned() => {
            fits_unsigned(*v, k).then_some(Value::UInt(*v))
        }
        (Value::UInt(v), k) if k.is_signed() => i64::try_from(*v)
            .ok()
            .filter(|i| fits_signed(*i, k))
            .map(Value::Int),
        (Value::Int(v), k) if k.is_float() => {
            (v.unsigned_abs() <= mantissa_limit(k)).then_some(Value::Float(*v as f64))
        }
        (Value::UInt(v), k) if k.is_float() => {
            (*v <= mantissa_limit(k)).then_some(Value::Float(*v as f64))
        }
        (Value::Float(v), Kind::Float64) => Some(Value::Float(*v)),
        (Value::Float(v), Kind::Float32) => {
            ((*v as f32) as f64 == *v).then_some(Value::Float(*v))
        }
        (Value::Text(s), Kind::Json) => Some(Value::Text(s.clone())),
        (v, k) if v.kind() == Some(k) => Some(v.clone()),
        _ => None,
    }
}

/// Strict conversion of a driver value into a scan buffer of kind `hint`.
///
/// NULL always scans. `Any` keeps the driver's natural value.
pub fn scan(value: Value, hint: Kind) -> Result<Value, String> {
    if value.is_null() || hint == Kind::Any {
        return Ok(value);
    }
    match hint {
        k if k.is_signed() => {
            let v = match value {
                Value::Int(v) => v,
                Value::UInt(u) => {
                    i64::try_from(u).map_err(|_| format!("value {u} overflows {k:?}"))?
                }
                Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.2e18 => f as i64,
                Value::Text(s) => parse_strict::<i64>(&s, k)?,
                Value::Bytes(b) => parse_strict::<i64>(&String::from_utf8_lossy(&b), k)?,
                other => return Err(unsupported(&other, k)),
            };
            if fits_signed(v, k) {
                Ok(Value::Int(v))
            } else {
                Err(format!("value {v} out of range for {k:?}"))
            }
        }
        k if k.is_unsigned() => {
            let v = match value {
                Value::UInt(u) => u,
                Value::Int(i) => {
                    u64::try_from(i).map_err(|_| format!("negative value {i} for {k:?}"))?
                }
                Value::Float(f) if f.fract() == 0.0 && (0.0..1.8e19).contains(&f) => f as u64,
                Value::Text(s) => parse_strict::<u64>(&s, k)?,
                Value::Bytes(b) => parse_strict::<u64>(&String::from_utf8_lossy(&b), k)?,
                other => return Err(unsupported(&other, k)),
            };
            if fits_unsigned(v, k) {
                Ok(Value::UInt(v))
            } else {
                Err(format!("value {v} out of range for {k:?}"))
            }
        }
        k if k.is_float() => {
            let v = match value {
                Value::Float(f) => f,
                Value::Int(i) => i as f64,
                Value::UInt(u) => u as f64,
                Value::Text(s) => parse_strict::<f64>(&s, k)?,
                Value::Bytes(b) => parse_strict::<f64>(&String::from_utf8_lossy(&b), k)?,
                other => return Err(unsupported(&other, k)),
            };
            Ok(Value::Float(if k == Kind::Float32 { v as f32 as f64 } else { v }))
        }
        Kind::Bool => match value {
            Value::Bool(b) => Ok(Value::Bool(b)),
            Value::Int(0) | Value::UInt(0) => Ok(Value::Bool(false)),
            Value::Int(1) | Value::UInt(1) => Ok(Value::Bool(true)),
            Value::Text(s) => parse_bool_strict(&s)
                .map(Value::Bool)
                .ok_or_else(|| format!("converting \"{s}\" to Bool")),
            other => Err(unsupported(&other, Kind::Bool)),
        },
        Kind::Text | Kind::Json => Ok(Value::Text(to_text(&value))),
        Kind::Bytes => Ok(match value {
            Value::Bytes(b) => Value::Bytes(b),
            other => Value::Bytes(to_text(&other).into_bytes()),
        }),
        Kind::Time => match value {
            Value::Time(t) => Ok(Value::Time(t)),
            Value::Text(s) => temporal::parse_datetime(&s)
                .map(Value::Time)
                .ok_or_else(|| format!("converting \"{s}\" to Time")),
            other => Err(unsupported(&other, Kind::Time)),
        },
        _ => Ok(value),
    }
}

// ---------------------------------------------------------------------------
// Scalar extraction
// ---------------------------------------------------------------------------

pub fn to_i64(value: &Value) -> i64 {
    match value {
        Value::Null => 0,
        Value::Int(v) => *v,
        Value::UInt(v) => *v as i64,
        Value::Float(v) => *v as i64,
        Value::Bool(b) => *b as i64,
        Value::Text(s) => parse_int_text(s),
        Value::Bytes(b) => parse_int_text(&String::from_utf8_lossy(b)),
        Value::Time(t) => t.and_utc().timestamp(),
    }
}

pub fn to_u64(value: &Value) -> u64 {
    match value {
        Value::UInt(v) => *v,
        Value::Text(s) => s.trim().parse::<u64>().unwrap_or_else(|_| parse_int_text(s) as u64),
        other => to_i64(other) as u64,
    }
}

pub fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Int(v) => *v as f64,
        Value::UInt(v) => *v as f64,
        Value::Float(v) => *v,
        Value::Bool(b) => *b as i64 as f64,
        Value::Text(s) => s.trim().parse().unwrap_or(0.0),
        Value::Bytes(b) => String::from_utf8_lossy(b).trim().parse().unwrap_or(0.0),
        Value::Time(t) => t.and_utc().timestamp() as f64,
    }
}

pub fn to_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(v) => *v != 0,
        Value::UInt(v) => *v != 0,
        Value::Float(v) => *v != 0.0,
        Value::Text(s) => parse_bool_loose(s),
        Value::Bytes(b) => parse_bool_loose(&String::from_utf8_lossy(b)),
        Value::Time(_) => true,
    }
}

pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Text(s) => s.clone(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Value::Time(t) => temporal::format_datetime(t),
    }
}

pub fn to_time(value: &Value) -> NaiveDateTime {
    match value {
        Value::Time(t) => *t,
        Value::Text(s) => temporal::parse_datetime(s).unwrap_or_default(),
        Value::Int(secs) => DateTime::from_timestamp(*secs, 0)
            .map(|t| t.naive_utc())
            .unwrap_or_default(),
        _ => NaiveDateTime::default(),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn narrow_signed(v: i64, kind: Kind) -> i64 {
    match kind {
        Kind::Int8 => v as i8 as i64,
        Kind::Int16 => v as i16 as i64,
        Kind::Int32 => v as i32 as i64,
        _ => v,
    }
}

fn narrow_unsigned(v: u64, kind: Kind) -> u64 {
    match kind {
        Kind::UInt8 => v as u8 as u64,
        Kind::UInt16 => v as u16 as u64,
        Kind::UInt32 => v as u32 as u64,
        _ => v,
    }
}

fn fits_signed(v: i64, kind: Kind) -> bool {
    match kind {
        Kind::Int8 => i8::try_from(v).is_ok(),
        Kind::Int16 => i16::try_from(v).is_ok(),
        Kind::Int32 => i32::try_from(v).is_ok(),
        _ => true,
    }
}

fn fits_unsigned(v: u64, kind: Kind) -> bool {
    match kind {
        Kind::UInt8 => u8::try_from(v).is_ok(),
        Kind::UInt16 => u16::try_from(v).is_ok(),
        Kind::UInt32 => u32::try_from(v).is_ok(),
        _ => true,
    }
}

/// Largest integer magnitude a float kind represents exactly.
fn mantissa_limit(kind: Kind) -> u64 {
    if kind == Kind::Float32 { 1 << 24 } else { 1 << 53 }
}

fn parse_int_text(s: &str) -> i64 {
    let s = s.trim();
    s.parse::<i64>()
        .or_else(|_| s.parse::<f64>().map(|f| f as i64))
        .unwrap_or(0)
}

fn parse_strict<T>(s: &str, kind: Kind) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| format!("converting \"{s}\" to {kind:?}: {e}"))
}

fn parse_bool_strict(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn parse_bool_loose(s: &str) -> bool {
    let s = s.trim();
    if let Some(b) = parse_bool_strict(s) {
        return b;
    }
    match s.to_ascii_lowercase().as_str() {
        "yes" | "y" | "on" => true,
        "no" | "n" | "off" | "" => false,
        other => other.parse::<f64>().map(|f| f != 0.0).unwrap_or(false),
    }
}

fn unsupported(value: &Value, kind: Kind) -> String {
    match value.kind() {
        Some(from) => format!("unsupported conversion {from:?} -> {kind:?}"),
        None => format!("unsupported conversion NULL -> {kind:?}"),
    }
}
