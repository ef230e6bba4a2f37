use chrono::{DateTime, NaiveDateTime, Utc};

use crate::coerce;
use crate::temporal;
use crate::value::{Kind, Value};

/// A Rust type that can sit in a record field, map value, tuple element or scalar slot.
///
/// `from_value` receives a value already decoded for `KIND` and applies the
/// final best-effort coercion; `None` leaves the destination untouched.
pub trait FieldValue: Sized {
    const KIND: Kind;
    /// Optional wrapper: NULL leaves it unset, other values go through widening first.
    const OPTIONAL: bool = false;

    fn from_value(value: Value) -> Option<Self>;

    fn to_value(&self) -> Value;
}

macro_rules! signed_field {
    ($($t:ty => $kind:ident),+ $(,)?) => {
        $(
            impl FieldValue for $t {
                const KIND: Kind = Kind::$kind;

                fn from_value(value: Value) -> Option<Self> {
                    match coerce::convert(&value, Self::KIND) {
                        Value::Int(v) => Some(v as $t),
                        _ => None,
                    }
                }

                fn to_value(&self) -> Value {
                    Value::Int(*self as i64)
                }
            }
        )+
    };
}

macro_rules! unsigned_field {
    ($($t:ty => $kind:ident),+ $(,)?) => {
        $(
            impl FieldValue for $t {
                const KIND: Kind = Kind::$kind;

                fn from_value(value: Value) -> Option<Self> {
                    match coerce::convert(&value, Self::KIND) {
                        Value::UInt(v) => Some(v as $t),
                        _ => None,
                    }
                }

                fn to_value(&self) -> Value {
                    Value::UInt(*self as u64)
                }
            }
        )+
    };
}

signed_field!(i8 => Int8, i16 => Int16, i32 => Int32, i64 => Int64, isize => Int64);
unsigned_field!(u8 => UInt8, u16 => UInt16, u32 => UInt32, u64 => UInt64, usize => UInt64);

impl FieldValue for f32 {
    const KIND: Kind = Kind::Float32;

    fn from_value(value: Value) -> Option<Self> {
        Some(coerce::to_f64(&value) as f32)
    }

    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }
}

impl FieldValue for f64 {
    const KIND: Kind = Kind::Float64;

    fn from_value(value: Value) -> Option<Self> {
        Some(coerce::to_f64(&value))
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FieldValue for bool {
    const KIND: Kind = Kind::Bool;

    fn from_value(value: Value) -> Option<Self> {
        Some(coerce::to_bool(&value))
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FieldValue for String {
    const KIND: Kind = Kind::Text;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s),
            other => Some(coerce::to_text(&other)),
        }
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FieldValue for Vec<u8> {
    const KIND: Kind = Kind::Bytes;

    fn from_value(value: Value) -> Option<Self> {
        match coerce::convert(&value, Kind::Bytes) {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl FieldValue for NaiveDateTime {
    const KIND: Kind = Kind::Time;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Time(t) => Some(t),
            Value::Text(s) => temporal::parse_datetime(&s),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        Value::Time(*self)
    }
}

impl FieldValue for DateTime<Utc> {
    const KIND: Kind = Kind::Time;

    fn from_value(value: Value) -> Option<Self> {
        NaiveDateTime::from_value(value).map(|t| t.and_utc())
    }

    fn to_value(&self) -> Value {
        Value::Time(self.naive_utc())
    }
}

/// Generic field: keeps the driver's natural value.
impl FieldValue for Value {
    const KIND: Kind = Kind::Any;

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }

    fn to_value(&self) -> Value {
        self.clone()
    }
}

/// Free-form JSON field. Text that is not valid JSON is kept as a JSON string.
impl FieldValue for serde_json::Value {
    const KIND: Kind = Kind::Json;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s))),
            Value::Bytes(b) => serde_json::from_slice(&b)
                .ok()
                .or_else(|| Some(Value::Bytes(b).to_json())),
            other => Some(other.to_json()),
        }
    }

    fn to_value(&self) -> Value {
        Value::from_json(self.clone())
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: Kind = T::KIND;
    const OPTIONAL: bool = true;

    fn from_value(value: Value) -> Option<Self> {
        if value.is_null() {
            return Some(None);
        }
        T::from_value(value).map(Some)
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}
