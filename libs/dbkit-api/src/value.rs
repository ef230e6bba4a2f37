use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Serialize, Serializer};

use crate::temporal;

/// A decoded database scalar, and the type of every bound parameter.
///
/// All integer widths share `Int`/`UInt`; the target width lives in [`Kind`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Time(NaiveDateTime),
}

/// Target primitive kind of a field, map value, tuple element or scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bool,
    Text,
    Bytes,
    Time,
    /// Generic field: keeps whatever the driver decoded.
    Any,
    /// Structured field stored as JSON text.
    Json,
}

impl Kind {
    pub fn is_signed(self) -> bool {
        matches!(self, Kind::Int8 | Kind::Int16 | Kind::Int32 | Kind::Int64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            Kind::UInt8 | Kind::UInt16 | Kind::UInt32 | Kind::UInt64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Kind::Float32 | Kind::Float64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_signed() || self.is_unsigned() || self.is_float()
    }
}

impl Value {
    /// Raw SQL expression escape: the builder inlines the text instead of binding it.
    ///
    /// `Value::sql_expr("NOW()")` is the same as `Value::from(":NOW()")`.
    pub fn sql_expr(expr: &str) -> Self {
        Value::Text(format!(":{expr}"))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Natural kind of the decoded value. `None` for NULL.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(Kind::Int64),
            Value::UInt(_) => Some(Kind::UInt64),
            Value::Float(_) => Some(Kind::Float64),
            Value::Bool(_) => Some(Kind::Bool),
            Value::Text(_) => Some(Kind::Text),
            Value::Bytes(_) => Some(Kind::Bytes),
            Value::Time(_) => Some(Kind::Time),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// JSON view of the value. Bytes are base64 encoded.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Int(v) => serde_json::json!(v),
            Value::UInt(v) => serde_json::json!(v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => {
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            Value::Time(t) => serde_json::Value::String(temporal::format_datetime(t)),
        }
    }

    /// Scalar from a JSON value. Arrays and objects become their JSON text.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Value::Text(other.to_string())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::UInt(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer
                .serialize_str(&base64::engine::general_purpose::STANDARD.encode(b)),
            Value::Time(t) => serializer.serialize_str(&temporal::format_datetime(t)),
        }
    }
}

// ---------------------------------------------------------------------------
// From impls: Rust values → bound parameters
// ---------------------------------------------------------------------------

macro_rules! value_from {
    ($variant:ident as $target:ty: $($t:ty),+) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )+
    };
}

value_from!(Int as i64: i8, i16, i32, i64, isize);
value_from!(UInt as u64: u8, u16, u32, u64, usize);
value_from!(Float as f64: f32, f64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Time(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v.naive_utc())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Build a `Vec<Value>` of bound parameters.
///
/// ```ignore
/// db.query("select * from users where id = ? and active = ?", &params![2, true])?;
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::value::Value>::new()
    };
    ($($v:expr),+ $(,)?) => {
        vec![$($crate::value::Value::from($v)),+]
    };
}
