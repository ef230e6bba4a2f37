//! Precomputed field tables for struct destinations and sources.
//!
//! `#[derive(Record)]` flattens a struct (and every `#[record(flatten)]`
//! member, depth-first at its declaration point) into one ordered table of
//! [`FieldInfo`], built once per type. Reads and writes then go through
//! `get_field` / `set_field` by table index.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::column::{Column, ScanBuffer};
use crate::materialize::{RowPlan, Slot, decode_row};
use crate::value::{Kind, Value};

/// One flattened field of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Logical column name (the field name, or its `rename`).
    pub name: &'static str,
    pub kind: Kind,
    pub optional: bool,
}

/// A struct with a flat, ordered field table.
///
/// Implemented by `#[derive(Record)]`; hand-written impls must keep
/// `get_field`/`set_field` indices in sync with `fields()`.
pub trait Record {
    fn fields() -> &'static [FieldInfo];

    /// Current value of field `index` as a bindable value. Out of range yields NULL.
    fn get_field(&self, index: usize) -> Value;

    /// Assign field `index` from a decoded value. Values that cannot be
    /// coerced leave the field untouched.
    fn set_field(&mut self, index: usize, value: Value);
}

/// Index of the field that receives column `name`.
///
/// Exact logical name first, then ASCII case-insensitive with underscores
/// ignored. The first field in declaration order wins.
pub fn field_index(fields: &[FieldInfo], name: &str) -> Option<usize> {
    if let Some(index) = fields.iter().position(|f| f.name == name) {
        return Some(index);
    }
    let wanted = loose_name(name);
    fields.iter().position(|f| loose_name(f.name) == wanted)
}

fn loose_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Bind result columns to record fields.
pub fn bind<R: Record>(columns: &[Column]) -> RowPlan {
    let fields = R::fields();
    let slots = columns
        .iter()
        .map(|column| {
            field_index(fields, column.name()).map(|target| Slot {
                target,
                kind: fields[target].kind,
                optional: fields[target].optional,
            })
        })
        .collect();
    RowPlan::new(slots, fields.len())
}

/// Write one scanned row into `record`. NULL cells leave their field untouched.
pub fn fill<R: Record>(
    record: &mut R,
    plan: &RowPlan,
    columns: &[Column],
    buffers: &mut [ScanBuffer],
) {
    for (target, value) in decode_row(plan, columns, buffers) {
        if let Some(value) = value {
            record.set_field(target, value);
        }
    }
}

/// The record as a keyed data source, in field-table order.
pub fn keyed_values<R: Record>(record: &R) -> Vec<(String, Value)> {
    R::fields()
        .iter()
        .enumerate()
        .map(|(index, field)| (field.name.to_string(), record.get_field(index)))
        .collect()
}

/// Rehydrate a JSON-encoded cell. Failures are swallowed: the field keeps its value.
pub fn json_from_value<T: DeserializeOwned>(value: Value) -> Option<T> {
    let parsed = match value {
        Value::Null => return None,
        Value::Text(s) => serde_json::from_str(&s),
        Value::Bytes(b) => serde_json::from_slice(&b),
        other => serde_json::from_value(other.to_json()),
    };
    match parsed {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(target_type = std::any::type_name::<T>(), error = %e, "json field decode skipped");
            None
        }
    }
}

/// Encode a structured field as JSON text. A `null` encoding binds NULL.
pub fn json_to_value<T: Serialize>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Null) => Value::Null,
        Ok(json) => Value::Text(json.to_string()),
        Err(e) => {
            tracing::debug!(target_type = std::any::type_name::<T>(), error = %e, "json field encode failed");
            Value::Null
        }
    }
}
