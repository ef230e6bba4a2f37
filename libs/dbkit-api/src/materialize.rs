//! Row materializer: cursor rows → typed destinations.
//!
//! A destination's shape is fixed by its type. Per query, columns are bound
//! once into a [`RowPlan`] (which column feeds which target slot and with
//! what kind), scan buffers are sized from that plan, and every row is then
//! decoded cell by cell into the row container.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;

use crate::coerce;
use crate::column::{Column, Cursor, ScanBuffer};
use crate::error::DbError;
use crate::field::FieldValue;
use crate::temporal;
use crate::value::{Kind, Value};

/// What one row becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// Struct with a field table.
    Record,
    /// Column name → value.
    Map,
    /// Row as an ordered list of values.
    Tuple,
    /// First column only.
    Scalar,
}

/// Row shape plus single-vs-collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub row: RowShape,
    pub many: bool,
}

/// Where a column lands in the row container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub target: usize,
    pub kind: Kind,
    pub optional: bool,
}

/// Column → slot binding, computed once per query.
#[derive(Debug, Clone, PartialEq)]
pub struct RowPlan {
    /// One entry per column. `None` columns are scanned and discarded.
    pub slots: Vec<Option<Slot>>,
    /// Number of targets in the row container.
    pub width: usize,
}

impl RowPlan {
    pub fn new(slots: Vec<Option<Slot>>, width: usize) -> Self {
        Self { slots, width }
    }

    /// Every column feeds the target of the same index with `kind`.
    pub fn uniform(columns: &[Column], kind: Kind, optional: bool) -> Self {
        let slots = (0..columns.len())
            .map(|target| {
                Some(Slot {
                    target,
                    kind,
                    optional,
                })
            })
            .collect();
        Self::new(slots, columns.len())
    }

    /// Scan buffers for `columns`, hinted from the bound slots.
    pub fn buffers(&self, columns: &[Column]) -> Vec<ScanBuffer> {
        columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let slot = self.slots.get(index).copied().flatten();
                ScanBuffer::new(scan_hint(slot, column))
            })
            .collect()
    }
}

/// Buffer kind for a column: the destination's kind when bound, else the driver's natural type.
fn scan_hint(slot: Option<Slot>, column: &Column) -> Kind {
    let Some(slot) = slot else {
        return Kind::Any;
    };
    match slot.kind {
        Kind::Time | Kind::Json => Kind::Text,
        Kind::Any => column.scan_kind(),
        _ if slot.optional => column.scan_kind(),
        kind => kind,
    }
}

/// Decode a scanned cell for its slot. `None` means "write nothing".
pub fn decode(slot: &Slot, column: &Column, raw: Value) -> Option<Value> {
    let raw = match raw {
        Value::Null => return None,
        Value::Text(text) => match temporal::normalize_display(column.type_name(), &text) {
            Some(fixed) => Value::Text(fixed),
            None => Value::Text(text),
        },
        other => other,
    };

    match slot.kind {
        Kind::Any | Kind::Json => Some(raw),
        Kind::Time => match raw {
            Value::Time(t) => Some(Value::Time(t)),
            Value::Text(s) => temporal::parse_datetime(&s).map(Value::Time),
            other => Some(coerce::convert(&other, Kind::Time)),
        },
        kind if raw.kind() == Some(kind) => Some(raw),
        kind if slot.optional => {
            Some(coerce::widen(&raw, kind).unwrap_or_else(|| coerce::convert(&raw, kind)))
        }
        kind => {
            let doc = match &raw {
                Value::Text(s) if kind != Kind::Text && kind != Kind::Bytes => {
                    serde_json::from_str::<serde_json::Value>(s)
                        .ok()
                        .map(Value::from_json)
                }
                _ => None,
            };
            Some(coerce::convert(doc.as_ref().unwrap_or(&raw), kind))
        }
    }
}

/// Take the scanned cells of bound columns and decode them.
///
/// Yields `(target, decoded)`; `decoded` is `None` for NULL or an undecodable time.
pub fn decode_row<'a>(
    plan: &'a RowPlan,
    columns: &'a [Column],
    buffers: &'a mut [ScanBuffer],
) -> impl Iterator<Item = (usize, Option<Value>)> + 'a {
    plan.slots
        .iter()
        .zip(columns)
        .zip(buffers.iter_mut())
        .filter_map(|((slot, column), buffer)| {
            let slot = slot.as_ref()?;
            let raw = buffer.value.take()?;
            Some((slot.target, decode(slot, column, raw)))
        })
}

// ---------------------------------------------------------------------------
// Row containers
// ---------------------------------------------------------------------------

/// Container for one row.
pub trait RowTarget {
    const SHAPE: RowShape;

    fn bind(columns: &[Column]) -> RowPlan;

    fn fill(&mut self, plan: &RowPlan, columns: &[Column], buffers: &mut [ScanBuffer]);
}

fn fill_scalar<T: FieldValue>(
    target: &mut T,
    plan: &RowPlan,
    columns: &[Column],
    buffers: &mut [ScanBuffer],
) {
    for (_, value) in decode_row(plan, columns, buffers) {
        if let Some(v) = value.and_then(T::from_value) {
            *target = v;
        }
    }
}

fn bind_scalar<T: FieldValue>(columns: &[Column]) -> RowPlan {
    let mut slots = vec![None; columns.len()];
    if let Some(first) = slots.first_mut() {
        *first = Some(Slot {
            target: 0,
            kind: T::KIND,
            optional: T::OPTIONAL,
        });
    }
    RowPlan::new(slots, 1)
}

macro_rules! scalar_target {
    ($($t:ty),+ $(,)?) => {
        $(
            impl RowTarget for $t {
                const SHAPE: RowShape = RowShape::Scalar;

                fn bind(columns: &[Column]) -> RowPlan {
                    bind_scalar::<Self>(columns)
                }

                fn fill(&mut self, plan: &RowPlan, columns: &[Column], buffers: &mut [ScanBuffer]) {
                    fill_scalar(self, plan, columns, buffers)
                }
            }

            impl Destination for $t {
                type Row = Self;
                const MANY: bool = false;

                fn row(&mut self) -> &mut Self {
                    self
                }
            }
        )+
    };
}

scalar_target!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, String,
    NaiveDateTime, DateTime<Utc>, Value, serde_json::Value,
);

impl<T: FieldValue> RowTarget for Option<T> {
    const SHAPE: RowShape = RowShape::Scalar;

    fn bind(columns: &[Column]) -> RowPlan {
        bind_scalar::<Self>(columns)
    }

    fn fill(&mut self, plan: &RowPlan, columns: &[Column], buffers: &mut [ScanBuffer]) {
        fill_scalar(self, plan, columns, buffers)
    }
}

impl<T: FieldValue> Destination for Option<T> {
    type Row = Self;
    const MANY: bool = false;

    fn row(&mut self) -> &mut Self {
        self
    }
}

/// Map rows: NULL cells are stored as the value type's zero.
macro_rules! map_target {
    ($map:ident, $($bound:tt)+) => {
        impl<V: FieldValue, $($bound)+> RowTarget for $map<String, V, S> {
            const SHAPE: RowShape = RowShape::Map;

            fn bind(columns: &[Column]) -> RowPlan {
                RowPlan::uniform(columns, V::KIND, V::OPTIONAL)
            }

            fn fill(&mut self, plan: &RowPlan, columns: &[Column], buffers: &mut [ScanBuffer]) {
                for (target, value) in decode_row(plan, columns, buffers) {
                    if let Some(v) = V::from_value(value.unwrap_or_default()) {
                        self.insert(columns[target].name().to_string(), v);
                    }
                }
            }
        }

        impl<V: FieldValue, $($bound)+> Destination for $map<String, V, S> {
            type Row = Self;
            const MANY: bool = false;

            fn row(&mut self) -> &mut Self {
                self
            }
        }
    };
}

map_target!(HashMap, S: BuildHasher);
map_target!(IndexMap, S: BuildHasher);

impl<V: FieldValue> RowTarget for BTreeMap<String, V> {
    const SHAPE: RowShape = RowShape::Map;

    fn bind(columns: &[Column]) -> RowPlan {
        RowPlan::uniform(columns, V::KIND, V::OPTIONAL)
    }

    fn fill(&mut self, plan: &RowPlan, columns: &[Column], buffers: &mut [ScanBuffer]) {
        for (target, value) in decode_row(plan, columns, buffers) {
            if let Some(v) = V::from_value(value.unwrap_or_default()) {
                self.insert(columns[target].name().to_string(), v);
            }
        }
    }
}

impl<V: FieldValue> Destination for BTreeMap<String, V> {
    type Row = Self;
    const MANY: bool = false;

    fn row(&mut self) -> &mut Self {
        self
    }
}

/// Row as tuple. Each row replaces the previous contents.
impl<V: FieldValue + Default> RowTarget for Vec<V> {
    const SHAPE: RowShape = RowShape::Tuple;

    fn bind(columns: &[Column]) -> RowPlan {
        RowPlan::uniform(columns, V::KIND, V::OPTIONAL)
    }

    fn fill(&mut self, plan: &RowPlan, columns: &[Column], buffers: &mut [ScanBuffer]) {
        self.clear();
        self.resize_with(plan.width, V::default);
        for (target, value) in decode_row(plan, columns, buffers) {
            if let Some(v) = V::from_value(value.unwrap_or_default()) {
                self[target] = v;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Destinations
// ---------------------------------------------------------------------------

/// Whether the materializer keeps reading after a row.
pub trait Destination {
    type Row: RowTarget;
    /// Collections append every row; single values take the first row and stop.
    const MANY: bool;

    /// Container for the next row.
    fn row(&mut self) -> &mut Self::Row;

    fn shape() -> Shape {
        Shape {
            row: <Self::Row as RowTarget>::SHAPE,
            many: Self::MANY,
        }
    }
}

impl<R: RowTarget + Default> Destination for Vec<R> {
    type Row = R;
    const MANY: bool = true;

    fn row(&mut self) -> &mut R {
        self.push(R::default());
        let last = self.len() - 1;
        &mut self[last]
    }
}

/// Single row-as-tuple destination. `Vec<V>` alone is a collection of scalars.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tuple<V>(pub Vec<V>);

impl<V: FieldValue + Default> Destination for Tuple<V> {
    type Row = Vec<V>;
    const MANY: bool = false;

    fn row(&mut self) -> &mut Vec<V> {
        &mut self.0
    }
}

/// Read every row of `cursor` into `dest`, then close the cursor exactly once.
///
/// Single-value destinations take the first row; the remaining rows are
/// discarded by the close. A scan failure aborts the read but keeps rows
/// already appended to a collection.
pub fn materialize<D: Destination>(
    cursor: &mut dyn Cursor,
    dest: &mut D,
) -> Result<(), DbError> {
    if cursor.is_closed() {
        return Err(DbError::InvalidResult);
    }
    let columns = cursor.columns().to_vec();
    let shape = D::shape();
    if columns.is_empty() && matches!(shape.row, RowShape::Scalar | RowShape::Tuple) {
        cursor.close()?;
        return Err(DbError::BadDestination(format!(
            "{:?} destination needs at least one column",
            shape.row
        )));
    }

    let plan = <D::Row as RowTarget>::bind(&columns);
    let mut buffers = plan.buffers(&columns);
    let scanned = scan_rows(cursor, dest, &plan, &columns, &mut buffers);
    let closed = cursor.close();
    scanned.and(closed)
}

fn scan_rows<D: Destination>(
    cursor: &mut dyn Cursor,
    dest: &mut D,
    plan: &RowPlan,
    columns: &[Column],
    buffers: &mut [ScanBuffer],
) -> Result<(), DbError> {
    while cursor.next_row(buffers)? {
        dest.row().fill(plan, columns, buffers);
        if !D::MANY {
            break;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Key-value projection
// ---------------------------------------------------------------------------

/// Map destination for key-value projection.
pub trait KvMap {
    type Key: FieldValue;
    type Value: RowTarget + Default;

    /// Existing entry for `key`, or a fresh default one.
    fn entry_mut(&mut self, key: Self::Key) -> &mut Self::Value;
}

impl<K, V, S> KvMap for HashMap<K, V, S>
where
    K: FieldValue + Eq + Hash,
    V: RowTarget + Default,
    S: BuildHasher,
{
    type Key = K;
    type Value = V;

    fn entry_mut(&mut self, key: K) -> &mut V {
        self.entry(key).or_default()
    }
}

impl<K, V> KvMap for BTreeMap<K, V>
where
    K: FieldValue + Ord,
    V: RowTarget + Default,
{
    type Key = K;
    type Value = V;

    fn entry_mut(&mut self, key: K) -> &mut V {
        self.entry(key).or_default()
    }
}

/// First column is the key.
///
/// Record and map values are filled from the whole row and merged into an
/// existing entry; scalar and tuple values come from the remaining columns
/// and overwrite it. Rows with a NULL key are skipped. Keys not present in
/// the result are left alone.
pub fn materialize_kv<M: KvMap>(cursor: &mut dyn Cursor, map: &mut M) -> Result<(), DbError> {
    if cursor.is_closed() {
        return Err(DbError::InvalidResult);
    }
    let columns = cursor.columns().to_vec();
    let value_shape = <M::Value as RowTarget>::SHAPE;
    let offset = match value_shape {
        RowShape::Record | RowShape::Map => 0,
        RowShape::Scalar | RowShape::Tuple => 1,
    };
    if columns.len() <= offset {
        return cursor.close();
    }

    let mut plan = <M::Value as RowTarget>::bind(&columns[offset..]);
    if offset > 0 {
        let mut slots = vec![None; offset];
        slots.append(&mut plan.slots);
        plan.slots = slots;
    }
    let key_slot = Slot {
        target: 0,
        kind: <M::Key as FieldValue>::KIND,
        optional: <M::Key as FieldValue>::OPTIONAL,
    };
    let mut buffers = plan.buffers(&columns);
    if offset > 0 {
        buffers[0] = ScanBuffer::new(scan_hint(Some(key_slot), &columns[0]));
    }

    let scanned = scan_kv(cursor, map, &key_slot, &plan, &columns, &mut buffers);
    let closed = cursor.close();
    scanned.and(closed)
}

fn scan_kv<M: KvMap>(
    cursor: &mut dyn Cursor,
    map: &mut M,
    key_slot: &Slot,
    plan: &RowPlan,
    columns: &[Column],
    buffers: &mut [ScanBuffer],
) -> Result<(), DbError> {
    while cursor.next_row(buffers)? {
        let key = buffers[0]
            .value
            .clone()
            .and_then(|raw| decode(key_slot, &columns[0], raw))
            .and_then(<M::Key as FieldValue>::from_value);
        let Some(key) = key else {
            continue;
        };
        map.entry_mut(key).fill(plan, columns, buffers);
    }
    Ok(())
}
