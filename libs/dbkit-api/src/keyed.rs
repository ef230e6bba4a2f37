use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::hash::BuildHasher;

use indexmap::IndexMap;

use crate::field::FieldValue;
use crate::value::Value;

/// Write-path source of (column, value) pairs for INSERT/REPLACE/UPDATE.
///
/// Struct sources yield their field table in declaration order. Hash-map
/// sources have no stable order; callers must not rely on column order.
pub trait KeyedData {
    fn keyed_values(&self) -> Vec<(String, Value)>;
}

impl<T: KeyedData + ?Sized> KeyedData for &T {
    fn keyed_values(&self) -> Vec<(String, Value)> {
        (**self).keyed_values()
    }
}

impl<K: Display, V: FieldValue, S: BuildHasher> KeyedData for HashMap<K, V, S> {
    fn keyed_values(&self) -> Vec<(String, Value)> {
        self.iter().map(|(k, v)| (k.to_string(), v.to_value())).collect()
    }
}

impl<K: Display, V: FieldValue> KeyedData for BTreeMap<K, V> {
    fn keyed_values(&self) -> Vec<(String, Value)> {
        self.iter().map(|(k, v)| (k.to_string(), v.to_value())).collect()
    }
}

impl<K: Display, V: FieldValue, S> KeyedData for IndexMap<K, V, S> {
    fn keyed_values(&self) -> Vec<(String, Value)> {
        self.iter().map(|(k, v)| (k.to_string(), v.to_value())).collect()
    }
}

impl<K: Display, V: FieldValue> KeyedData for [(K, V)] {
    fn keyed_values(&self) -> Vec<(String, Value)> {
        self.iter().map(|(k, v)| (k.to_string(), v.to_value())).collect()
    }
}

impl<K: Display, V: FieldValue> KeyedData for Vec<(K, V)> {
    fn keyed_values(&self) -> Vec<(String, Value)> {
        self.as_slice().keyed_values()
    }
}

impl KeyedData for serde_json::Map<String, serde_json::Value> {
    fn keyed_values(&self) -> Vec<(String, Value)> {
        self.iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v.clone())))
            .collect()
    }
}

/// Only objects carry columns; any other JSON value is an empty source.
impl KeyedData for serde_json::Value {
    fn keyed_values(&self) -> Vec<(String, Value)> {
        match self {
            serde_json::Value::Object(map) => map.keyed_values(),
            _ => Vec::new(),
        }
    }
}
