//! Typed accessors over a query's cursor.
//!
//! Every accessor consumes the cursor: a second call on the same result
//! reports [`DbError::InvalidResult`].

use indexmap::IndexMap;

use crate::column::{Column, Cursor};
use crate::error::DbError;
use crate::materialize::{Destination, KvMap, Tuple, materialize, materialize_kv};
use crate::value::Value;

pub struct QueryResult {
    cursor: Option<Box<dyn Cursor + Send>>,
    sql: String,
    args: Vec<Value>,
    used_ms: f32,
}

impl std::fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("sql", &self.sql)
            .field("args", &self.args)
            .field("used_ms", &self.used_ms)
            .field("consumed", &self.cursor.is_none())
            .finish()
    }
}

impl QueryResult {
    pub fn new(cursor: Box<dyn Cursor + Send>, sql: impl Into<String>, args: Vec<Value>, used_ms: f32) -> Self {
        Self {
            cursor: Some(cursor),
            sql: sql.into(),
            args,
            used_ms,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Milliseconds spent in the driver.
    pub fn used_ms(&self) -> f32 {
        self.used_ms
    }

    pub fn columns(&self) -> Result<&[Column], DbError> {
        self.cursor
            .as_deref()
            .map(|c| c.columns())
            .ok_or(DbError::InvalidResult)
    }

    /// Materialize into any destination.
    pub fn to<D: Destination>(&mut self, dest: &mut D) -> Result<(), DbError> {
        let mut cursor = self.take()?;
        materialize(&mut *cursor, dest)
    }

    /// Key-value projection; the first column is the key.
    pub fn to_kv<M: KvMap>(&mut self, map: &mut M) -> Result<(), DbError> {
        let mut cursor = self.take()?;
        materialize_kv(&mut *cursor, map)
    }

    /// Every row as column → natural value, in column order.
    pub fn map_results(&mut self) -> Result<Vec<IndexMap<String, Value>>, DbError> {
        self.collect()
    }

    pub fn slice_results(&mut self) -> Result<Vec<Vec<Value>>, DbError> {
        self.collect()
    }

    pub fn string_map_results(&mut self) -> Result<Vec<IndexMap<String, String>>, DbError> {
        self.collect()
    }

    pub fn string_slice_results(&mut self) -> Result<Vec<Vec<String>>, DbError> {
        self.collect()
    }

    pub fn map_on_r1(&mut self) -> Result<IndexMap<String, Value>, DbError> {
        self.first()
    }

    /// First row as a tuple of values.
    pub fn slice_on_r1(&mut self) -> Result<Vec<Value>, DbError> {
        let mut row = Tuple::default();
        self.to(&mut row)?;
        Ok(row.0)
    }

    pub fn ints_on_c1(&mut self) -> Result<Vec<i64>, DbError> {
        self.collect()
    }

    pub fn strings_on_c1(&mut self) -> Result<Vec<String>, DbError> {
        self.collect()
    }

    pub fn int_on_r1c1(&mut self) -> Result<i64, DbError> {
        self.first()
    }

    pub fn string_on_r1c1(&mut self) -> Result<String, DbError> {
        self.first()
    }

    pub fn float_on_r1c1(&mut self) -> Result<f64, DbError> {
        self.first()
    }

    fn collect<R>(&mut self) -> Result<Vec<R>, DbError>
    where
        Vec<R>: Destination,
    {
        let mut rows = Vec::new();
        self.to(&mut rows)?;
        Ok(rows)
    }

    fn first<D: Destination + Default>(&mut self) -> Result<D, DbError> {
        let mut value = D::default();
        self.to(&mut value)?;
        Ok(value)
    }

    fn take(&mut self) -> Result<Box<dyn Cursor + Send>, DbError> {
        self.cursor.take().ok_or(DbError::InvalidResult)
    }
}

impl Drop for QueryResult {
    fn drop(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            if cursor.is_closed() {
                return;
            }
            if let Err(e) = cursor.close() {
                tracing::warn!(sql = %self.sql, error = %e, "failed to close abandoned result");
            }
        }
    }
}

/// Outcome of a statement, with the SQL that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecResult {
    changes: u64,
    id: i64,
    sql: String,
    args: Vec<Value>,
    used_ms: f32,
}

impl ExecResult {
    pub fn new(changes: u64, id: i64, sql: impl Into<String>, args: Vec<Value>, used_ms: f32) -> Self {
        Self {
            changes,
            id,
            sql: sql.into(),
            args,
            used_ms,
        }
    }

    /// Rows affected.
    pub fn changes(&self) -> u64 {
        self.changes
    }

    /// Last generated identifier.
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn used_ms(&self) -> f32 {
        self.used_ms
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::column::{MemoryCursor, ScanBuffer};
    use crate::value::Kind;

    /// Counts `close()` calls after the cursor has been boxed away.
    struct CountingCursor {
        inner: MemoryCursor,
        closes: Arc<AtomicUsize>,
    }

    impl Cursor for CountingCursor {
        fn columns(&self) -> &[Column] {
            self.inner.columns()
        }

        fn next_row(&mut self, buffers: &mut [ScanBuffer]) -> Result<bool, DbError> {
            self.inner.next_row(buffers)
        }

        fn close(&mut self) -> Result<(), DbError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close()
        }

        fn is_closed(&self) -> bool {
            self.inner.is_closed()
        }
    }

    fn counted(rows: Vec<Vec<Value>>) -> (QueryResult, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let columns = vec![Column::new("name", "TEXT", Kind::Any)];
        let cursor = CountingCursor {
            inner: MemoryCursor::new(columns, rows),
            closes: Arc::clone(&closes),
        };
        (QueryResult::new(Box::new(cursor), "select name from t", vec![], 0.0), closes)
    }

    fn result(rows: Vec<Vec<Value>>) -> QueryResult {
        let columns = vec![
            Column::new("name", "TEXT", Kind::Any),
            Column::new("score", "REAL", Kind::Any),
        ];
        QueryResult::new(Box::new(MemoryCursor::new(columns, rows)), "select name, score from t", vec![], 0.5)
    }

    fn rows() -> Vec<Vec<Value>> {
        vec![
            vec![Value::from("a"), Value::Float(1.5)],
            vec![Value::from("b"), Value::Null],
        ]
    }

    #[test]
    fn map_results_keep_column_order() {
        let maps = result(rows()).map_results().unwrap();
        assert_eq!(maps.len(), 2);
        let keys: Vec<_> = maps[0].keys().cloned().collect();
        assert_eq!(keys, vec!["name", "score"]);
        assert_eq!(maps[1]["score"], Value::Null);
    }

    #[test]
    fn string_accessors() {
        let maps = result(rows()).string_map_results().unwrap();
        assert_eq!(maps[0]["score"], "1.5");
        assert_eq!(maps[1]["score"], "");
        let slices = result(rows()).string_slice_results().unwrap();
        assert_eq!(slices[1], vec!["b", ""]);
        assert_eq!(result(rows()).strings_on_c1().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn first_row_accessors() {
        assert_eq!(result(rows()).string_on_r1c1().unwrap(), "a");
        assert_eq!(result(rows()).map_on_r1().unwrap()["score"], Value::Float(1.5));
        assert_eq!(result(rows()).slice_on_r1().unwrap(), vec![Value::from("a"), Value::Float(1.5)]);
        assert_eq!(result(vec![]).int_on_r1c1().unwrap(), 0);
    }

    #[test]
    fn numeric_first_column() {
        let columns = vec![Column::new("n", "INTEGER", Kind::Int64)];
        let rows = vec![vec![Value::Int(3)], vec![Value::Int(4)]];
        let mut r = QueryResult::new(Box::new(MemoryCursor::new(columns, rows)), "select n", vec![], 0.0);
        assert_eq!(r.ints_on_c1().unwrap(), vec![3, 4]);
    }

    #[test]
    fn float_on_r1c1_coerces_text() {
        let columns = vec![Column::new("n", "TEXT", Kind::Any)];
        let rows = vec![vec![Value::from("2.25")]];
        let mut r = QueryResult::new(Box::new(MemoryCursor::new(columns, rows)), "select n", vec![], 0.0);
        assert_eq!(r.float_on_r1c1().unwrap(), 2.25);
    }

    #[test]
    fn consumed_result_is_invalid() {
        let mut r = result(rows());
        assert!(r.columns().is_ok());
        r.slice_results().unwrap();
        assert_eq!(r.slice_results(), Err(DbError::InvalidResult));
        assert_eq!(r.columns().unwrap_err(), DbError::InvalidResult);
    }

    #[test]
    fn kv_projection_through_result() {
        let mut map: HashMap<String, f64> = HashMap::new();
        result(rows()).to_kv(&mut map).unwrap();
        assert_eq!(map["a"], 1.5);
        assert_eq!(map["b"], 0.0);
    }

    #[test]
    fn abandoned_result_closes_its_cursor_once() {
        let (r, closes) = counted(vec![vec![Value::from("a")], vec![Value::from("b")]]);
        drop(r);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn consumed_result_does_not_close_again() {
        let (mut r, closes) = counted(vec![vec![Value::from("a")], vec![Value::from("b")]]);
        assert_eq!(r.strings_on_c1().unwrap(), vec!["a", "b"]);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        drop(r);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_scan_still_closes_once() {
        let (mut r, closes) = counted(vec![vec![Value::from("1")], vec![Value::from("oops")]]);
        assert!(matches!(r.ints_on_c1(), Err(DbError::Scan { .. })));
        drop(r);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
