use std::collections::VecDeque;

use crate::coerce;
use crate::error::DbError;
use crate::value::{Kind, Value};

/// Column descriptor, produced by the driver once per query.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    /// Declared database type name (`DATE`, `DATETIME`, `VARCHAR`, ...). May be empty.
    type_name: String,
    /// Natural scan kind. `Any` when the driver decides per cell.
    scan_kind: Kind,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, scan_kind: Kind) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            scan_kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn scan_kind(&self) -> Kind {
        self.scan_kind
    }
}

/// Per-column decode target, reused for every row of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanBuffer {
    /// Kind the driver should convert the cell into. `Any` keeps the natural value.
    pub hint: Kind,
    /// `None` until a row is scanned; `Some(Value::Null)` for SQL NULL.
    pub value: Option<Value>,
}

impl ScanBuffer {
    pub fn new(hint: Kind) -> Self {
        Self { hint, value: None }
    }
}

/// Live handle over a streaming result set.
///
/// Owned by exactly one materialization at a time; must be closed once.
pub trait Cursor {
    fn columns(&self) -> &[Column];

    /// Fetch the next row into `buffers` (one per column).
    ///
    /// Returns `Ok(false)` when the result set is exhausted.
    fn next_row(&mut self, buffers: &mut [ScanBuffer]) -> Result<bool, DbError>;

    /// Release the result set. Remaining rows are discarded.
    fn close(&mut self) -> Result<(), DbError>;

    fn is_closed(&self) -> bool;
}

/// Cursor over rows already held in memory.
///
/// Cells are converted into the buffer hints with driver semantics
/// ([`coerce::scan`]), so a mismatch is a scan failure.
#[derive(Debug, Default)]
pub struct MemoryCursor {
    columns: Vec<Column>,
    rows: VecDeque<Vec<Value>>,
    closed: bool,
    close_calls: usize,
}

impl MemoryCursor {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            closed: false,
            close_calls: 0,
        }
    }

    /// Rows not yet fetched.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// How many times `close` has been called.
    pub fn close_calls(&self) -> usize {
        self.close_calls
    }
}

impl Cursor for MemoryCursor {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_row(&mut self, buffers: &mut [ScanBuffer]) -> Result<bool, DbError> {
        if self.closed {
            return Err(DbError::InvalidResult);
        }
        let Some(row) = self.rows.pop_front() else {
            return Ok(false);
        };
        for (index, (buffer, cell)) in buffers.iter_mut().zip(row).enumerate() {
            let value = coerce::scan(cell, buffer.hint).map_err(|reason| {
                let column = self.columns.get(index).map(Column::name).unwrap_or_default();
                DbError::scan(column, reason)
            })?;
            buffer.value = Some(value);
        }
        Ok(true)
    }

    fn close(&mut self) -> Result<(), DbError> {
        self.close_calls += 1;
        self.closed = true;
        self.rows.clear();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
