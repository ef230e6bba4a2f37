use crate::column::Cursor;
use crate::error::DbError;
use crate::value::Value;

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_id: i64,
}

/// Runs a query and hands back a live cursor.
pub trait QueryExecutor {
    fn query(&self, sql: &str, args: &[Value]) -> Result<Box<dyn Cursor + Send>, DbError>;
}

/// Runs INSERT/UPDATE/DELETE and other row-less statements.
pub trait StatementExecutor {
    fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome, DbError>;

    /// Validate `sql` ahead of repeated execution.
    fn prepare(&self, _sql: &str) -> Result<(), DbError> {
        Ok(())
    }
}
