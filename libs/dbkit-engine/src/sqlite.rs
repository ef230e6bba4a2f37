//! SQLite connection: the query and statement executor over `rusqlite`.

use std::time::Duration;

use dbkit_api::temporal;
use dbkit_api::{Column, Cursor, DbError, ExecOutcome, Kind, MemoryCursor, QueryExecutor, StatementExecutor, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OpenFlags, params_from_iter};

use crate::error::{EngineError, driver_error};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteConn {
    conn: Connection,
}

impl std::fmt::Debug for SqliteConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConn")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteConn {
    /// Open `path` (`:memory:` for a private in-memory database).
    pub fn open(path: &str, readonly: bool) -> Result<Self, EngineError> {
        let flags = if readonly {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::default()
        };
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| EngineError::from(e).with_context(path))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    /// Run statements that take no arguments (transaction control, DDL scripts).
    pub fn execute_batch(&self, sql: &str) -> Result<(), DbError> {
        self.conn.execute_batch(sql).map_err(driver_error)
    }

    pub fn is_autocommit(&self) -> bool {
        self.conn.is_autocommit()
    }
}

impl QueryExecutor for SqliteConn {
    /// Rows are read eagerly; the returned cursor holds no connection.
    fn query(&self, sql: &str, args: &[Value]) -> Result<Box<dyn Cursor + Send>, DbError> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(driver_error)?;
        let columns: Vec<Column> = stmt
            .columns()
            .iter()
            .map(|c| Column::new(c.name(), c.decl_type().unwrap_or_default(), Kind::Any))
            .collect();

        let mut rows = stmt
            .query(params_from_iter(args.iter().map(to_sql)))
            .map_err(driver_error)?;
        let mut data = Vec::new();
        while let Some(row) = rows.next().map_err(driver_error)? {
            let mut cells = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                cells.push(from_sql(row.get_ref(index).map_err(driver_error)?));
            }
            data.push(cells);
        }
        Ok(Box::new(MemoryCursor::new(columns, data)))
    }
}

impl StatementExecutor for SqliteConn {
    fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome, DbError> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(driver_error)?;
        let changes = stmt
            .execute(params_from_iter(args.iter().map(to_sql)))
            .map_err(driver_error)?;
        Ok(ExecOutcome {
            rows_affected: changes as u64,
            last_insert_id: self.conn.last_insert_rowid(),
        })
    }

    /// Compiles the statement into the connection's statement cache.
    fn prepare(&self, sql: &str) -> Result<(), DbError> {
        self.conn.prepare_cached(sql).map(|_| ()).map_err(driver_error)
    }
}

/// Bind a value. SQLite has no bool, time or u64 storage class.
fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Int(v) => SqlValue::Integer(*v),
        Value::UInt(v) => match i64::try_from(*v) {
            Ok(v) => SqlValue::Integer(v),
            Err(_) => SqlValue::Text(v.to_string()),
        },
        Value::Float(v) => SqlValue::Real(*v),
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::Time(t) => SqlValue::Text(temporal::format_datetime(t)),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(b) => Value::Text(String::from_utf8_lossy(b).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_and_reads_back() {
        let conn = SqliteConn::open(":memory:", false).unwrap();
        conn.execute_batch("create table t (id integer primary key, name text, at datetime, flag boolean)")
            .unwrap();
        let at = temporal::parse_datetime("2024-01-02 03:04:05").unwrap();
        let out = conn
            .exec(
                "insert into t (name, at, flag) values (?, ?, ?)",
                &[Value::from("a"), Value::Time(at), Value::Bool(true)],
            )
            .unwrap();
        assert_eq!(out.rows_affected, 1);
        assert_eq!(out.last_insert_id, 1);

        let mut cursor = conn.query("select name, at, flag from t", &[]).unwrap();
        assert_eq!(cursor.columns()[1].type_name(), "datetime");
        let mut buffers = vec![dbkit_api::ScanBuffer::new(Kind::Any); 3];
        assert!(cursor.next_row(&mut buffers).unwrap());
        assert_eq!(buffers[0].value, Some(Value::from("a")));
        assert_eq!(buffers[1].value, Some(Value::from("2024-01-02 03:04:05")));
        assert_eq!(buffers[2].value, Some(Value::Int(1)));
        assert!(!cursor.next_row(&mut buffers).unwrap());
    }

    #[test]
    fn bad_sql_is_a_driver_error() {
        let conn = SqliteConn::open(":memory:", false).unwrap();
        assert!(matches!(conn.query("selec 1", &[]), Err(DbError::Driver(_))));
        assert!(matches!(conn.prepare("nonsense"), Err(DbError::Driver(_))));
    }

    #[test]
    fn huge_unsigned_binds_as_text() {
        assert_eq!(to_sql(&Value::UInt(u64::MAX)), SqlValue::Text(u64::MAX.to_string()));
        assert_eq!(to_sql(&Value::UInt(5)), SqlValue::Integer(5));
    }
}
