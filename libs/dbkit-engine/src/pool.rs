use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use dbkit_api::{Cursor, DbError, ExecOutcome, QueryExecutor, StatementExecutor, Value};

use crate::error::EngineError;
use crate::sqlite::SqliteConn;

const DEFAULT_SIZE: usize = 4;

#[derive(Debug)]
struct Slot {
    conn: Mutex<SqliteConn>,
    /// Thread currently holding `conn`.
    owner: Mutex<Option<ThreadId>>,
}

impl Slot {
    fn owner(&self) -> MutexGuard<'_, Option<ThreadId>> {
        match self.owner.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("connection owner lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Fixed set of connections to one host.
///
/// Connections are handed out round-robin, skipping busy ones; when all are
/// busy the caller waits on the next one held by another thread. A thread
/// that already holds every connection (an open `Tx` on a one-connection
/// pool) gets `BadConnection` instead of waiting on itself.
#[derive(Debug)]
pub struct Pool {
    host: String,
    slots: Vec<Slot>,
    next: AtomicUsize,
}

/// A connection borrowed from a [`Pool`] until dropped.
pub struct PooledConn<'a> {
    conn: MutexGuard<'a, SqliteConn>,
    slot: &'a Slot,
}

impl Deref for PooledConn<'_> {
    type Target = SqliteConn;

    fn deref(&self) -> &SqliteConn {
        &self.conn
    }
}

impl Drop for PooledConn<'_> {
    fn drop(&mut self) {
        *self.slot.owner() = None;
    }
}

impl Pool {
    /// Open `size` connections (`0` picks the default). An in-memory database
    /// is private to its connection, so it always gets exactly one.
    pub fn open(host: &str, size: usize, readonly: bool) -> Result<Self, EngineError> {
        let size = if host == ":memory:" {
            1
        } else if size == 0 {
            DEFAULT_SIZE
        } else {
            size
        };
        let slots = (0..size)
            .map(|_| {
                SqliteConn::open(host, readonly).map(|conn| Slot {
                    conn: Mutex::new(conn),
                    owner: Mutex::new(None),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(host = %host, size, readonly, "opened connection pool");
        Ok(Self {
            host: host.to_string(),
            slots,
            next: AtomicUsize::new(0),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Borrow a connection until the returned handle drops.
    pub fn get(&self) -> Result<PooledConn<'_>, DbError> {
        let me = thread::current().id();
        let size = self.slots.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % size;
        let order = (0..size).map(|offset| &self.slots[(start + offset) % size]);

        for slot in order.clone() {
            if let Ok(conn) = slot.conn.try_lock() {
                return Ok(self.claim(slot, conn, me));
            }
        }

        let Some(slot) = order.clone().find(|slot| *slot.owner() != Some(me)) else {
            tracing::warn!(host = %self.host, "every connection is held by the calling thread");
            return Err(DbError::BadConnection);
        };
        let conn = match slot.conn.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!(host = %self.host, "connection lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        Ok(self.claim(slot, conn, me))
    }

    fn claim<'a>(&self, slot: &'a Slot, conn: MutexGuard<'a, SqliteConn>, me: ThreadId) -> PooledConn<'a> {
        *slot.owner() = Some(me);
        PooledConn { conn, slot }
    }
}

impl QueryExecutor for Pool {
    fn query(&self, sql: &str, args: &[Value]) -> Result<Box<dyn Cursor + Send>, DbError> {
        self.get()?.query(sql, args)
    }
}

impl StatementExecutor for Pool {
    fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecOutcome, DbError> {
        self.get()?.exec(sql, args)
    }

    /// Validated on one connection; the others compile it on first use.
    fn prepare(&self, sql: &str) -> Result<(), DbError> {
        self.get()?.prepare(sql)
    }
}
