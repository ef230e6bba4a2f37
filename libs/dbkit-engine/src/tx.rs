use dbkit_api::{DbError, ExecResult, KeyedData, QueryResult, StatementBuilder, Value};

use crate::base;
use crate::logger::QueryLogger;
use crate::pool::PooledConn;
use crate::stmt::Stmt;

/// A transaction on one primary connection, held until the `Tx` drops.
///
/// Commit and rollback after the transaction is finished are no-ops. A
/// transaction dropped unfinished is rolled back.
pub struct Tx<'a> {
    conn: PooledConn<'a>,
    logger: &'a QueryLogger,
    builder: StatementBuilder,
    finished: bool,
}

impl<'a> Tx<'a> {
    pub(crate) fn begin(
        conn: PooledConn<'a>,
        logger: &'a QueryLogger,
        builder: StatementBuilder,
    ) -> Result<Self, DbError> {
        if let Err(e) = conn.execute_batch("BEGIN") {
            logger.log_error(&e, "BEGIN", &[], -1.0);
            return Err(e);
        }
        Ok(Self {
            conn,
            logger,
            builder,
            finished: false,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn commit(&mut self) -> Result<(), DbError> {
        self.end("COMMIT")
    }

    pub fn rollback(&mut self) -> Result<(), DbError> {
        self.end("ROLLBACK")
    }

    /// Commit when `ok`, otherwise roll back.
    pub fn finish(&mut self, ok: bool) -> Result<(), DbError> {
        if ok { self.commit() } else { self.rollback() }
    }

    /// Roll back a transaction that was left open.
    pub fn check_finished(&mut self) -> Result<(), DbError> {
        if self.finished {
            return Ok(());
        }
        tracing::warn!(db = %self.logger.dsn(), "transaction not finished, rolling back");
        self.rollback()
    }

    fn end(&mut self, sql: &str) -> Result<(), DbError> {
        if self.finished {
            return Ok(());
        }
        match self.conn.execute_batch(sql) {
            Ok(()) => {
                self.finished = true;
                Ok(())
            }
            Err(e) => {
                self.logger.log_error(&e, sql, &[], -1.0);
                Err(e)
            }
        }
    }

    fn check_open(&self) -> Result<(), DbError> {
        if self.finished {
            Err(DbError::BadConnection)
        } else {
            Ok(())
        }
    }

    pub fn query(&self, sql: &str, args: &[Value]) -> Result<QueryResult, DbError> {
        self.check_open()?;
        base::run_query(&*self.conn, self.logger, sql, args)
    }

    pub fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult, DbError> {
        self.check_open()?;
        base::run_exec(&*self.conn, self.logger, sql, args)
    }

    pub fn insert<D: KeyedData + ?Sized>(&self, table: &str, data: &D) -> Result<ExecResult, DbError> {
        let (sql, values) = self.builder.build_insert(table, data, false);
        self.exec(&sql, &values)
    }

    pub fn replace<D: KeyedData + ?Sized>(&self, table: &str, data: &D) -> Result<ExecResult, DbError> {
        let (sql, values) = self.builder.build_insert(table, data, true);
        self.exec(&sql, &values)
    }

    pub fn update<D: KeyedData + ?Sized>(
        &self,
        table: &str,
        data: &D,
        where_clause: &str,
        args: &[Value],
    ) -> Result<ExecResult, DbError> {
        let (sql, values) = self.builder.build_update(table, data, where_clause, args);
        self.exec(&sql, &values)
    }

    pub fn delete(&self, table: &str, where_clause: &str, args: &[Value]) -> Result<ExecResult, DbError> {
        let (sql, values) = self.builder.build_delete(table, where_clause, args);
        self.exec(&sql, &values)
    }

    /// A statement bound to this transaction's connection.
    pub fn prepare(&self, sql: &str) -> Result<Stmt<'_>, DbError> {
        self.check_open()?;
        Stmt::prepare(&*self.conn, self.logger, sql)
    }

    pub fn quote(&self, name: &str) -> String {
        self.builder.quote(name)
    }
}

impl Drop for Tx<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!(db = %self.logger.dsn(), "transaction dropped unfinished, rolling back");
        if let Err(e) = self.rollback() {
            tracing::error!(db = %self.logger.dsn(), error = %e, "rollback on drop failed");
        }
    }
}
