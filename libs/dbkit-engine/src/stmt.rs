use dbkit_api::{DbError, ExecResult, StatementExecutor, Value};

use crate::base;
use crate::logger::QueryLogger;

/// A statement validated once and executed many times.
///
/// The compiled form lives in the driver's per-connection statement cache.
pub struct Stmt<'a> {
    executor: &'a dyn StatementExecutor,
    logger: &'a QueryLogger,
    sql: String,
    closed: bool,
}

impl<'a> Stmt<'a> {
    pub(crate) fn prepare(
        executor: &'a dyn StatementExecutor,
        logger: &'a QueryLogger,
        sql: &str,
    ) -> Result<Self, DbError> {
        base::run_prepare(executor, logger, sql)?;
        Ok(Self {
            executor,
            logger,
            sql: sql.to_string(),
            closed: false,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn exec(&self, args: &[Value]) -> Result<ExecResult, DbError> {
        if self.closed {
            return Err(DbError::BadConnection);
        }
        base::run_exec(self.executor, self.logger, &self.sql, args)
    }

    /// Further `exec` calls fail with `BadConnection`.
    pub fn close(&mut self) -> Result<(), DbError> {
        if self.closed {
            return Err(DbError::BadConnection);
        }
        self.closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for Stmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stmt")
            .field("sql", &self.sql)
            .field("closed", &self.closed)
            .finish()
    }
}
