//! Timed query/exec plumbing shared by `Db`, `Tx` and `Stmt`.

use std::time::Instant;

use dbkit_api::{DbError, ExecResult, QueryExecutor, QueryResult, StatementExecutor, Value};

use crate::logger::QueryLogger;

pub(crate) fn run_query(
    executor: &dyn QueryExecutor,
    logger: &QueryLogger,
    sql: &str,
    args: &[Value],
) -> Result<QueryResult, DbError> {
    let start = Instant::now();
    let outcome = executor.query(sql, args);
    let used_ms = used_ms(start);
    logger.record(&outcome, sql, args, used_ms);
    Ok(QueryResult::new(outcome?, sql, args.to_vec(), used_ms))
}

pub(crate) fn run_exec(
    executor: &dyn StatementExecutor,
    logger: &QueryLogger,
    sql: &str,
    args: &[Value],
) -> Result<ExecResult, DbError> {
    let start = Instant::now();
    let outcome = executor.exec(sql, args);
    let used_ms = used_ms(start);
    logger.record(&outcome, sql, args, used_ms);
    let outcome = outcome?;
    Ok(ExecResult::new(
        outcome.rows_affected,
        outcome.last_insert_id,
        sql,
        args.to_vec(),
        used_ms,
    ))
}

pub(crate) fn run_prepare(
    executor: &dyn StatementExecutor,
    logger: &QueryLogger,
    sql: &str,
) -> Result<(), DbError> {
    let outcome = executor.prepare(sql);
    if let Err(e) = &outcome {
        logger.log_error(e, sql, &[], -1.0);
    }
    outcome
}

fn used_ms(start: Instant) -> f32 {
    start.elapsed().as_secs_f32() * 1000.0
}
