use std::time::Duration;

use dbkit_api::{DbError, Value};

/// Error and slow-query sink for one database.
#[derive(Debug, Clone)]
pub struct QueryLogger {
    dsn: String,
    slow: Duration,
}

impl QueryLogger {
    pub fn new(dsn: impl Into<String>, slow: Duration) -> Self {
        Self {
            dsn: dsn.into(),
            slow,
        }
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow
    }

    pub fn is_slow(&self, used_ms: f32) -> bool {
        used_ms >= self.slow.as_secs_f32() * 1000.0
    }

    pub fn log_error(&self, error: &DbError, sql: &str, args: &[Value], used_ms: f32) {
        tracing::error!(db = %self.dsn, sql = %sql, args = ?args, used_ms, error = %error, "query failed");
    }

    pub fn log_slow(&self, sql: &str, args: &[Value], used_ms: f32) {
        tracing::warn!(db = %self.dsn, sql = %sql, args = ?args, used_ms, "slow query");
    }

    /// Log the outcome of one call: errors always, successes only when slow.
    pub fn record<T>(&self, outcome: &Result<T, DbError>, sql: &str, args: &[Value], used_ms: f32) {
        match outcome {
            Err(e) => self.log_error(e, sql, args, used_ms),
            Ok(_) if self.is_slow(used_ms) => self.log_slow(sql, args, used_ms),
            Ok(_) => tracing::trace!(db = %self.dsn, sql = %sql, used_ms, "query"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_threshold_is_inclusive() {
        let logger = QueryLogger::new("sqlite://:memory:", Duration::from_millis(500));
        assert!(logger.is_slow(500.0));
        assert!(logger.is_slow(812.5));
        assert!(!logger.is_slow(499.9));
    }
}
