use rand::Rng;

use dbkit_api::{Dialect, DbError, ExecResult, KeyedData, QueryResult, StatementBuilder, Value, in_keys};

use crate::base;
use crate::config::DbConfig;
use crate::error::EngineError;
use crate::logger::QueryLogger;
use crate::pool::Pool;
use crate::stmt::Stmt;
use crate::tx::Tx;

/// A database: one primary pool plus read-only replica pools.
///
/// Queries go to a random replica when any are open, otherwise to the
/// primary. Statements and transactions always use the primary.
#[derive(Debug)]
pub struct Db {
    config: DbConfig,
    primary: Pool,
    replicas: Vec<Pool>,
    logger: QueryLogger,
    builder: StatementBuilder,
}

impl Db {
    pub fn open(config: DbConfig) -> Result<Self, EngineError> {
        if !config.is_sqlite() {
            return Err(EngineError::Config(format!(
                "unsupported database type '{}'",
                config.kind
            )));
        }
        let logger = QueryLogger::new(config.dsn(), config.slow_threshold());
        let primary = Pool::open(&config.host, config.max_opens, false)
            .map_err(|e| e.with_context(logger.dsn()))?;

        let mut replicas = Vec::with_capacity(config.readonly_hosts.len());
        for host in &config.readonly_hosts {
            match Pool::open(host, config.max_opens, true) {
                Ok(pool) => replicas.push(pool),
                Err(e) => {
                    tracing::error!(db = %logger.dsn(), host = %host, error = %e, "failed to open replica, skipping");
                }
            }
        }

        let builder = StatementBuilder::new(Dialect {
            quote: config.quote.unwrap_or(Dialect::BACKTICK.quote),
        });
        tracing::info!(db = %logger.dsn(), replicas = replicas.len(), "opened database");
        Ok(Self {
            config,
            primary,
            replicas,
            logger,
            builder,
        })
    }

    pub fn from_url(url: &str) -> Result<Self, EngineError> {
        Self::open(DbConfig::from_url(url)?)
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn dsn(&self) -> &str {
        self.logger.dsn()
    }

    pub fn builder(&self) -> &StatementBuilder {
        &self.builder
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    fn read_pool(&self) -> &Pool {
        match self.replicas.len() {
            0 => &self.primary,
            1 => &self.replicas[0],
            n => &self.replicas[rand::thread_rng().gen_range(0..n)],
        }
    }

    pub fn query(&self, sql: &str, args: &[Value]) -> Result<QueryResult, DbError> {
        base::run_query(self.read_pool(), &self.logger, sql, args)
    }

    pub fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult, DbError> {
        base::run_exec(&self.primary, &self.logger, sql, args)
    }

    pub fn insert<D: KeyedData + ?Sized>(&self, table: &str, data: &D) -> Result<ExecResult, DbError> {
        let (sql, values) = self.builder.build_insert(table, data, false);
        self.exec(&sql, &values)
    }

    /// Insert, or overwrite the row with the same unique key.
    pub fn replace<D: KeyedData + ?Sized>(&self, table: &str, data: &D) -> Result<ExecResult, DbError> {
        let (sql, values) = self.builder.build_insert(table, data, true);
        self.exec(&sql, &values)
    }

    /// An empty `where_clause` updates every row.
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

    pub fn prepare(&self, sql: &str) -> Result<Stmt<'_>, DbError> {
        Stmt::prepare(&self.primary, &self.logger, sql)
    }

    /// Start a transaction; it holds one primary connection until dropped.
    ///
    /// While it is open, primary calls made on the same thread use the other
    /// connections, and fail with `BadConnection` when there are none.
    pub fn begin(&self) -> Result<Tx<'_>, DbError> {
        Tx::begin(self.primary.get()?, &self.logger, self.builder)
    }

    pub fn in_keys(&self, n: usize) -> String {
        in_keys(n)
    }

    pub fn quote(&self, name: &str) -> String {
        self.builder.quote(name)
    }
}
