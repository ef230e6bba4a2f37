use dbkit_api::DbError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("db error: {0}")]
    Db(#[from] DbError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database not configured: {0}")]
    UnknownDatabase(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Add context to the error.
    ///
    /// For the `Db` variant, context is added to the inner `DbError`.
    /// For other message variants, context is prepended to the message.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            EngineError::Db(e) => EngineError::Db(e.with_context(ctx)),
            EngineError::Config(msg) => EngineError::Config(format!("{ctx}: {msg}")),
            other => other,
        }
    }
}

/// Driver failures surface to the core as `DbError::Driver`.
pub(crate) fn driver_error(e: rusqlite::Error) -> DbError {
    DbError::driver(e.to_string())
}
