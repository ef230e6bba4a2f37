#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Engine(#[from] dbkit_engine::EngineError),

    #[error("{0}")]
    Db(#[from] dbkit_api::DbError),

    #[error("invalid {context}: {detail}")]
    Input { context: &'static str, detail: String },

    #[error("output: {0}")]
    Output(#[from] std::io::Error),
}
