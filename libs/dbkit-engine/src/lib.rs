mod base;
pub mod config;
pub mod db;
pub mod error;
pub mod logger;
pub mod pool;
pub mod registry;
pub mod sqlite;
pub mod stmt;
pub mod tx;

pub use config::{DbConfig, DbsConfig};
pub use db::Db;
pub use error::EngineError;
pub use registry::DbRegistry;
pub use stmt::Stmt;
pub use tx::Tx;
