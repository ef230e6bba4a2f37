pub mod exec;
pub mod query;
pub mod write;

use std::io::Write;
use std::sync::Arc;

use dbkit_api::{ExecResult, Value};
use dbkit_engine::{Db, DbRegistry};

use crate::error::CliError;

/// Resolve `db` through the config file, or directly when it is a URL.
pub fn open(config: &str, db: &str) -> Result<Arc<Db>, CliError> {
    let registry = if db.contains("://") {
        DbRegistry::default()
    } else {
        tracing::debug!(config = %config, "loading configuration");
        DbRegistry::load(config)?
    };
    Ok(registry.get(db)?)
}

/// `--arg` values: JSON literals decode, anything else binds as text.
pub fn parse_arg(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from_json(json),
        Err(_) => Value::Text(raw.to_string()),
    }
}

pub fn parse_args(raw: &[String]) -> Vec<Value> {
    raw.iter().map(|a| parse_arg(a)).collect()
}

pub fn parse_object(raw: &str) -> Result<serde_json::Map<String, serde_json::Value>, CliError> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(CliError::Input {
            context: "data",
            detail: "expected a JSON object".to_string(),
        }),
        Err(e) => Err(CliError::Input {
            context: "data",
            detail: e.to_string(),
        }),
    }
}

pub fn print_exec(result: &ExecResult, out: &mut impl Write) -> Result<(), CliError> {
    let summary = serde_json::json!({ "changes": result.changes(), "id": result.id() });
    writeln!(out, "{summary}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_decode_json_literals() {
        assert_eq!(parse_arg("12"), Value::Int(12));
        assert_eq!(parse_arg("1.5"), Value::Float(1.5));
        assert_eq!(parse_arg("true"), Value::Bool(true));
        assert_eq!(parse_arg("null"), Value::Null);
        assert_eq!(parse_arg(r#""12""#), Value::Text("12".into()));
        assert_eq!(parse_arg("tom"), Value::Text("tom".into()));
    }

    #[test]
    fn data_must_be_an_object() {
        assert!(parse_object(r#"{"a":1}"#).is_ok());
        assert!(matches!(parse_object("[1]"), Err(CliError::Input { .. })));
        assert!(matches!(parse_object("{"), Err(CliError::Input { .. })));
    }

    #[test]
    fn named_database_needs_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbkit.toml");
        std::fs::write(&path, "[databases.main]\nhost = \":memory:\"\n").unwrap();
        let config = path.to_string_lossy();
        assert!(open(&config, "main").is_ok());
        assert!(matches!(open(&config, "other"), Err(CliError::Engine(_))));
        assert!(open("missing.toml", "sqlite://:memory:").is_ok());
    }
}
