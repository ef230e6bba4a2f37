use std::io::Write;

use dbkit_engine::Db;

use crate::cmd::parse_args;
use crate::config::SqlArgs;
use crate::error::CliError;

pub fn run(db: &Db, args: SqlArgs, out: &mut impl Write) -> Result<(), CliError> {
    let params = parse_args(&args.args);
    let rows = db.query(&args.sql, &params)?.map_results()?;
    for row in &rows {
        let line = serde_json::to_string(row).map_err(|e| CliError::Input {
            context: "row",
            detail: e.to_string(),
        })?;
        writeln!(out, "{line}")?;
    }
    tracing::debug!(rows = rows.len(), "query done");
    Ok(())
}
