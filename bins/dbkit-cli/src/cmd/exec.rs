use std::io::Write;

use dbkit_engine::Db;

use crate::cmd::{parse_args, print_exec};
use crate::config::SqlArgs;
use crate::error::CliError;

pub fn run(db: &Db, args: SqlArgs, out: &mut impl Write) -> Result<(), CliError> {
    let result = db.exec(&args.sql, &parse_args(&args.args))?;
    print_exec(&result, out)
}
