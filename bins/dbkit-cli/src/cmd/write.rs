use std::io::Write;

use dbkit_engine::Db;

use crate::cmd::{parse_args, parse_object, print_exec};
use crate::config::{InsertArgs, UpdateArgs};
use crate::error::CliError;

pub fn insert(db: &Db, args: InsertArgs, out: &mut impl Write) -> Result<(), CliError> {
    let data = parse_object(&args.data)?;
    let result = if args.replace {
        db.replace(&args.table, &data)?
    } else {
        db.insert(&args.table, &data)?
    };
    print_exec(&result, out)
}

pub fn update(db: &Db, args: UpdateArgs, out: &mut impl Write) -> Result<(), CliError> {
    let data = parse_object(&args.data)?;
    if args.where_clause.is_empty() {
        tracing::warn!(table = %args.table, "update without a where clause touches every row");
    }
    let result = db.update(&args.table, &data, &args.where_clause, &parse_args(&args.args))?;
    print_exec(&result, out)
}
