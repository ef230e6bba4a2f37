use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dbkit", about = "Run SQL against a configured database and print JSON")]
pub struct Cli {
    /// Path to the TOML file with `[databases.<name>]` tables.
    #[arg(long, default_value = "dbkit.toml", env = "DBKIT_CONFIG")]
    pub config: String,

    /// Database name from the config file, or a `sqlite://` URL.
    #[arg(long, env = "DBKIT_DB")]
    pub db: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a query and print one JSON object per row
    Query(SqlArgs),
    /// Run a statement and print the change count
    Exec(SqlArgs),
    /// Insert a JSON object as one row
    Insert(InsertArgs),
    /// Update rows from a JSON object
    Update(UpdateArgs),
}

#[derive(Args, Clone, Debug)]
pub struct SqlArgs {
    pub sql: String,
    /// Bound parameter; JSON literals are decoded, anything else is text.
    #[arg(long = "arg")]
    pub args: Vec<String>,
}

#[derive(Args, Clone, Debug)]
pub struct InsertArgs {
    pub table: String,
    /// Column values as a JSON object.
    pub data: String,
    /// Overwrite the row with the same unique key.
    #[arg(long)]
    pub replace: bool,
}

#[derive(Args, Clone, Debug)]
pub struct UpdateArgs {
    pub table: String,
    /// Column values as a JSON object.
    pub data: String,
    /// Condition without the `where` keyword. Omitted means every row.
    #[arg(long = "where", default_value = "")]
    pub where_clause: String,
    /// Parameter for the condition.
    #[arg(long = "arg")]
    pub args: Vec<String>,
}
