mod config;
mod error;

use clap::Parser;
use config::{Cli, Commands};

mod cmd;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = cmd::open(&cli.config, &cli.db).and_then(|db| {
        let mut out = std::io::stdout().lock();
        match cli.command {
            Commands::Query(args) => cmd::query::run(&db, args, &mut out),
            Commands::Exec(args) => cmd::exec::run(&db, args, &mut out),
            Commands::Insert(args) => cmd::write::insert(&db, args, &mut out),
            Commands::Update(args) => cmd::write::update(&db, args, &mut out),
        }
    });
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
