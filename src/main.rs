mod cli;
mod run;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();

    if let Err(err) = run::run(args) {
        eprintln!("{}", format!("ERROR: {err}").red());
        eprintln!("{:#}", err.to_json());
        std::process::exit(1);
    }
}
