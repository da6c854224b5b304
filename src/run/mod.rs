mod ignore;
mod lun;
mod network;
mod storage;

use std::time::Instant;

use colored::Colorize;
use serde_json::Value;

use s390dev::config::Config;
use s390dev::entity::{Action, Report};
use s390dev::errors::S390Error;
use s390dev::host::Host;
use s390dev::{sanity, tape};

use crate::cli;

pub fn run(cli_args: cli::Cli) -> Result<(), S390Error> {
    let mut config = Config::load(cli_args.config.as_deref())?;
    if let Some(root) = cli_args.root {
        config.root = root;
    }

    if !sanity::is_root() {
        eprintln!("{}", "WARN: running as non-root user".yellow())
    }

    for cmd in sanity::missing_commands() {
        eprintln!("{}", format!("WARN: {cmd} not found in PATH").yellow())
    }

    let host = Host::system(&config);

    let output = match cli_args.commands {
        cli::Commands::Storage(cmd) => storage::run(&host, cmd),
        cli::Commands::Network(cmd) => network::run(&host, cmd),
        cli::Commands::Lun(cmd) => lun::run(&host, cmd),
        cli::Commands::Lunscan(cmd) => lun::run_scan(&host, cmd),
        cli::Commands::Ignore(cmd) => ignore::run(&host, cmd),
        cli::Commands::Tape(cli::CmdTape::List) => to_json(tape::list_tapes(&host)?),
    }?;

    println!("{output:#}");
    Ok(())
}

/// Runs a transition and reports the actions it performed
fn transition<F>(operation: &str, target: &str, f: F) -> Result<Value, S390Error>
where
    F: FnOnce() -> Result<Vec<Action>, S390Error>,
{
    let start = Instant::now();
    let actions = f()?;

    let report = Report {
        operation: operation.to_string(),
        target: target.to_string(),
        actions,
        duration: start.elapsed(),
    };

    Ok(report.to_json())
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, S390Error> {
    Ok(serde_json::json!(value))
}
