//! Command line front end for the tally ledger interpreter.

use clap::Parser;
use libtally::{Ledger, LedgerOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::process::ExitCode;

mod cli;
mod report;

use cli::{Cli, Command};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Command::Validate);
    // a register is read while books are still provisional
    let assertions = !cli.no_assertions && !matches!(command, Command::Register { .. });

    let mut ledger = Ledger::with_options(LedgerOptions { assertions });
    let loaded = libtally::parse_file(&cli.file, &mut ledger);

    // printed even when loading fails, they mark how far the journal got
    for message in ledger.messages() {
        println!("{}", message);
    }
    loaded?;
    tracing::debug!(
        accounts = ledger.accounts().len(),
        commodities = ledger.commodities().len(),
        "journal loaded"
    );

    let asof = cli.asof.as_deref();
    let mut out = String::new();
    match command {
        Command::Validate => {}
        Command::Balance { tree: false } => {
            report::balance_table(&mut out, &ledger, &ledger.balances(asof))?
        }
        Command::Balance { tree: true } => {
            report::balance_table(&mut out, &ledger, &ledger.rollup(asof))?
        }
        Command::Children { prefix } => {
            report::single_balance(&mut out, &ledger.balance_children(&prefix, asof))?
        }
        Command::Register { account } => report::register(&mut out, &ledger, &account, asof)?,
        Command::Years => report::years(&mut out, &ledger)?,
    }
    print!("{}", out);

    Ok(())
}
