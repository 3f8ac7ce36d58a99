use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tallybook",
    about = "Plain text double-entry ledger interpreter",
    version
)]
pub struct Cli {
    /// Journal file to load
    #[arg(short, long)]
    pub file: PathBuf,

    /// Parse `assert` directives without checking them
    #[arg(long, global = true)]
    pub no_assertions: bool,

    /// Only count entries dated up to and including this day (YYYY-MM-DD)
    #[arg(long, global = true, value_parser = parse_date)]
    pub asof: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse the journal and run its assertions
    Validate,
    /// Balance of every account
    Balance {
        /// Include parent accounts, summed over their children
        #[arg(long)]
        tree: bool,
    },
    /// Balance summed over every account starting with a prefix
    Children { prefix: String },
    /// Entries of one account with a running total, assertions are not checked
    Register { account: String },
    /// Year end balances, latest year first
    Years,
}

/// Journal dates are compared as strings, so only well formed days are let in.
fn parse_date(s: &str) -> Result<String, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|date| date.format("%Y-%m-%d").to_string())
        .map_err(|err| format!("`{}' is not a YYYY-MM-DD date: {}", s, err))
}
