use libtally::{Balance, Ledger};
use rust_decimal::Decimal;

use std::collections::BTreeMap;
use std::fmt::{self, Write};

const COLUMN: usize = 12;

fn cell(out: &mut impl Write, value: Option<&Decimal>) -> fmt::Result {
    match value {
        Some(value) => write!(out, " {:>width$.2}", value, width = COLUMN),
        None => write!(out, " {:width$}", "", width = COLUMN),
    }
}

/// Accounts down, commodities across in the order they were first posted.
pub fn balance_table(
    out: &mut impl Write,
    ledger: &Ledger,
    balances: &BTreeMap<String, Balance>,
) -> fmt::Result {
    let width = balances.keys().map(|a| a.len()).max().unwrap_or(0).max("Account".len()) + 1;
    let commodities = ledger.commodities();

    write!(out, "{:<width$}", "Account", width = width)?;
    for commodity in commodities {
        write!(out, " {:>width$}", commodity, width = COLUMN)?;
    }
    writeln!(out)?;
    writeln!(out, "{}", "-".repeat(width + commodities.len() * (COLUMN + 1)))?;

    for (account, balance) in balances {
        write!(out, "{:.<width$}", account, width = width)?;
        for commodity in commodities {
            cell(out, balance.get(commodity))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn single_balance(out: &mut impl Write, balance: &Balance) -> fmt::Result {
    for (commodity, value) in balance {
        writeln!(out, "{:>width$} {:.2}", commodity, value, width = 6)?;
    }
    Ok(())
}

pub fn register(
    out: &mut impl Write,
    ledger: &Ledger,
    account: &str,
    asof: Option<&str>,
) -> anyhow::Result<()> {
    for row in ledger.register(account, asof)? {
        writeln!(
            out,
            "{} {:<40} {:>width$.2} {:>width$.2} {}",
            row.date,
            row.description,
            row.amount.value,
            row.running,
            row.amount.commodity,
            width = COLUMN,
        )?;
    }
    Ok(())
}

/// One table per year, as of December 31st, from the last year with entries
/// back to the first.
pub fn years(out: &mut impl Write, ledger: &Ledger) -> fmt::Result {
    let (Some(start), Some(end)) = (ledger.startdate(), ledger.enddate()) else {
        return Ok(());
    };
    let year = |date: &str| date.get(..4).and_then(|y| y.parse::<u32>().ok());
    let (Some(first), Some(last)) = (year(start), year(end)) else {
        return Ok(());
    };

    for year in (first..=last).rev() {
        let asof = format!("{:04}-12-31", year);
        writeln!(out, "== {} ==", year)?;
        balance_table(out, ledger, &ledger.rollup(Some(asof.as_str())))?;
        writeln!(out)?;
    }
    Ok(())
}
