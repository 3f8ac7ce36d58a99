//! Tally - A plain text double-entry ledger interpreter
//! ---
//!
//! Reads a line oriented journal of transactions and directives, balances every
//! transaction per commodity, and answers point in time balance queries over a
//! `:` separated account hierarchy.
//!
//! ```text
//! bucket Assets:Checking
//!
//! 2015-01-30=2015-02-02 Bookstore
//!     Expenses:Books  ($18.40 * 1.13)
//!
//! assert balance 2015-02-28 Expenses:Books  $20.79
//! ```
//!

extern crate pest;
#[macro_use]
extern crate pest_derive;

/// Amounts and the amount expression evaluator, e.g. `($3.20 * 1.0609)`.
pub mod amount;

/// `assert balance` and `assert equation` checks.
pub mod assertion;

pub mod error;

/// Ledger store and balance queries.
///
/// The main structure is [`Ledger`][ledger::Ledger], which owns every posted
/// entry together with the alias, bucket and commodity state built up while
/// parsing.
pub mod ledger;

/// Our main parser entrypoints.
pub mod parser;

mod statement;

/// Transaction balancing and `closeall`.
pub mod transaction;

pub use error::{AssertionFailure, LedgerError, Location, Result};
pub use ledger::{Balance, Ledger, LedgerOptions};
pub use parser::{parse, parse_file};
pub use statement::Equation;
