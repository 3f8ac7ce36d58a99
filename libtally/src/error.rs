use crate::amount::Amount;
use crate::ledger::{fmt_balance, Balance};

use std::fmt;
use std::path::PathBuf;

/// Where a journal line came from, 1-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A failed `assert` directive.
#[derive(Debug, thiserror::Error)]
pub enum AssertionFailure {
    #[error("balance of `{account}' is {}, expected {asserted}", fmt_balance(.computed))]
    Balance {
        account: String,
        computed: Balance,
        asserted: Amount,
    },

    #[error(
        "accounting equation does not hold: {} (assets + liabilities) != {} (-(equity + income + expenses))",
        fmt_balance(.left),
        fmt_balance(.right)
    )]
    Equation { left: Balance, right: Balance },
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Unrecognized line, malformed or unbalanced transaction, bad amount.
    #[error("{location}: {message}")]
    Parse { location: Location, message: String },

    #[error("{location}: assertion failed: {failure}")]
    Assertion {
        location: Location,
        failure: AssertionFailure,
    },

    /// Direct balance lookup on an account without any postings.
    #[error("account not found: `{0}'")]
    AccountNotFound(String),

    #[error("could not parse amount \"{0}\"")]
    AmountSyntax(String),

    #[error("cannot add amounts of different commodities: {left} and {right}")]
    MixedCommodities { left: String, right: String },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LedgerError {
    pub fn parse(location: Location, message: impl Into<String>) -> Self {
        LedgerError::Parse {
            location,
            message: message.into(),
        }
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, LedgerError::Assertion { .. })
    }

    /// File and line this error points at, if it comes from a journal line.
    pub fn location(&self) -> Option<&Location> {
        match self {
            LedgerError::Parse { location, .. } | LedgerError::Assertion { location, .. } => {
                Some(location)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
