use crate::amount::parse_amount;
use crate::error::{LedgerError, Location, Result};
use crate::ledger::Ledger;
use crate::statement::Statement;
use crate::transaction::{Posting, Transaction};

use pest::Parser;
use tracing::{debug, info};

use std::convert::TryFrom;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[grammar = "journal.pest"]
pub struct LedgerParser;

/// Deepest `include` chain followed before giving up.
pub const MAX_INCLUDE_DEPTH: usize = 64;

/// Parses journal text into `ledger`. `filename` is used for error locations
/// and to resolve relative `include` paths.
pub fn parse(input: &str, filename: &str, ledger: &mut Ledger) -> Result<()> {
    JournalReader::new(ledger, filename, 0).read(input)
}

pub fn parse_file(path: &Path, ledger: &mut Ledger) -> Result<()> {
    read_file(path, ledger, 0)
}

fn read_file(path: &Path, ledger: &mut Ledger, depth: usize) -> Result<()> {
    let content = fs::read_to_string(path).map_err(|source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    JournalReader::new(ledger, &path.to_string_lossy(), depth).read(&content)
}

/// Line by line state machine over one journal file.
///
/// A transaction stays open while indented posting lines follow its header;
/// the first line that is not a posting commits it and is then dispatched
/// as a directive.
struct JournalReader<'l> {
    ledger: &'l mut Ledger,
    file: String,
    depth: usize,
    transaction: Option<Transaction>,
    postings: Vec<Posting>,
    in_account_block: bool,
}

impl<'l> JournalReader<'l> {
    fn new(ledger: &'l mut Ledger, file: &str, depth: usize) -> Self {
        Self {
            ledger,
            file: file.to_string(),
            depth,
            transaction: None,
            postings: Vec::new(),
            in_account_block: false,
        }
    }

    fn read(mut self, input: &str) -> Result<()> {
        for (idx, line) in input.lines().enumerate() {
            self.feed(idx + 1, line.trim_end())?;
        }
        self.close_transaction()
    }

    fn location(&self, line: usize) -> Location {
        Location::new(self.file.as_str(), line)
    }

    fn feed(&mut self, lineno: usize, line: &str) -> Result<()> {
        if line.is_empty() || LedgerParser::parse(Rule::comment, line).is_ok() {
            return Ok(());
        }

        if self.transaction.is_some() {
            if let Some(posting) = self.posting(lineno, line)? {
                self.postings.push(posting);
                return Ok(());
            }
            self.close_transaction()?;
        }

        if self.in_account_block {
            if LedgerParser::parse(Rule::indented, line).is_ok() {
                return Ok(());
            }
            self.in_account_block = false;
        }

        let statement = LedgerParser::parse(Rule::directive, line)
            .ok()
            .and_then(|mut pairs| pairs.next())
            .ok_or_else(|| {
                LedgerError::parse(self.location(lineno), format!("unrecognized line: {}", line))
            })?;
        let statement = Statement::try_from(statement)
            .map_err(|message| LedgerError::parse(self.location(lineno), message))?;

        self.dispatch(lineno, statement)
    }

    /// `None` when the line does not have the shape of a posting.
    fn posting(&self, lineno: usize, line: &str) -> Result<Option<Posting>> {
        let mut pairs = match LedgerParser::parse(Rule::posting, line) {
            Ok(pairs) => pairs,
            Err(_) => return Ok(None),
        };
        let fields = match pairs.next() {
            Some(posting) => posting.into_inner(),
            None => return Ok(None),
        };

        let mut account = None;
        let mut amount = None;
        for field in fields {
            match field.as_rule() {
                Rule::account => account = Some(field.as_str()),
                Rule::amount_text => {
                    amount = Some(parse_amount(field.as_str()).map_err(|err| {
                        LedgerError::parse(self.location(lineno), err.to_string())
                    })?)
                }
                _ => {}
            }
        }

        Ok(account.map(|account| Posting {
            account: account.to_string(),
            amount,
            source: self.location(lineno),
        }))
    }

    fn close_transaction(&mut self) -> Result<()> {
        if let Some(txn) = self.transaction.take() {
            let postings = std::mem::take(&mut self.postings);
            self.ledger.commit(&txn, &postings)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, lineno: usize, statement: Statement<'_>) -> Result<()> {
        match statement {
            Statement::Header {
                effective,
                description,
                ..
            } => {
                self.transaction = Some(Transaction {
                    date: effective.to_string(),
                    description: description.to_string(),
                    source: self.location(lineno),
                });
            }
            Statement::Commodity(_) => {}
            Statement::Account(_) => self.in_account_block = true,
            Statement::Include(path) => self.include(lineno, path)?,
            Statement::Bucket(account) => self.ledger.set_bucket(account),
            Statement::Print(text) => {
                info!(target: "tally::print", "{}", text);
                self.ledger.push_message(text);
            }
            Statement::Alias(from, to) => self.ledger.set_alias(from, to),
            Statement::CloseAll {
                date,
                prefix,
                closing,
            } => {
                let location = self.location(lineno);
                self.ledger.close_all(date, prefix, closing, &location)?;
            }
            Statement::AssertBalance {
                date,
                account,
                amount,
            } => {
                if !self.ledger.options().assertions {
                    return Ok(());
                }
                let amount = parse_amount(amount)
                    .map_err(|err| LedgerError::parse(self.location(lineno), err.to_string()))?;
                self.ledger
                    .check_balance(account, date, &amount)
                    .map_err(|failure| LedgerError::Assertion {
                        location: self.location(lineno),
                        failure,
                    })?;
            }
            Statement::AssertEquation { date, equation } => {
                if !self.ledger.options().assertions {
                    return Ok(());
                }
                self.ledger
                    .check_equation(&equation, date)
                    .map_err(|failure| LedgerError::Assertion {
                        location: self.location(lineno),
                        failure,
                    })?;
            }
        }

        Ok(())
    }

    fn include(&mut self, lineno: usize, path: &str) -> Result<()> {
        if self.depth >= MAX_INCLUDE_DEPTH {
            return Err(LedgerError::parse(
                self.location(lineno),
                format!("include nested deeper than {} files", MAX_INCLUDE_DEPTH),
            ));
        }

        let path = self.resolve_include(path);
        debug!(path = %path.display(), from = %self.file, "include");
        read_file(&path, self.ledger, self.depth + 1).map_err(|err| match err {
            LedgerError::Io { path, source } => LedgerError::parse(
                self.location(lineno),
                format!("cannot include {}: {}", path.display(), source),
            ),
            err => err,
        })
    }

    fn resolve_include(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match Path::new(&self.file).parent() {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::LedgerError;
    use crate::ledger::{Balance, Ledger, LedgerOptions};
    use crate::parser::{parse, parse_file};

    use anyhow::Result;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use std::fs;

    fn balance_of(pairs: &[(&str, Decimal)]) -> Balance {
        pairs.iter().map(|(c, v)| (c.to_string(), *v)).collect()
    }

    fn journal(input: &str) -> Result<Ledger, LedgerError> {
        let mut ledger = Ledger::new();
        parse(input, "TESTDATA", &mut ledger)?;
        Ok(ledger)
    }

    #[test]
    fn reject_free_text() {
        let data = "
        Line1
            Line2
            Line3
        ";
        assert!(matches!(journal(data), Err(LedgerError::Parse { .. })));
    }

    #[test]
    fn reject_header_without_postings() {
        let err = journal("2015-06-01 Dummy Transaction").unwrap_err();
        assert!(matches!(&err, LedgerError::Parse { location, .. } if location.line == 1));
    }

    #[test]
    fn unrecognized_line_reports_location() {
        let err = journal("; fine\n\ncommodity CAD\nwhat is this\n").unwrap_err();
        assert_eq!(format!("{}", err), "TESTDATA:4: unrecognized line: what is this");
    }

    #[test]
    fn children_balance_and_destination() -> Result<()> {
        let ledger = journal(
            "2015-01-01 Opening
    Source:Account1  $50
    Source:Account2  50 CAD
    Source:Account3  $50
    DestAccount
",
        )?;

        assert_eq!(
            ledger.balance_children("Source", None),
            balance_of(&[("$", dec!(100)), ("CAD", dec!(50))])
        );
        assert_eq!(
            ledger.balance("DestAccount", None)?,
            balance_of(&[("$", dec!(-100)), ("CAD", dec!(-50))])
        );
        Ok(())
    }

    #[test]
    fn rounding_in_posting_amounts() -> Result<()> {
        let ledger = journal(
            "2015-01-01 Interest
    Source:A  ($3.20 * 1.0609)
    Source:B  ($3.20 * 1.0610)
    Dest
",
        )?;

        assert_eq!(ledger.balance("Source:A", None)?, balance_of(&[("$", dec!(3.39))]));
        assert_eq!(ledger.balance("Source:B", None)?, balance_of(&[("$", dec!(3.40))]));
        assert_eq!(ledger.balance("Dest", None)?, balance_of(&[("$", dec!(-6.79))]));
        Ok(())
    }

    #[test]
    fn bucket_receives_single_postings() -> Result<()> {
        let ledger = journal(
            "bucket Dest
2015-01-01 First
    Source  $50
bucket Dest2
2015-01-02 Second
    Source  $50
",
        )?;

        assert_eq!(ledger.balance("Dest", None)?, balance_of(&[("$", dec!(-50))]));
        assert_eq!(ledger.balance("Dest2", None)?, balance_of(&[("$", dec!(-50))]));
        assert_eq!(ledger.bucket(), Some("Dest2"));
        Ok(())
    }

    #[test]
    fn untouched_bucket_is_not_an_account() -> Result<()> {
        let ledger = journal(
            "bucket Dest
2015-01-01 Balanced
    Source  $50
    Other  $-50
",
        )?;

        assert!(matches!(
            ledger.balance("Dest", None),
            Err(LedgerError::AccountNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn effective_date_is_the_second_date() -> Result<()> {
        let ledger = journal(
            "2015-01-30=2015-02-02 Card charge
    Expenses:Books  $20
    Liabilities:Card
",
        )?;

        assert_eq!(ledger.balance("Expenses:Books", Some("2015-01-31"))?, Balance::new());
        assert_eq!(
            ledger.balance("Expenses:Books", Some("2015-02-02"))?,
            balance_of(&[("$", dec!(20))])
        );
        assert_eq!(ledger.startdate(), Some("2015-02-02"));
        Ok(())
    }

    #[test]
    fn blank_and_comment_lines_keep_the_transaction_open() -> Result<()> {
        let ledger = journal(
            "2015-01-01 Groceries
    Expenses:Food  $12.50

    ; paid cash
    # really
    Assets:Cash
",
        )?;

        assert_eq!(ledger.balance("Assets:Cash", None)?, balance_of(&[("$", dec!(-12.50))]));
        Ok(())
    }

    #[test]
    fn out_of_order_transactions() -> Result<()> {
        let ledger = journal(
            "2015-03-01 Later
    Assets:Cash  $30
    Income
2015-01-01 Earlier
    Assets:Cash  $10
    Income
assert balance 2015-02-01 Assets:Cash  $10
assert balance Assets:Cash  $40
",
        )?;

        assert_eq!(ledger.balance("Assets:Cash", Some("2015-02-28"))?, balance_of(&[("$", dec!(10))]));
        Ok(())
    }

    #[test]
    fn account_blocks_and_commodities_are_skipped() -> Result<()> {
        let ledger = journal(
            "commodity CAD
account Assets:Bank
    note main account
    type asset
2015-01-01 Deposit
    Assets:Bank  50 CAD
    Income
",
        )?;

        assert_eq!(ledger.balance("Assets:Bank", None)?, balance_of(&[("CAD", dec!(50))]));
        Ok(())
    }

    #[test]
    fn aliases_apply_to_later_postings() -> Result<()> {
        let ledger = journal(
            "alias cash Assets:Cash
2015-01-01 Lunch
    Expenses:Food  $10
    cash
",
        )?;

        assert_eq!(ledger.balance("Assets:Cash", None)?, balance_of(&[("$", dec!(-10))]));
        assert!(ledger.balance("cash", None).is_err());
        Ok(())
    }

    #[test]
    fn print_goes_to_messages() -> Result<()> {
        let ledger = journal("print starting 2015\nprint done\n")?;
        assert_eq!(ledger.messages(), &["starting 2015".to_string(), "done".to_string()]);
        Ok(())
    }

    #[test]
    fn closeall_zeroes_the_prefix() -> Result<()> {
        let ledger = journal(
            "2014-05-01 Setup
    Source  $10
    Source:Account1  $50
    Source:Account2  50 CAD
    Source:Account3  $50
    Source:Account1  10 CAD
    Source:Account3  5 CAD
    Source  15 CAD
    DestAccount
closeall 2015-01-01 Source  DestAccount2
assert balance Source  $0
assert balance Source:Account2  0 CAD
",
        )?;

        for account in ["Source", "Source:Account1", "Source:Account3"] {
            assert_eq!(
                ledger.balance(account, None)?,
                balance_of(&[("$", dec!(0)), ("CAD", dec!(0))])
            );
        }
        assert_eq!(
            ledger.balance("DestAccount2", None)?,
            balance_of(&[("$", dec!(110)), ("CAD", dec!(80))])
        );
        Ok(())
    }

    #[test]
    fn failed_balance_assertion() {
        let err = journal(
            "2015-01-01 Deposit
    Assets:Bank  $100
    Income
assert balance Assets:Bank  $99
",
        )
        .unwrap_err();

        assert!(err.is_assertion());
        assert_eq!(err.location().map(|l| l.line), Some(4));
    }

    #[test]
    fn failed_equation_assertion() {
        let err = journal(
            "2015-01-01 Gift
    Co:Assets:Bank  $100
    Elsewhere
assert equation Co:Assets - Co:Liabilities = Co:Equity + Co:Income - Co:Expenses
",
        )
        .unwrap_err();

        assert!(err.is_assertion());
    }

    #[test]
    fn assertions_can_be_disabled() -> Result<()> {
        let mut ledger = Ledger::with_options(LedgerOptions { assertions: false });
        parse(
            "2015-01-01 Deposit
    Assets:Bank  $100
    Income
assert balance Assets:Bank  $99
assert equation A - L = E + I - X
",
            "TESTDATA",
            &mut ledger,
        )?;
        Ok(())
    }

    #[test]
    fn bad_amount_is_a_parse_error_at_the_posting() {
        let err = journal(
            "2015-01-01 Deposit
    Assets:Bank  100
    Income
",
        )
        .unwrap_err();
        assert!(matches!(&err, LedgerError::Parse { location, .. } if location.line == 2));
    }

    #[test]
    fn second_blank_posting_is_rejected() {
        let err = journal(
            "2015-01-01 Deposit
    Assets:Bank  $100
    Income
    Equity
",
        )
        .unwrap_err();
        assert!(format!("{}", err).ends_with("cannot have multiple empty posts"));
    }

    #[test]
    fn indented_line_outside_transaction_is_rejected() {
        assert!(matches!(
            journal("commodity CAD\n    Assets:Bank  $5\n"),
            Err(LedgerError::Parse { .. })
        ));
    }

    #[test]
    fn includes_share_state() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join("setup.ledger"),
            "alias bank Assets:Bank\nbucket Equity:Opening\n",
        )?;
        fs::write(
            dir.path().join("main.ledger"),
            "include setup.ledger
2015-01-01 Opening balance
    bank  $500
assert balance Equity:Opening  $-500
",
        )?;

        let mut ledger = Ledger::new();
        parse_file(&dir.path().join("main.ledger"), &mut ledger)?;

        assert_eq!(ledger.balance("Assets:Bank", None)?, balance_of(&[("$", dec!(500))]));
        assert_eq!(ledger.bucket(), Some("Equity:Opening"));
        Ok(())
    }

    #[test]
    fn missing_include_points_at_the_directive() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let main = dir.path().join("main.ledger");
        fs::write(&main, "commodity CAD\ninclude nope.ledger\n")?;

        let mut ledger = Ledger::new();
        let err = parse_file(&main, &mut ledger).unwrap_err();
        assert!(matches!(&err, LedgerError::Parse { location, .. } if location.line == 2));
        Ok(())
    }

    #[test]
    fn cyclic_include_is_cut_off() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let main = dir.path().join("loop.ledger");
        fs::write(&main, "include loop.ledger\n")?;

        let mut ledger = Ledger::new();
        assert!(matches!(
            parse_file(&main, &mut ledger),
            Err(LedgerError::Parse { .. })
        ));
        Ok(())
    }

    #[test]
    fn indented_keywords_inside_a_transaction_are_postings() -> Result<()> {
        let ledger = journal(
            "2015-01-01 Keywords
    bucket X  $5
    print Y  $2
    Assets:Cash
",
        )?;

        assert_eq!(ledger.balance("bucket X", None)?, balance_of(&[("$", dec!(5))]));
        assert_eq!(ledger.balance("print Y", None)?, balance_of(&[("$", dec!(2))]));
        assert_eq!(ledger.balance("Assets:Cash", None)?, balance_of(&[("$", dec!(-7))]));
        assert_eq!(ledger.bucket(), None);
        assert!(ledger.messages().is_empty());
        Ok(())
    }

    #[test]
    fn messages_survive_a_later_failure() {
        let mut ledger = Ledger::new();
        let err = parse(
            "print before\nwhat is this\nprint after\n",
            "TESTDATA",
            &mut ledger,
        )
        .unwrap_err();

        assert_eq!(err.location().map(|l| l.line), Some(2));
        assert_eq!(ledger.messages(), &["before".to_string()]);
    }

    #[test]
    fn closeall_ignores_aliases_set_after_posting() -> Result<()> {
        let ledger = journal(
            "2014-05-01 Setup
    Source:Account1  $50
    DestAccount
alias Source:Account1 Elsewhere
closeall 2015-01-01 Source  DestAccount2
",
        )?;

        assert_eq!(ledger.balance("Source:Account1", None)?, balance_of(&[("$", dec!(0))]));
        assert_eq!(ledger.balance("DestAccount2", None)?, balance_of(&[("$", dec!(50))]));
        assert!(matches!(
            ledger.balance("Elsewhere", None),
            Err(LedgerError::AccountNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn overflowing_totals_are_rejected() {
        let mut ledger = Ledger::new();
        let err = parse(
            "2015-01-01 Big
    A  $79228162514264337593543950335
    B  $79228162514264337593543950335
    C
",
            "TESTDATA",
            &mut ledger,
        )
        .unwrap_err();

        assert!(matches!(&err, LedgerError::Parse { location, .. } if location.line == 1));
        assert!(ledger.accounts().is_empty());
    }

    #[test]
    fn overflowing_account_volume_is_rejected() {
        let mut ledger = Ledger::new();
        let err = parse(
            "2015-01-01 Big
    A  $79228162514264337593543950335
    B
2015-01-02 Bigger
    A  $79228162514264337593543950335
    C
",
            "TESTDATA",
            &mut ledger,
        )
        .unwrap_err();

        assert!(matches!(err, LedgerError::Parse { .. }));
        // queries stay usable whatever was admitted
        let _ = ledger.balance("A", None);
        let _ = ledger.balance_children("", None);
        let _ = ledger.rollup(None);
    }

    #[test]
    fn large_amounts_within_capacity_still_post() -> Result<()> {
        let ledger = journal(
            "2015-01-01 Big
    A  $1,000,000,000,000.00
    B
2015-01-02 Big again
    A  $1,000,000,000,000.00
    B
",
        )?;

        assert_eq!(
            ledger.balance("A", None)?,
            balance_of(&[("$", dec!(2000000000000))])
        );
        Ok(())
    }

    #[test]
    fn every_transaction_nets_to_zero() -> Result<()> {
        let ledger = journal(
            "bucket Assets:Checking
2015-01-01 Salary
    Income:Salary  $-2,500.00
2015-01-02 Mixed
    Expenses:Travel  120 CAD
    Expenses:Food  ($12.10 + $3.05)
    Liabilities:Card
2015-01-03 Fx
    Expenses:Fees  ($10 * 0.015)
",
        )?;

        let mut net = Balance::new();
        for balance in ledger.balances(None).values() {
            for (commodity, value) in balance {
                *net.entry(commodity.clone()).or_default() += *value;
            }
        }
        assert!(net.values().all(|v| v.is_zero()), "{:?}", net);
        Ok(())
    }
}
