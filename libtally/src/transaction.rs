use crate::amount::Amount;
use crate::error::{LedgerError, Location, Result};
use crate::ledger::{Entry, Ledger};

use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// A transaction header, `date` is the effective (settlement) date.
#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub date: String,
    pub description: String,
    pub source: Location,
}

/// One posting line; `amount` is `None` for the implicit balancing posting.
#[derive(Clone, Debug, PartialEq)]
pub struct Posting {
    pub account: String,
    pub amount: Option<Amount>,
    pub source: Location,
}

fn overflow(txn: &Transaction, commodity: &str) -> LedgerError {
    LedgerError::parse(
        txn.source.clone(),
        format!("amount overflow: {} postings exceed what the ledger can sum", commodity),
    )
}

fn entry(txn: &Transaction, amount: Amount) -> Entry {
    Entry {
        description: txn.description.clone(),
        amount,
    }
}

impl Ledger {
    /// Balances `postings` and records them under `txn.date`.
    ///
    /// The blank posting, or the current bucket when there is none, absorbs
    /// whatever is left per commodity. Nothing is recorded if the transaction
    /// is rejected.
    pub fn commit(&mut self, txn: &Transaction, postings: &[Posting]) -> Result<()> {
        self.balance_and_post(txn, postings, true)
    }

    fn balance_and_post(
        &mut self,
        txn: &Transaction,
        postings: &[Posting],
        resolve_aliases: bool,
    ) -> Result<()> {
        if postings.is_empty() || (postings.len() == 1 && postings[0].amount.is_none()) {
            return Err(LedgerError::parse(
                txn.source.clone(),
                format!("transaction `{}' has nothing to balance", txn.description),
            ));
        }

        let mut balancing: Option<&str> = None;
        let mut totals: IndexMap<&str, Decimal> = IndexMap::new();
        let mut entries: Vec<(&str, &Amount)> = Vec::with_capacity(postings.len() + 1);

        for posting in postings {
            let account = if resolve_aliases {
                self.resolve(&posting.account)
            } else {
                posting.account.as_str()
            };
            match &posting.amount {
                // a blank posting on the bucket itself can still be overridden
                None if balancing.is_some() && balancing != self.bucket() => {
                    return Err(LedgerError::parse(
                        posting.source.clone(),
                        "cannot have multiple empty posts",
                    ));
                }
                None => balancing = Some(account),
                Some(amount) => {
                    let total = totals.entry(amount.commodity.as_str()).or_default();
                    *total = total
                        .checked_add(amount.value)
                        .ok_or_else(|| overflow(txn, &amount.commodity))?;
                    entries.push((account, amount));
                }
            }
        }

        let balancing = balancing.or(self.bucket());
        let mut residuals = Vec::new();
        for (commodity, total) in totals {
            if total.is_zero() {
                continue;
            }
            match balancing {
                Some(account) => residuals.push((account, Amount::new(commodity, -total))),
                None => {
                    return Err(LedgerError::parse(
                        txn.source.clone(),
                        format!(
                            "transaction does not balance: {} {} outstanding",
                            total, commodity
                        ),
                    ));
                }
            }
        }

        let mut records: Vec<(String, Entry)> = entries
            .into_iter()
            .map(|(account, amount)| (account.to_string(), entry(txn, amount.clone())))
            .collect();
        records.extend(
            residuals
                .into_iter()
                .map(|(account, amount)| (account.to_string(), entry(txn, amount))),
        );

        if let Some(commodity) =
            self.overflowing_commodity(records.iter().map(|(_, entry)| &entry.amount))
        {
            return Err(overflow(txn, commodity));
        }

        for (account, entry) in records {
            self.post(&account, &txn.date, entry);
        }

        Ok(())
    }

    /// Zeroes every account starting with `prefix` as of `date`, parking the
    /// total in `closing`.
    pub fn close_all(
        &mut self,
        date: &str,
        prefix: &str,
        closing: &str,
        source: &Location,
    ) -> Result<()> {
        let mut postings = Vec::new();
        for account in self.accounts_with_prefix(prefix) {
            for (commodity, value) in self.balance(account, Some(date))? {
                if value.is_zero() {
                    continue;
                }
                postings.push(Posting {
                    account: account.to_string(),
                    amount: Some(Amount::new(commodity, -value)),
                    source: source.clone(),
                });
            }
        }

        if postings.is_empty() {
            warn!(prefix, date, "closeall: nothing to close");
            return Ok(());
        }

        debug!(prefix, date, closing, postings = postings.len(), "closeall");
        // reversals target stored names, only the closing account is user input
        postings.push(Posting {
            account: self.resolve(closing).to_string(),
            amount: None,
            source: source.clone(),
        });

        let txn = Transaction {
            date: date.to_string(),
            description: format!("Closing {} into {}", prefix, closing),
            source: source.clone(),
        };
        self.balance_and_post(&txn, &postings, false)
    }
}
