use crate::amount::Amount;
use crate::error::{LedgerError, Result};

use indexmap::IndexSet;
use rust_decimal::Decimal;
use tracing::{debug, trace};

use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Commodity to summed value.
pub type Balance = BTreeMap<String, Decimal>;

pub(crate) fn fmt_balance(balance: &Balance) -> String {
    let amounts: Vec<String> = balance
        .iter()
        .map(|(commodity, value)| format!("{}", Amount::new(commodity.as_str(), *value)))
        .collect();
    format!("{{{}}}", amounts.join(", "))
}

fn sum_until(dates: &BTreeMap<String, Vec<Entry>>, asof: Option<&str>) -> Balance {
    let mut balance = Balance::new();
    for (date, entries) in dates {
        if asof.is_some_and(|asof| date.as_str() > asof) {
            break;
        }
        for entry in entries {
            *balance.entry(entry.amount.commodity.clone()).or_default() += entry.amount.value;
        }
    }
    balance
}

/// Summed magnitude of every posting in one commodity may not exceed this.
///
/// Any balance, prefix sum or rollup is bounded by that volume, and each side
/// of the accounting equation adds at most three groups, so none of the
/// queries can overflow.
pub(crate) fn volume_limit() -> Decimal {
    Decimal::MAX / Decimal::from(5u8)
}

fn accumulate(balance: &mut Balance, other: &Balance) {
    for (commodity, value) in other {
        *balance.entry(commodity.clone()).or_default() += *value;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub description: String,
    pub amount: Amount,
}

/// One line of an account register.
#[derive(Debug, PartialEq)]
pub struct RegisterRow<'l> {
    pub date: &'l str,
    pub description: &'l str,
    pub amount: &'l Amount,
    /// Running total of `amount.commodity` after this entry.
    pub running: Decimal,
}

#[derive(Clone, Debug)]
pub struct LedgerOptions {
    /// When false, `assert` directives are parsed but not evaluated.
    pub assertions: bool,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self { assertions: true }
    }
}

/// Postings indexed by account, then by date.
///
/// Dates are `YYYY-MM-DD` strings and only ever compared as strings, so the
/// inner `BTreeMap` iterates them chronologically.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: BTreeMap<String, BTreeMap<String, Vec<Entry>>>,
    aliases: HashMap<String, String>,
    commodities: IndexSet<String>,
    volume: HashMap<String, Decimal>,
    bucket: Option<String>,
    messages: Vec<String>,
    options: LedgerOptions,
}

impl Ledger {
    pub fn new() -> Ledger {
        Self::with_options(LedgerOptions::default())
    }

    pub fn with_options(options: LedgerOptions) -> Ledger {
        Ledger {
            accounts: BTreeMap::new(),
            aliases: HashMap::new(),
            commodities: IndexSet::new(),
            volume: HashMap::new(),
            bucket: None,
            messages: Vec::new(),
            options,
        }
    }

    pub fn options(&self) -> &LedgerOptions {
        &self.options
    }

    pub(crate) fn post(&mut self, account: &str, date: &str, entry: Entry) {
        trace!(account, date, amount = %entry.amount, "post");
        if !self.commodities.contains(&entry.amount.commodity) {
            self.commodities.insert(entry.amount.commodity.clone());
        }
        let volume = self.volume.entry(entry.amount.commodity.clone()).or_default();
        *volume = volume.saturating_add(entry.amount.value.abs());
        self.accounts
            .entry(account.to_string())
            .or_default()
            .entry(date.to_string())
            .or_default()
            .push(entry);
    }

    /// First commodity that posting `amounts` would push past [`volume_limit`].
    pub(crate) fn overflowing_commodity<'a>(
        &self,
        amounts: impl IntoIterator<Item = &'a Amount>,
    ) -> Option<&'a str> {
        let limit = volume_limit();
        let mut projected: HashMap<&str, Decimal> = HashMap::new();
        for amount in amounts {
            let commodity = amount.commodity.as_str();
            let volume = projected
                .entry(commodity)
                .or_insert_with(|| self.volume.get(commodity).copied().unwrap_or_default());
            match volume.checked_add(amount.value.abs()) {
                Some(next) if next <= limit => *volume = next,
                _ => return Some(commodity),
            }
        }
        None
    }

    pub(crate) fn set_alias(&mut self, from: &str, to: &str) {
        debug!(from, to, "alias");
        self.aliases.insert(from.to_string(), to.to_string());
    }

    /// Single level substitution, an alias pointing at another alias is left as is.
    pub fn resolve<'a>(&'a self, account: &'a str) -> &'a str {
        self.aliases
            .get(account)
            .map(String::as_str)
            .unwrap_or(account)
    }

    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }

    pub(crate) fn set_bucket(&mut self, account: &str) {
        debug!(account, "bucket");
        self.bucket = Some(account.to_string());
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub(crate) fn push_message(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }

    /// Text of every `print` directive, in input order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn commodities(&self) -> &IndexSet<String> {
        &self.commodities
    }

    pub fn accounts(&self) -> BTreeSet<&str> {
        self.accounts.keys().map(String::as_str).collect()
    }

    pub(crate) fn accounts_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.accounts
            .keys()
            .map(String::as_str)
            .filter(move |account| account.starts_with(prefix))
    }

    /// Balance of `account` including every date up to and including `asof`.
    pub fn balance(&self, account: &str, asof: Option<&str>) -> Result<Balance> {
        self.posted_balance(account, asof)
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))
    }

    /// `None` when `account` has no postings at all.
    pub(crate) fn posted_balance(&self, account: &str, asof: Option<&str>) -> Option<Balance> {
        self.accounts.get(account).map(|dates| sum_until(dates, asof))
    }

    pub fn balances(&self, asof: Option<&str>) -> BTreeMap<String, Balance> {
        self.accounts
            .iter()
            .map(|(account, dates)| (account.clone(), sum_until(dates, asof)))
            .collect()
    }

    /// Sum over every account whose name starts with `prefix`, the prefix itself included.
    pub fn balance_children(&self, prefix: &str, asof: Option<&str>) -> Balance {
        let mut total = Balance::new();
        for (account, dates) in &self.accounts {
            if account.starts_with(prefix) {
                accumulate(&mut total, &sum_until(dates, asof));
            }
        }
        total
    }

    /// Balances of every account and of each of its ancestors, `A:B:C` rolling
    /// into `A:B` and `A`.
    pub fn rollup(&self, asof: Option<&str>) -> BTreeMap<String, Balance> {
        let mut rolled: BTreeMap<String, Balance> = BTreeMap::new();
        for (account, balance) in self.balances(asof) {
            let mut end = 0;
            for segment in account.split(':') {
                end += segment.len();
                accumulate(rolled.entry(account[..end].to_string()).or_default(), &balance);
                end += 1;
            }
        }
        rolled
    }

    /// Entries of `account` in date order with a running total per commodity.
    pub fn register(&self, account: &str, asof: Option<&str>) -> Result<Vec<RegisterRow<'_>>> {
        let dates = self
            .accounts
            .get(account)
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))?;

        let mut running = Balance::new();
        let mut rows = Vec::new();
        for (date, entries) in dates {
            if asof.is_some_and(|asof| date.as_str() > asof) {
                break;
            }
            for entry in entries {
                let total = running.entry(entry.amount.commodity.clone()).or_default();
                *total += entry.amount.value;
                rows.push(RegisterRow {
                    date,
                    description: &entry.description,
                    amount: &entry.amount,
                    running: *total,
                });
            }
        }

        Ok(rows)
    }

    pub fn startdate(&self) -> Option<&str> {
        self.accounts
            .values()
            .filter_map(|dates| dates.keys().next())
            .min()
            .map(String::as_str)
    }

    pub fn enddate(&self) -> Option<&str> {
        self.accounts
            .values()
            .filter_map(|dates| dates.keys().next_back())
            .max()
            .map(String::as_str)
    }
}
