use crate::parser::Rule;
use pest::iterators::{Pair, Pairs};

use std::convert::TryFrom;

/// Account groups of an `assert equation` line.
#[derive(Clone, Debug, PartialEq)]
pub struct Equation<'s> {
    pub assets: &'s str,
    pub liabilities: &'s str,
    pub equity: &'s str,
    pub income: &'s str,
    pub expenses: &'s str,
}

/// A non-posting journal line.
#[derive(Debug, PartialEq)]
pub enum Statement<'s> {
    /// `DATE(=DATE2)? description`, `effective` is `DATE2` when given.
    Header {
        date: &'s str,
        effective: &'s str,
        description: &'s str,
    },
    Commodity(&'s str),
    Account(&'s str),
    Include(&'s str),
    Bucket(&'s str),
    Print(&'s str),
    Alias(&'s str, &'s str),
    CloseAll {
        date: &'s str,
        prefix: &'s str,
        closing: &'s str,
    },
    AssertBalance {
        date: Option<&'s str>,
        account: &'s str,
        amount: &'s str,
    },
    AssertEquation {
        date: Option<&'s str>,
        equation: Equation<'s>,
    },
}

macro_rules! next_str {
    ($pairs:ident, $what:expr) => {
        $pairs
            .next()
            .ok_or(expected($what))?
            .as_str()
    };
}

fn expected(what: &str) -> String {
    format!("invalid next token, expected {}", what)
}

/// Pulls an optional leading date off `pairs`.
fn leading_date<'s>(pairs: &mut std::iter::Peekable<Pairs<'s, Rule>>) -> Option<&'s str> {
    pairs
        .next_if(|pair| pair.as_rule() == Rule::date)
        .map(|pair| pair.as_str())
}

impl<'s> TryFrom<Pair<'s, Rule>> for Statement<'s> {
    type Error = String;

    /// Converts a `directive` pair.
    fn try_from(pair: Pair<'s, Rule>) -> Result<Self, Self::Error> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or(expected("directive"))?;
        Self::into_statement(inner)
    }
}

impl<'s> Statement<'s> {
    fn into_statement(statement: Pair<'s, Rule>) -> Result<Self, String> {
        let tag = statement.as_rule();
        let mut pairs = statement.into_inner();

        let stmt = match tag {
            Rule::header => {
                let date = next_str!(pairs, "date");
                let mut effective = date;
                let mut description = "";
                for pair in pairs {
                    match pair.as_rule() {
                        Rule::date => effective = pair.as_str(),
                        _ => description = pair.as_str(),
                    }
                }
                Self::Header {
                    date,
                    effective,
                    description,
                }
            }
            Rule::commodity_decl => Self::Commodity(next_str!(pairs, "commodity")),
            Rule::account_decl => Self::Account(next_str!(pairs, "account")),
            Rule::include => Self::Include(next_str!(pairs, "path")),
            Rule::bucket => Self::Bucket(next_str!(pairs, "account")),
            Rule::print => Self::Print(next_str!(pairs, "text")),
            Rule::alias => Self::Alias(next_str!(pairs, "alias"), next_str!(pairs, "account")),
            Rule::closeall => Self::CloseAll {
                date: next_str!(pairs, "date"),
                prefix: next_str!(pairs, "account prefix"),
                closing: next_str!(pairs, "closing account"),
            },
            Rule::assert_balance => {
                let mut pairs = pairs.peekable();
                Self::AssertBalance {
                    date: leading_date(&mut pairs),
                    account: next_str!(pairs, "account"),
                    amount: next_str!(pairs, "amount"),
                }
            }
            Rule::assert_equation => {
                let mut pairs = pairs.peekable();
                Self::AssertEquation {
                    date: leading_date(&mut pairs),
                    equation: Equation {
                        assets: next_str!(pairs, "assets"),
                        liabilities: next_str!(pairs, "liabilities"),
                        equity: next_str!(pairs, "equity"),
                        income: next_str!(pairs, "income"),
                        expenses: next_str!(pairs, "expenses"),
                    },
                }
            }
            _ => return Err(format!("unexpected token: {:?}", tag)),
        };

        Ok(stmt)
    }
}
