use crate::error::{LedgerError, Result};
use crate::parser::{LedgerParser, Rule};

use pest::iterators::Pair;
use pest::Parser;
use rust_decimal::{Decimal, RoundingStrategy};

use std::fmt;
use std::str::FromStr;

/// Commodity used by the `$N` form.
pub const DOLLAR: &str = "$";

/// Fractional digits kept after a multiplication.
pub const PRODUCT_SCALE: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Amount {
    pub commodity: String,
    pub value: Decimal,
}

impl Amount {
    pub fn new(commodity: impl Into<String>, value: Decimal) -> Self {
        Self {
            commodity: commodity.into(),
            value,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl std::ops::Neg for &Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        Amount {
            commodity: self.commodity.clone(),
            value: -self.value,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.commodity == DOLLAR {
            write!(f, "{}{}", DOLLAR, self.value)
        } else {
            write!(f, "{} {}", self.value, self.commodity)
        }
    }
}

/// Parsed but not yet evaluated amount expression.
#[derive(Debug, PartialEq)]
enum Expr {
    Literal(Amount),
    Sum(Box<Expr>, Box<Expr>),
    Product(Box<Expr>, Decimal),
}

impl Expr {
    fn parse(token: Pair<'_, Rule>) -> Result<Expr> {
        let text = token.as_str().to_string();
        let syntax = || LedgerError::AmountSyntax(text.clone());

        match token.as_rule() {
            Rule::sum => {
                let mut pairs = token.into_inner();
                let lhs = Expr::parse(pairs.next().ok_or_else(syntax)?)?;
                let rhs = Expr::parse(pairs.next().ok_or_else(syntax)?)?;
                Ok(Expr::Sum(Box::new(lhs), Box::new(rhs)))
            }
            Rule::product => {
                let mut pairs = token.into_inner();
                let lhs = Expr::parse(pairs.next().ok_or_else(syntax)?)?;
                let factor = decimal(pairs.next().ok_or_else(syntax)?.as_str())?;
                Ok(Expr::Product(Box::new(lhs), factor))
            }
            Rule::dollar => {
                let number = token.into_inner().next().ok_or_else(syntax)?;
                Ok(Expr::Literal(Amount::new(DOLLAR, decimal(number.as_str())?)))
            }
            Rule::unit => {
                let mut pairs = token.into_inner();
                let value = decimal(pairs.next().ok_or_else(syntax)?.as_str())?;
                let commodity = pairs.next().ok_or_else(syntax)?.as_str();
                Ok(Expr::Literal(Amount::new(commodity, value)))
            }
            _ => Err(syntax()),
        }
    }

    /// Products round half up once, at the outermost `*` of their path.
    fn eval(&self, in_product: bool) -> Result<Amount> {
        match self {
            Expr::Literal(amount) => Ok(amount.clone()),
            Expr::Sum(lhs, rhs) => {
                let lhs = lhs.eval(in_product)?;
                let rhs = rhs.eval(in_product)?;
                if lhs.commodity != rhs.commodity {
                    return Err(LedgerError::MixedCommodities {
                        left: lhs.commodity,
                        right: rhs.commodity,
                    });
                }
                let value = lhs
                    .value
                    .checked_add(rhs.value)
                    .ok_or_else(|| LedgerError::AmountSyntax(format!("{} + {}", lhs, rhs)))?;
                Ok(Amount::new(lhs.commodity, value))
            }
            Expr::Product(lhs, factor) => {
                let lhs = lhs.eval(true)?;
                let value = lhs
                    .value
                    .checked_mul(*factor)
                    .ok_or_else(|| LedgerError::AmountSyntax(format!("{} * {}", lhs, factor)))?;
                let value = if in_product {
                    value
                } else {
                    value.round_dp_with_strategy(PRODUCT_SCALE, RoundingStrategy::MidpointAwayFromZero)
                };
                Ok(Amount::new(lhs.commodity, value))
            }
        }
    }
}

fn decimal(s: &str) -> Result<Decimal> {
    let digits: String = s.chars().filter(|&c| c != ',').collect();
    Decimal::from_str(&digits).map_err(|_| LedgerError::AmountSyntax(s.to_string()))
}

/// Evaluates a posting amount: `$N`, `N WORD`, `(A + B)` or `(A * k)`.
pub fn parse_amount(text: &str) -> Result<Amount> {
    let mut tokens = LedgerParser::parse(Rule::amount_expr, text)
        .map_err(|_| LedgerError::AmountSyntax(text.to_string()))?;
    let expr = tokens
        .next()
        .and_then(|amount_expr| amount_expr.into_inner().next())
        .ok_or_else(|| LedgerError::AmountSyntax(text.to_string()))?;

    Expr::parse(expr)?.eval(false)
}
