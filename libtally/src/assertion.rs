use crate::amount::Amount;
use crate::error::AssertionFailure;
use crate::ledger::{Balance, Ledger};
use crate::statement::Equation;

use rust_decimal::Decimal;
use tracing::debug;

impl Ledger {
    /// Direct balance, or the prefix aggregate when the account itself has no postings.
    pub fn balance_or_children(&self, account: &str, asof: Option<&str>) -> Balance {
        self.posted_balance(account, asof)
            .unwrap_or_else(|| self.balance_children(account, asof))
    }

    pub fn check_balance(
        &self,
        account: &str,
        asof: Option<&str>,
        asserted: &Amount,
    ) -> Result<(), AssertionFailure> {
        let computed = self.balance_or_children(account, asof);
        debug!(account, ?asof, %asserted, "assert balance");

        let holds = match computed.get(&asserted.commodity) {
            Some(value) => *value == asserted.value,
            None => asserted.is_zero(),
        };
        if holds {
            return Ok(());
        }

        Err(AssertionFailure::Balance {
            account: account.to_string(),
            computed,
            asserted: asserted.clone(),
        })
    }

    /// `assets + liabilities == -(equity + income + expenses)` for every known commodity.
    pub fn check_equation(
        &self,
        equation: &Equation<'_>,
        asof: Option<&str>,
    ) -> Result<(), AssertionFailure> {
        let assets = self.balance_or_children(equation.assets, asof);
        let liabilities = self.balance_or_children(equation.liabilities, asof);
        let equity = self.balance_or_children(equation.equity, asof);
        let income = self.balance_or_children(equation.income, asof);
        let expenses = self.balance_or_children(equation.expenses, asof);
        debug!(?asof, ?equation, "assert equation");

        let value = |balance: &Balance, commodity: &str| -> Decimal {
            balance.get(commodity).copied().unwrap_or_default()
        };

        let mut left = Balance::new();
        let mut right = Balance::new();
        for commodity in self.commodities() {
            left.insert(
                commodity.clone(),
                value(&assets, commodity) + value(&liabilities, commodity),
            );
            right.insert(
                commodity.clone(),
                -(value(&equity, commodity) + value(&income, commodity) + value(&expenses, commodity)),
            );
        }

        if left == right {
            Ok(())
        } else {
            Err(AssertionFailure::Equation { left, right })
        }
    }
}
