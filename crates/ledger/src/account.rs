use common::{CustomerId, Money};
use serde::{Deserialize, Serialize};

use crate::{LedgerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountKind {
    Customer,
    Store,
}

/// A ledger account. Balances never go below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub kind: AccountKind,
    /// Owning customer, for customer accounts.
    pub owner: Option<CustomerId>,
    pub holder_name: String,
    pub balance: Money,
    pub currency: String,
    pub active: bool,
}

impl Account {
    /// Opens an active customer account.
    pub fn customer(
        id: impl Into<String>,
        owner: CustomerId,
        holder_name: impl Into<String>,
        balance: Money,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: AccountKind::Customer,
            owner: Some(owner),
            holder_name: holder_name.into(),
            balance,
            currency: currency.into(),
            active: true,
        }
    }

    /// Opens the active store account.
    pub fn store(
        id: impl Into<String>,
        holder_name: impl Into<String>,
        balance: Money,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: AccountKind::Store,
            owner: None,
            holder_name: holder_name.into(),
            balance,
            currency: currency.into(),
            active: true,
        }
    }

    pub fn has_sufficient_balance(&self, amount: Money) -> bool {
        self.balance >= amount
    }

    pub(crate) fn debit(&mut self, amount: Money) -> Result<()> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::InsufficientFunds {
                account: self.id.clone(),
                balance: self.balance,
                requested: amount,
            })?;
        Ok(())
    }

    pub(crate) fn credit(&mut self, amount: Money) {
        self.balance += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_never_goes_negative() {
        let mut account = Account::customer(
            "ACC-1",
            CustomerId::new("alice"),
            "Alice",
            Money::from_cents(500),
            "AUD",
        );

        assert!(account.debit(Money::from_cents(501)).is_err());
        assert_eq!(account.balance, Money::from_cents(500));

        account.debit(Money::from_cents(500)).unwrap();
        assert!(account.balance.is_zero());

        account.credit(Money::from_cents(250));
        assert_eq!(account.balance, Money::from_cents(250));
    }
}
