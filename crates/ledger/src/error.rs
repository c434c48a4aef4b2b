use common::{Money, OrderNumber};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account is inactive: {0}")]
    AccountInactive(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    /// Transfers must move a strictly positive amount.
    #[error("Invalid transfer amount: {0}")]
    InvalidAmount(Money),

    #[error("Insufficient balance in {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: String,
        balance: Money,
        requested: Money,
    },

    #[error("Currency mismatch: account holds {expected}, transfer in {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    #[error("No successful payment for order {0}")]
    PaymentNotFound(OrderNumber),

    #[error("Refund of {requested} exceeds the {outstanding} still refundable")]
    RefundExceedsPayment { requested: Money, outstanding: Money },

    #[error("Messaging error: {0}")]
    Messaging(#[from] messaging::MessagingError),
}

impl LedgerError {
    /// Returns true for failures caused by the customer's funds rather than
    /// by the ledger itself.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, LedgerError::InsufficientFunds { .. })
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
