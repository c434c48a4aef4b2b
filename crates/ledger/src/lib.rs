//! Ledger engine: customer and store accounts, atomic transfers, payments
//! and refunds.
//!
//! A payment moves money from the customer's account to the store account;
//! a refund is a separate transaction the other way, referencing the payment
//! it reverses and capped at what is still unrefunded.

pub mod account;
pub mod engine;
pub mod error;
pub mod refunder;
pub mod transaction;

pub use account::{Account, AccountKind};
pub use engine::{Ledger, LedgerConfig};
pub use error::{LedgerError, Result};
pub use refunder::{LOST_PACKAGE_BINDINGS, LOST_PACKAGE_QUEUE, LostPackageRefunder};
pub use transaction::{
    Transaction, TransactionKind, TransactionStatus, TransferRequest, generate_transaction_id,
};
