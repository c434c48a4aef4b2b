use chrono::{DateTime, Utc};
use common::{Money, OrderNumber, short_code};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Payment,
    Refund,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Payment => "payment",
            TransactionKind::Refund => "refund",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

/// A record of money moving between two accounts.
///
/// Once `Success` or `Failed` the record is never changed again; a refund is
/// a new transaction running the other way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub from_account: String,
    pub to_account: String,
    pub amount: Money,
    pub currency: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub order_number: OrderNumber,
    /// The payment a refund reverses.
    pub original_transaction_id: Option<String>,
    pub description: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub(crate) fn pending(request: &TransferRequest) -> Self {
        Self {
            id: generate_transaction_id(),
            from_account: request.from_account.clone(),
            to_account: request.to_account.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            kind: request.kind,
            status: TransactionStatus::Pending,
            order_number: request.order_number.clone(),
            original_transaction_id: request.original_transaction_id.clone(),
            description: request.description.clone(),
            failure_reason: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    pub(crate) fn succeed(mut self) -> Self {
        self.status = TransactionStatus::Success;
        self.processed_at = Some(Utc::now());
        self
    }

    pub(crate) fn fail(mut self, reason: impl Into<String>) -> Self {
        self.status = TransactionStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.processed_at = Some(Utc::now());
        self
    }

    pub fn is_successful_payment(&self) -> bool {
        self.kind == TransactionKind::Payment && self.status == TransactionStatus::Success
    }

    pub fn is_successful_refund_of(&self, payment_id: &str) -> bool {
        self.kind == TransactionKind::Refund
            && self.status == TransactionStatus::Success
            && self.original_transaction_id.as_deref() == Some(payment_id)
    }
}

/// Parameters of a single transfer.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from_account: String,
    pub to_account: String,
    pub amount: Money,
    pub currency: String,
    pub kind: TransactionKind,
    pub order_number: OrderNumber,
    pub original_transaction_id: Option<String>,
    pub description: String,
}

/// `TXN-<epoch millis>-<8 hex>`.
pub fn generate_transaction_id() -> String {
    format!("TXN-{}-{}", Utc::now().timestamp_millis(), short_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_format() {
        let id = generate_transaction_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TXN");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
    }
}
