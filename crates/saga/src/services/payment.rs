//! Payment collaborator and its adapter for the ledger.

use async_trait::async_trait;
use common::{CustomerId, Money, OrderNumber};
use ledger::Ledger;

use crate::error::SagaError;

/// A money movement the ledger accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentResult {
    pub transaction_id: String,
    pub amount: Money,
}

/// Charges and refunds.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges the customer for an order. Charging a paid order again returns
    /// the original payment.
    async fn charge(
        &self,
        order_number: &OrderNumber,
        customer_id: &CustomerId,
        amount: Money,
    ) -> Result<PaymentResult, SagaError>;

    /// Returns `amount` of the order's payment to the customer.
    async fn refund(
        &self,
        order_number: &OrderNumber,
        amount: Money,
        reason: &str,
    ) -> Result<PaymentResult, SagaError>;
}

#[async_trait]
impl PaymentService for Ledger {
    async fn charge(
        &self,
        order_number: &OrderNumber,
        customer_id: &CustomerId,
        amount: Money,
    ) -> Result<PaymentResult, SagaError> {
        let txn = self.pay(order_number, customer_id, amount).await?;
        Ok(PaymentResult {
            transaction_id: txn.id,
            amount: txn.amount,
        })
    }

    async fn refund(
        &self,
        order_number: &OrderNumber,
        amount: Money,
        reason: &str,
    ) -> Result<PaymentResult, SagaError> {
        let txn = Ledger::refund(self, order_number, Some(amount), reason).await?;
        Ok(PaymentResult {
            transaction_id: txn.id,
            amount: txn.amount,
        })
    }
}
