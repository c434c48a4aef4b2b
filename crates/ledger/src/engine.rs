//! The ledger engine.
//!
//! All balances and transaction records sit behind one lock, so a transfer
//! is a single atomic unit: the pending record, the debit, the credit and the
//! final status are written together or not at all.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::{CustomerId, Money, OrderNumber};
use messaging::{BankMessage, EventPublisher, Message, topics};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    Account, LedgerError, Result, Transaction, TransactionKind, TransactionStatus,
    TransferRequest,
};

/// Ledger settings.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Account credited by payments and debited by refunds.
    pub store_account_id: String,
    pub currency: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            store_account_id: "STORE-001".to_string(),
            currency: "AUD".to_string(),
        }
    }
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<String, Account>,
    by_owner: HashMap<CustomerId, String>,
    transactions: Vec<Transaction>,
}

impl LedgerState {
    fn active_account(&self, id: &str) -> Result<&Account> {
        let account = self
            .accounts
            .get(id)
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))?;
        if !account.active {
            return Err(LedgerError::AccountInactive(id.to_string()));
        }
        Ok(account)
    }

    fn customer_account_id(&self, owner: &CustomerId) -> Result<String> {
        self.by_owner
            .get(owner)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(owner.to_string()))
    }

    fn successful_payment(&self, order_number: &OrderNumber) -> Option<&Transaction> {
        self.transactions
            .iter()
            .find(|t| t.is_successful_payment() && &t.order_number == order_number)
    }

    fn refunds_of<'a>(&'a self, payment_id: &'a str) -> impl Iterator<Item = &'a Transaction> {
        self.transactions
            .iter()
            .filter(move |t| t.is_successful_refund_of(payment_id))
    }

    /// Moves money between two accounts.
    ///
    /// Balance and currency checks happen before anything is touched. A
    /// transfer refused for lack of funds is still recorded, as `Failed`.
    fn transfer(&mut self, request: &TransferRequest) -> Result<Transaction> {
        if !request.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(request.amount));
        }

        let from = self.active_account(&request.from_account)?;
        let to = self.active_account(&request.to_account)?;
        for account in [from, to] {
            if account.currency != request.currency {
                return Err(LedgerError::CurrencyMismatch {
                    expected: account.currency.clone(),
                    actual: request.currency.clone(),
                });
            }
        }

        let pending = Transaction::pending(request);

        if !from.has_sufficient_balance(request.amount) {
            let err = LedgerError::InsufficientFunds {
                account: from.id.clone(),
                balance: from.balance,
                requested: request.amount,
            };
            self.transactions.push(pending.fail(err.to_string()));
            return Err(err);
        }

        // Both accounts exist and the source covers the amount, so neither
        // step below can fail part way.
        if let Some(from) = self.accounts.get_mut(&request.from_account) {
            from.debit(request.amount)?;
        }
        if let Some(to) = self.accounts.get_mut(&request.to_account) {
            to.credit(request.amount);
        }

        let done = pending.succeed();
        self.transactions.push(done.clone());
        Ok(done)
    }
}

/// Double-entry ledger holding customer and store accounts.
///
/// Cloning shares the ledger.
#[derive(Clone)]
pub struct Ledger {
    state: Arc<Mutex<LedgerState>>,
    publisher: Arc<dyn EventPublisher>,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new(config: LedgerConfig, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::default())),
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Registers an account.
    pub async fn open_account(&self, account: Account) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.accounts.contains_key(&account.id) {
            return Err(LedgerError::AccountExists(account.id));
        }
        if let Some(owner) = &account.owner {
            state.by_owner.insert(owner.clone(), account.id.clone());
        }
        info!(account_id = %account.id, kind = ?account.kind, "account opened");
        state.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    pub async fn account(&self, account_id: &str) -> Result<Account> {
        self.state
            .lock()
            .await
            .accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    /// Returns the customer's account, including its balance.
    pub async fn balance(&self, owner: &CustomerId) -> Result<Account> {
        let state = self.state.lock().await;
        let id = state.customer_account_id(owner)?;
        state
            .accounts
            .get(&id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(id))
    }

    /// Moves `amount` between two accounts as one atomic unit.
    pub async fn transfer(&self, request: TransferRequest) -> Result<Transaction> {
        let kind = request.kind;
        let result = self.state.lock().await.transfer(&request);
        record_outcome(kind, &result);
        result
    }

    /// Charges the customer for an order, crediting the store account.
    ///
    /// A second request for an order that already has a successful payment
    /// returns that payment without moving money again.
    #[tracing::instrument(skip(self), fields(order_number = %order_number, owner = %owner))]
    pub async fn pay(
        &self,
        order_number: &OrderNumber,
        owner: &CustomerId,
        amount: Money,
    ) -> Result<Transaction> {
        let result = {
            let mut state = self.state.lock().await;
            if let Some(existing) = state.successful_payment(order_number) {
                info!(transaction_id = %existing.id, "order already paid");
                return Ok(existing.clone());
            }

            state.customer_account_id(owner).and_then(|from_account| {
                state.transfer(&TransferRequest {
                    from_account,
                    to_account: self.config.store_account_id.clone(),
                    amount,
                    currency: self.config.currency.clone(),
                    kind: TransactionKind::Payment,
                    order_number: order_number.clone(),
                    original_transaction_id: None,
                    description: format!("Payment for order: {order_number}"),
                })
            })
        };
        record_outcome(TransactionKind::Payment, &result);

        match &result {
            Ok(txn) => {
                info!(transaction_id = %txn.id, amount = %amount, "payment processed");
                self.announce(
                    topics::PAYMENT_SUCCESS,
                    bank_message(txn, owner, "Payment processed successfully"),
                )
                .await;
            }
            Err(err) => {
                warn!(error = %err, "payment failed");
                let failed = self
                    .state
                    .lock()
                    .await
                    .transactions
                    .iter()
                    .rev()
                    .find(|t| {
                        &t.order_number == order_number
                            && t.kind == TransactionKind::Payment
                            && t.status == TransactionStatus::Failed
                    })
                    .map(|t| t.id.clone())
                    .unwrap_or_default();
                self.announce(
                    topics::PAYMENT_FAILURE,
                    BankMessage {
                        transaction_id: failed,
                        order_number: order_number.clone(),
                        owner_id: owner.clone(),
                        amount,
                        currency: self.config.currency.clone(),
                        status: TransactionStatus::Failed.as_str().to_string(),
                        original_transaction_id: None,
                        note: err.to_string(),
                        timestamp: Utc::now(),
                    },
                )
                .await;
            }
        }
        result
    }

    /// Refunds the order's payment back to the paying account.
    ///
    /// `amount` defaults to whatever of the payment is still unrefunded.
    /// Refunds are capped cumulatively at the original payment; once the
    /// payment is fully refunded, the latest refund is returned unchanged.
    #[tracing::instrument(skip(self, amount), fields(order_number = %order_number))]
    pub async fn refund(
        &self,
        order_number: &OrderNumber,
        amount: Option<Money>,
        reason: &str,
    ) -> Result<Transaction> {
        let (result, owner) = {
            let mut state = self.state.lock().await;
            let payment = state
                .successful_payment(order_number)
                .cloned()
                .ok_or_else(|| LedgerError::PaymentNotFound(order_number.clone()))?;

            let refunded: Money = state.refunds_of(&payment.id).map(|t| t.amount).sum();
            let outstanding = payment.amount.checked_sub(refunded).unwrap_or_default();

            if outstanding.is_zero()
                && let Some(latest) = state.refunds_of(&payment.id).last()
            {
                info!(refund_id = %latest.id, "payment already fully refunded");
                return Ok(latest.clone());
            }

            let amount = amount.unwrap_or(outstanding);
            if amount > outstanding {
                return Err(LedgerError::RefundExceedsPayment {
                    requested: amount,
                    outstanding,
                });
            }

            let owner = state
                .accounts
                .get(&payment.from_account)
                .and_then(|a| a.owner.clone());
            let result = state.transfer(&TransferRequest {
                from_account: payment.to_account.clone(),
                to_account: payment.from_account.clone(),
                amount,
                currency: payment.currency.clone(),
                kind: TransactionKind::Refund,
                order_number: order_number.clone(),
                original_transaction_id: Some(payment.id.clone()),
                description: format!("Refund for order: {order_number}, reason: {reason}"),
            });
            (result, owner)
        };
        record_outcome(TransactionKind::Refund, &result);

        match &result {
            Ok(txn) => {
                info!(refund_id = %txn.id, amount = %txn.amount, "refund processed");
                if let Some(owner) = owner {
                    self.announce(
                        topics::REFUND_SUCCESS,
                        bank_message(txn, &owner, reason),
                    )
                    .await;
                }
            }
            Err(err) => error!(error = %err, "refund failed"),
        }
        result
    }

    /// All transactions recorded against an order, oldest first.
    pub async fn transactions_for_order(&self, order_number: &OrderNumber) -> Vec<Transaction> {
        self.state
            .lock()
            .await
            .transactions
            .iter()
            .filter(|t| &t.order_number == order_number)
            .cloned()
            .collect()
    }

    pub async fn transaction(&self, transaction_id: &str) -> Option<Transaction> {
        self.state
            .lock()
            .await
            .transactions
            .iter()
            .find(|t| t.id == transaction_id)
            .cloned()
    }

    async fn announce(&self, routing_key: &str, payload: BankMessage) {
        let published = match Message::new(routing_key, &payload) {
            Ok(message) => self.publisher.publish(message).await,
            Err(err) => Err(err),
        };
        if let Err(err) = published {
            warn!(routing_key, error = %err, "failed to publish bank event");
        }
    }
}

fn bank_message(txn: &Transaction, owner: &CustomerId, note: &str) -> BankMessage {
    BankMessage {
        transaction_id: txn.id.clone(),
        order_number: txn.order_number.clone(),
        owner_id: owner.clone(),
        amount: txn.amount,
        currency: txn.currency.clone(),
        status: txn.status.as_str().to_string(),
        original_transaction_id: txn.original_transaction_id.clone(),
        note: note.to_string(),
        timestamp: txn.processed_at.unwrap_or(txn.created_at),
    }
}

fn record_outcome(kind: TransactionKind, result: &Result<Transaction>) {
    let outcome = if result.is_ok() { "success" } else { "failure" };
    metrics::counter!("ledger_transfers_total", "kind" => kind.as_str(), "outcome" => outcome)
        .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use messaging::InMemoryBroker;

    async fn ledger_with(balance: i64) -> (Ledger, InMemoryBroker) {
        let broker = InMemoryBroker::new();
        let ledger = Ledger::new(LedgerConfig::default(), Arc::new(broker.clone()));
        ledger
            .open_account(Account::store("STORE-001", "Store", Money::zero(), "AUD"))
            .await
            .unwrap();
        ledger
            .open_account(Account::customer(
                "ACC-ALICE",
                CustomerId::new("alice"),
                "Alice",
                Money::from_cents(balance),
                "AUD",
            ))
            .await
            .unwrap();
        (ledger, broker)
    }

    #[tokio::test]
    async fn transfer_moves_money_atomically() {
        let (ledger, _) = ledger_with(10_000).await;
        let txn = ledger
            .transfer(TransferRequest {
                from_account: "ACC-ALICE".into(),
                to_account: "STORE-001".into(),
                amount: Money::from_cents(2_500),
                currency: "AUD".into(),
                kind: TransactionKind::Payment,
                order_number: OrderNumber::new("ORD-1"),
                original_transaction_id: None,
                description: "test".into(),
            })
            .await
            .unwrap();

        assert_eq!(txn.status, TransactionStatus::Success);
        assert!(txn.processed_at.is_some());
        assert_eq!(
            ledger.account("ACC-ALICE").await.unwrap().balance,
            Money::from_cents(7_500)
        );
        assert_eq!(
            ledger.account("STORE-001").await.unwrap().balance,
            Money::from_cents(2_500)
        );
    }

    #[tokio::test]
    async fn rejects_non_positive_amount_and_currency_mismatch() {
        let (ledger, _) = ledger_with(10_000).await;
        let request = TransferRequest {
            from_account: "ACC-ALICE".into(),
            to_account: "STORE-001".into(),
            amount: Money::zero(),
            currency: "AUD".into(),
            kind: TransactionKind::Payment,
            order_number: OrderNumber::new("ORD-1"),
            original_transaction_id: None,
            description: "test".into(),
        };
        assert!(matches!(
            ledger.transfer(request.clone()).await,
            Err(LedgerError::InvalidAmount(_))
        ));

        let usd = TransferRequest {
            amount: Money::from_cents(100),
            currency: "USD".into(),
            ..request
        };
        assert!(matches!(
            ledger.transfer(usd).await,
            Err(LedgerError::CurrencyMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn insufficient_funds_leaves_balances_untouched() {
        let (ledger, broker) = ledger_with(1_000).await;
        let order = OrderNumber::new("ORD-1");
        let owner = CustomerId::new("alice");

        let err = ledger
            .pay(&order, &owner, Money::from_cents(1_001))
            .await
            .unwrap_err();
        assert!(err.is_insufficient_funds());

        assert_eq!(
            ledger.balance(&owner).await.unwrap().balance,
            Money::from_cents(1_000)
        );
        assert!(ledger.account("STORE-001").await.unwrap().balance.is_zero());

        let txns = ledger.transactions_for_order(&order).await;
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].status, TransactionStatus::Failed);

        let failures = broker.published(topics::PAYMENT_FAILURE).await;
        assert_eq!(failures.len(), 1);
        let message: BankMessage = failures[0].decode().unwrap();
        assert_eq!(message.transaction_id, txns[0].id);
    }

    #[tokio::test]
    async fn payment_is_idempotent_per_order() {
        let (ledger, broker) = ledger_with(10_000).await;
        let order = OrderNumber::new("ORD-1");
        let owner = CustomerId::new("alice");

        let first = ledger
            .pay(&order, &owner, Money::from_cents(4_000))
            .await
            .unwrap();
        let second = ledger
            .pay(&order, &owner, Money::from_cents(4_000))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(
            ledger.balance(&owner).await.unwrap().balance,
            Money::from_cents(6_000)
        );
        assert_eq!(broker.published(topics::PAYMENT_SUCCESS).await.len(), 1);
    }

    #[tokio::test]
    async fn refund_is_capped_at_the_original_payment() {
        let (ledger, broker) = ledger_with(10_000).await;
        let order = OrderNumber::new("ORD-1");
        let owner = CustomerId::new("alice");
        let payment = ledger
            .pay(&order, &owner, Money::from_cents(4_000))
            .await
            .unwrap();

        let partial = ledger
            .refund(&order, Some(Money::from_cents(1_000)), "damaged")
            .await
            .unwrap();
        assert_eq!(partial.original_transaction_id.as_deref(), Some(payment.id.as_str()));

        assert!(matches!(
            ledger
                .refund(&order, Some(Money::from_cents(3_001)), "too much")
                .await,
            Err(LedgerError::RefundExceedsPayment { .. })
        ));

        let rest = ledger.refund(&order, None, "lost").await.unwrap();
        assert_eq!(rest.amount, Money::from_cents(3_000));

        let again = ledger.refund(&order, None, "lost").await.unwrap();
        assert_eq!(again.id, rest.id);

        assert_eq!(
            ledger.balance(&owner).await.unwrap().balance,
            Money::from_cents(10_000)
        );
        assert!(ledger.account("STORE-001").await.unwrap().balance.is_zero());
        assert_eq!(broker.published(topics::REFUND_SUCCESS).await.len(), 2);
    }

    #[tokio::test]
    async fn refund_without_payment_fails() {
        let (ledger, _) = ledger_with(10_000).await;
        assert!(matches!(
            ledger.refund(&OrderNumber::new("ORD-X"), None, "lost").await,
            Err(LedgerError::PaymentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn unknown_customer_payment_fails() {
        let (ledger, _) = ledger_with(10_000).await;
        assert!(matches!(
            ledger
                .pay(
                    &OrderNumber::new("ORD-1"),
                    &CustomerId::new("mallory"),
                    Money::from_cents(100)
                )
                .await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }
}
