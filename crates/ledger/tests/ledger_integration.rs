//! Integration tests for the ledger and its lost-package consumer.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{CustomerId, Money, OrderNumber};
use ledger::{
    Account, LOST_PACKAGE_BINDINGS, LOST_PACKAGE_QUEUE, Ledger, LedgerConfig, LostPackageRefunder,
    TransactionKind, TransactionStatus,
};
use messaging::{
    BankMessage, DeliveryEventStatus, DeliveryStatusMessage, EventPublisher, InMemoryBroker,
    Message, spawn_consumer, topics,
};

struct TestHarness {
    broker: InMemoryBroker,
    ledger: Ledger,
    owner: CustomerId,
}

impl TestHarness {
    async fn new(balance: Money) -> Self {
        let broker = InMemoryBroker::new();
        let ledger = Ledger::new(LedgerConfig::default(), Arc::new(broker.clone()));
        ledger
            .open_account(Account::store("STORE-001", "Store", Money::zero(), "AUD"))
            .await
            .unwrap();
        let owner = CustomerId::new("customer-1");
        ledger
            .open_account(Account::customer(
                "ACC-001",
                owner.clone(),
                "Customer One",
                balance,
                "AUD",
            ))
            .await
            .unwrap();

        Self {
            broker,
            ledger,
            owner,
        }
    }

    async fn publish_delivery(&self, order_number: &OrderNumber, status: DeliveryEventStatus) {
        let event = DeliveryStatusMessage {
            delivery_id: "DEL-TEST0001".into(),
            order_number: order_number.clone(),
            status,
            tracking_number: Some("DEL-1".into()),
            note: "Automatic status update".into(),
            timestamp: Utc::now(),
        };
        self.broker
            .publish(Message::new(status.routing_key(), &event).unwrap())
            .await
            .unwrap();
    }

    async fn wait_for_refunds(&self, expected: usize) {
        for _ in 0..100 {
            if self.broker.published(topics::REFUND_SUCCESS).await.len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[tokio::test]
async fn test_lost_delivery_refunds_payment_once() {
    let h = TestHarness::new(Money::from_units(100)).await;
    let queue = h
        .broker
        .declare_queue(LOST_PACKAGE_QUEUE, &LOST_PACKAGE_BINDINGS)
        .await
        .unwrap();
    spawn_consumer(queue, Arc::new(LostPackageRefunder::new(h.ledger.clone())));

    let order = OrderNumber::new("ORD-20240101000000-0001");
    let payment = h
        .ledger
        .pay(&order, &h.owner, Money::from_cents(4_550))
        .await
        .unwrap();

    h.publish_delivery(&order, DeliveryEventStatus::InTransit).await;
    h.publish_delivery(&order, DeliveryEventStatus::Lost).await;
    h.publish_delivery(&order, DeliveryEventStatus::Lost).await;
    h.wait_for_refunds(1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let txns = h.ledger.transactions_for_order(&order).await;
    let refunds: Vec<_> = txns
        .iter()
        .filter(|t| t.kind == TransactionKind::Refund)
        .collect();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount, payment.amount);
    assert_eq!(refunds[0].status, TransactionStatus::Success);
    assert_eq!(
        refunds[0].original_transaction_id.as_deref(),
        Some(payment.id.as_str())
    );

    assert_eq!(
        h.ledger.balance(&h.owner).await.unwrap().balance,
        Money::from_units(100)
    );

    let announced = h.broker.published(topics::REFUND_SUCCESS).await;
    assert_eq!(announced.len(), 1);
    let message: BankMessage = announced[0].decode().unwrap();
    assert_eq!(message.order_number, order);
    assert_eq!(message.owner_id, h.owner);
}

#[tokio::test]
async fn test_failed_delivery_without_payment_is_ignored() {
    let h = TestHarness::new(Money::from_units(100)).await;
    let refunder = LostPackageRefunder::new(h.ledger.clone());
    let event = DeliveryStatusMessage {
        delivery_id: "DEL-TEST0002".into(),
        order_number: OrderNumber::new("ORD-UNPAID"),
        status: DeliveryEventStatus::Failed,
        tracking_number: None,
        note: "Package lost: crushed".into(),
        timestamp: Utc::now(),
    };

    assert!(refunder.on_delivery_event(&event).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_never_overdraw() {
    let h = TestHarness::new(Money::from_units(100)).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let ledger = h.ledger.clone();
        let owner = h.owner.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .pay(
                    &OrderNumber::new(format!("ORD-{i}")),
                    &owner,
                    Money::from_units(30),
                )
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(
        h.ledger.balance(&h.owner).await.unwrap().balance,
        Money::from_units(10)
    );
    assert_eq!(
        h.ledger.account("STORE-001").await.unwrap().balance,
        Money::from_units(90)
    );
    assert_eq!(h.broker.published(topics::PAYMENT_FAILURE).await.len(), 7);
}
