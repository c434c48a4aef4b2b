//! Integration tests for the order service.
//!
//! These tests exercise the full order lifecycle through the event store,
//! including stream reconstruction and concurrent writers.

use std::sync::Arc;

use common::{Address, CustomerId, Money, OrderNumber};
use domain::{
    DeliveryUpdate, DomainError, OrderError, OrderLine, OrderService, OrderStatus, PaymentStatus,
    PlaceOrder,
};
use event_store::{EventStore, InMemoryEventStore, StreamId};

fn create_service() -> OrderService<InMemoryEventStore> {
    OrderService::new(InMemoryEventStore::new())
}

fn place(number: &str, owner: &str) -> PlaceOrder {
    PlaceOrder::new(
        OrderNumber::new(number),
        CustomerId::new(owner),
        vec![OrderLine::new("SKU-1", "Widget", 2, Money::from_cents(1500))],
        Address::new("1 George St", "Sydney", "NSW", "2000", "Australia"),
        "CARD",
    )
}

fn delivery(status: OrderStatus) -> DeliveryUpdate {
    DeliveryUpdate {
        status,
        delivery_id: Some("DEL-1".to_string()),
        note: "Automatic status update".to_string(),
    }
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn paid_order_follows_delivery_to_completion() {
        let service = create_service();
        let number = OrderNumber::new("ORD-1");

        service.place_order(place("ORD-1", "alice")).await.unwrap();
        service
            .record_payment(&number, "TXN-1", false, "Payment successful")
            .await
            .unwrap();
        service
            .record_delivery(&number, "DEL-1", Some("DEL-100"))
            .await
            .unwrap();

        for status in [
            OrderStatus::PendingPickup,
            OrderStatus::PickedUp,
            OrderStatus::InTransit,
            OrderStatus::Delivered,
        ] {
            service
                .reconcile_delivery(&number, &delivery(status))
                .await
                .unwrap();
        }

        let order = service.get(&number).await.unwrap().unwrap();
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert_eq!(order.total(), Money::from_cents(3000));

        let notes: Vec<_> = order.history().iter().map(|h| h.note.as_str()).collect();
        assert_eq!(notes[0], "Order created");
        assert_eq!(notes[1], "Payment successful");
        assert_eq!(notes[2], "Delivery created");
        assert_eq!(order.history().len(), 7);
    }

    #[tokio::test]
    async fn history_survives_reload_from_the_stream() {
        let store = InMemoryEventStore::new();
        let service = OrderService::new(store.clone());
        let number = OrderNumber::new("ORD-1");

        service.place_order(place("ORD-1", "alice")).await.unwrap();
        service
            .record_payment_failure(&number, "Insufficient funds")
            .await
            .unwrap();

        let events = store.read_stream(&StreamId::new("ORD-1")).await.unwrap();
        assert_eq!(events.len(), 2);

        let reloaded = OrderService::new(store).get(&number).await.unwrap().unwrap();
        assert_eq!(reloaded.status(), OrderStatus::PaymentFailed);
        assert_eq!(reloaded.history().len(), 2);
    }

    #[tokio::test]
    async fn cancel_then_refund() {
        let service = create_service();
        let number = OrderNumber::new("ORD-1");
        let alice = CustomerId::new("alice");

        service.place_order(place("ORD-1", "alice")).await.unwrap();
        service
            .record_payment(&number, "TXN-1", false, "Payment successful")
            .await
            .unwrap();
        service
            .cancel(&number, &alice, Some("Changed my mind"))
            .await
            .unwrap();
        let order = service
            .record_refund(&number, "TXN-2", "Refund issued: TXN-2")
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.payment_status(), PaymentStatus::Refunded);

        let err = service.cancel(&number, &alice, None).await.unwrap_err();
        assert!(matches!(
            err.as_order_error(),
            Some(OrderError::AlreadyCancelled)
        ));
    }
}

mod queries {
    use super::*;

    #[tokio::test]
    async fn list_for_owner_filters_by_owner() {
        let service = create_service();
        service.place_order(place("ORD-1", "alice")).await.unwrap();
        service.place_order(place("ORD-2", "bob")).await.unwrap();
        service.place_order(place("ORD-3", "alice")).await.unwrap();

        let orders = service
            .list_for_owner(&CustomerId::new("alice"))
            .await
            .unwrap();
        let numbers: Vec<_> = orders
            .iter()
            .filter_map(|o| o.order_number().map(|n| n.to_string()))
            .collect();

        assert_eq!(numbers.len(), 2);
        assert!(numbers.contains(&"ORD-1".to_string()));
        assert!(numbers.contains(&"ORD-3".to_string()));
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let service = create_service();
        let number = OrderNumber::new("ORD-404");

        assert!(service.get(&number).await.unwrap().is_none());
        let err = service
            .reconcile_delivery(&number, &delivery(OrderStatus::PickedUp))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn duplicate_delivery_events_record_one_transition() {
        let service = Arc::new(create_service());
        let number = OrderNumber::new("ORD-1");
        service.place_order(place("ORD-1", "alice")).await.unwrap();
        service
            .record_payment(&number, "TXN-1", false, "Payment successful")
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let service = service.clone();
            let number = number.clone();
            tasks.push(tokio::spawn(async move {
                service
                    .reconcile_delivery(&number, &delivery(OrderStatus::PickedUp))
                    .await
                    .map(|(_, events)| events.len())
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 1);
        }

        let order = service.get(&number).await.unwrap().unwrap();
        let transitions = order
            .history()
            .iter()
            .filter(|h| h.status == OrderStatus::PickedUp)
            .count();
        assert_eq!(order.status(), OrderStatus::PickedUp);
        assert_eq!(transitions, 3);
        assert_eq!(order.history().len(), 5);
    }

    #[tokio::test]
    async fn placing_the_same_number_twice_fails() {
        let service = create_service();
        service.place_order(place("ORD-1", "alice")).await.unwrap();

        let err = service.place_order(place("ORD-1", "bob")).await.unwrap_err();
        assert!(matches!(err.as_order_error(), Some(OrderError::AlreadyPlaced)));
    }
}
