//! The delivery lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::OrderNumber;
use messaging::{DeliveryEventStatus, DeliveryStatusMessage, EventPublisher, Message};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::model::{generate_delivery_id, generate_tracking_number};
use crate::{
    Delivery, DeliveryError, DeliveryRequest, DeliveryStatus, LossProbability, Result,
    StatusHistoryEntry,
};

pub const AUTOMATIC_NOTE: &str = "Automatic status update";

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Minimum time a delivery stays in a status before the scanner moves it.
    pub dwell: Duration,
    /// Time between scanner passes.
    pub scan_interval: std::time::Duration,
    pub default_carrier: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            dwell: Duration::seconds(5),
            scan_interval: std::time::Duration::from_secs(5),
            default_carrier: "Standard Post".to_string(),
        }
    }
}

#[derive(Default)]
struct DeliveryState {
    deliveries: HashMap<String, Delivery>,
    by_order: HashMap<OrderNumber, String>,
}

/// Shipment records and their status changes.
///
/// Each status change is applied under one lock and then announced on
/// `delivery.status.<status>`.
#[derive(Clone)]
pub struct DeliveryService {
    state: Arc<Mutex<DeliveryState>>,
    publisher: Arc<dyn EventPublisher>,
    loss: LossProbability,
    config: DeliveryConfig,
}

impl DeliveryService {
    pub fn new(
        config: DeliveryConfig,
        loss: LossProbability,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeliveryState::default())),
            publisher,
            loss,
            config,
        }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// The shared loss probability read by every scan.
    pub fn loss_probability(&self) -> &LossProbability {
        &self.loss
    }

    /// Creates the order's delivery in `PENDING_PICKUP`.
    ///
    /// An order has at most one delivery: asking again returns the existing one.
    #[tracing::instrument(skip(self, request), fields(order_number = %request.order_number))]
    pub async fn create(&self, request: DeliveryRequest) -> Result<Delivery> {
        if !request.shipping_address.is_deliverable() {
            return Err(DeliveryError::UndeliverableAddress);
        }

        let delivery = {
            let mut state = self.state.lock().await;
            if let Some(existing) = state
                .by_order
                .get(&request.order_number)
                .and_then(|id| state.deliveries.get(id))
            {
                info!(delivery_id = %existing.id, "delivery already exists for order");
                return Ok(existing.clone());
            }

            let now = Utc::now();
            let delivery = Delivery {
                id: generate_delivery_id(),
                order_number: request.order_number,
                owner_id: request.owner_id,
                status: DeliveryStatus::PendingPickup,
                tracking_number: generate_tracking_number(now),
                carrier: request
                    .carrier
                    .unwrap_or_else(|| self.config.default_carrier.clone()),
                shipping_address: request.shipping_address,
                warehouse_id: request.warehouse_id,
                estimated_pickup: now + Duration::hours(1),
                estimated_delivery: now + Duration::days(2),
                actual_pickup: None,
                actual_delivery: None,
                notes: request.notes,
                history: vec![StatusHistoryEntry {
                    status: DeliveryStatus::PendingPickup,
                    note: "Delivery created".to_string(),
                    recorded_at: now,
                }],
                created_at: now,
                updated_at: now,
            };
            state
                .by_order
                .insert(delivery.order_number.clone(), delivery.id.clone());
            state
                .deliveries
                .insert(delivery.id.clone(), delivery.clone());
            delivery
        };

        info!(delivery_id = %delivery.id, tracking = %delivery.tracking_number, "delivery created");
        self.announce(&delivery, DeliveryEventStatus::Created, "Delivery created")
            .await;
        Ok(delivery)
    }

    pub async fn get(&self, delivery_id: &str) -> Result<Delivery> {
        self.state
            .lock()
            .await
            .deliveries
            .get(delivery_id)
            .cloned()
            .ok_or_else(|| DeliveryError::NotFound(delivery_id.to_string()))
    }

    pub async fn for_order(&self, order_number: &OrderNumber) -> Result<Delivery> {
        let state = self.state.lock().await;
        state
            .by_order
            .get(order_number)
            .and_then(|id| state.deliveries.get(id))
            .cloned()
            .ok_or_else(|| DeliveryError::NoDeliveryForOrder(order_number.clone()))
    }

    /// Deliveries the scanner still has to move.
    pub async fn active(&self) -> Vec<Delivery> {
        self.state
            .lock()
            .await
            .deliveries
            .values()
            .filter(|d| d.is_active())
            .cloned()
            .collect()
    }

    /// Moves a delivery to `next`, which must lie ahead of its current status.
    pub async fn update_status(
        &self,
        delivery_id: &str,
        next: DeliveryStatus,
        note: &str,
    ) -> Result<Delivery> {
        let delivery = {
            let mut state = self.state.lock().await;
            let delivery = state
                .deliveries
                .get_mut(delivery_id)
                .ok_or_else(|| DeliveryError::NotFound(delivery_id.to_string()))?;
            if !delivery.status.can_transition_to(next) {
                return Err(DeliveryError::InvalidTransition {
                    delivery_id: delivery_id.to_string(),
                    from: delivery.status,
                    to: next,
                });
            }
            delivery.apply(next, note, Utc::now());
            delivery.clone()
        };

        self.transitioned(&delivery, note).await;
        Ok(delivery)
    }

    /// Marks a parcel as lost in the field, ending its delivery as `FAILED`.
    #[tracing::instrument(skip(self))]
    pub async fn report_lost(&self, delivery_id: &str, reason: &str) -> Result<Delivery> {
        self.update_status(
            delivery_id,
            DeliveryStatus::Failed,
            &format!("Package lost: {reason}"),
        )
        .await
    }

    /// Stops the order's delivery if it is still moving.
    ///
    /// Returns `None` when the order has no delivery or it already ended.
    #[tracing::instrument(skip(self), fields(order_number = %order_number))]
    pub async fn cancel_for_order(
        &self,
        order_number: &OrderNumber,
        reason: &str,
    ) -> Option<Delivery> {
        let note = format!("Order cancelled: {reason}");
        let delivery = {
            let mut state = self.state.lock().await;
            let id = state.by_order.get(order_number)?.clone();
            let delivery = state.deliveries.get_mut(&id)?;
            if !delivery.is_active() {
                debug!(delivery_id = %id, status = %delivery.status, "delivery already finished");
                return None;
            }
            delivery.apply(DeliveryStatus::Cancelled, &note, Utc::now());
            delivery.clone()
        };

        self.transitioned(&delivery, &note).await;
        Some(delivery)
    }

    /// One scanner pass over every active delivery.
    ///
    /// A delivery moves one step once it has sat in its status for the dwell
    /// time: pickup and departure always happen, while a parcel in transit is
    /// lost with the current loss probability and delivered otherwise.
    /// Returns the deliveries that moved.
    pub async fn scan(&self, now: DateTime<Utc>) -> Vec<Delivery> {
        let ids: Vec<String> = self
            .active()
            .await
            .into_iter()
            .filter(|d| now - d.updated_at >= self.config.dwell)
            .map(|d| d.id)
            .collect();

        let mut moved = Vec::new();
        for id in ids {
            let delivery = {
                let mut state = self.state.lock().await;
                let Some(delivery) = state.deliveries.get_mut(&id) else {
                    continue;
                };
                // Re-checked under the lock: a cancellation may have won the race.
                if !delivery.is_active() || now - delivery.updated_at < self.config.dwell {
                    continue;
                }
                let next = match delivery.status {
                    DeliveryStatus::PendingPickup => DeliveryStatus::PickedUp,
                    DeliveryStatus::PickedUp => DeliveryStatus::InTransit,
                    DeliveryStatus::InTransit if self.loss.roll() => DeliveryStatus::Lost,
                    DeliveryStatus::InTransit => DeliveryStatus::Delivered,
                    _ => continue,
                };
                delivery.apply(next, AUTOMATIC_NOTE, now);
                delivery.clone()
            };

            if delivery.status == DeliveryStatus::Lost {
                info!(
                    delivery_id = %delivery.id,
                    probability = self.loss.get(),
                    "parcel lost in transit"
                );
            }
            self.transitioned(&delivery, AUTOMATIC_NOTE).await;
            moved.push(delivery);
        }
        moved
    }

    async fn transitioned(&self, delivery: &Delivery, note: &str) {
        info!(
            delivery_id = %delivery.id,
            order_number = %delivery.order_number,
            status = %delivery.status,
            "delivery status changed"
        );
        metrics::counter!("delivery_transitions_total", "status" => delivery.status.as_str())
            .increment(1);
        self.announce(delivery, delivery.status.event_status(), note)
            .await;
    }

    async fn announce(&self, delivery: &Delivery, status: DeliveryEventStatus, note: &str) {
        let payload = DeliveryStatusMessage {
            delivery_id: delivery.id.clone(),
            order_number: delivery.order_number.clone(),
            status,
            tracking_number: Some(delivery.tracking_number.clone()),
            note: note.to_string(),
            timestamp: delivery.updated_at,
        };
        let published = match Message::new(status.routing_key(), &payload) {
            Ok(message) => self.publisher.publish(message).await,
            Err(err) => Err(err),
        };
        if let Err(err) = published {
            warn!(delivery_id = %delivery.id, error = %err, "failed to publish delivery event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Address, CustomerId};
    use messaging::{InMemoryBroker, topics};

    fn service(loss: f64) -> (DeliveryService, InMemoryBroker) {
        let broker = InMemoryBroker::new();
        let service = DeliveryService::new(
            DeliveryConfig::default(),
            LossProbability::new(loss).unwrap(),
            Arc::new(broker.clone()),
        );
        (service, broker)
    }

    fn request(order: &str) -> DeliveryRequest {
        DeliveryRequest {
            order_number: OrderNumber::new(order),
            owner_id: CustomerId::new("alice"),
            shipping_address: Address::new("1 George St", "Sydney", "NSW", "2000", "Australia"),
            carrier: None,
            warehouse_id: Some("WH-SYD".into()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_is_idempotent_per_order_and_announces_created() {
        let (service, broker) = service(0.0);
        let first = service.create(request("ORD-1")).await.unwrap();
        let second = service.create(request("ORD-1")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(first.id.starts_with("DEL-"));
        assert!(first.tracking_number.starts_with("DEL-"));
        assert_eq!(first.status, DeliveryStatus::PendingPickup);
        assert_eq!(first.estimated_pickup - first.created_at, Duration::hours(1));
        assert_eq!(first.estimated_delivery - first.created_at, Duration::days(2));
        assert_eq!(first.history.len(), 1);

        let created = broker.published("delivery.status.created").await;
        assert_eq!(created.len(), 1);
        let message: DeliveryStatusMessage = created[0].decode().unwrap();
        assert_eq!(message.status, DeliveryEventStatus::Created);
        assert_eq!(message.note, "Delivery created");
    }

    #[tokio::test]
    async fn scanner_waits_for_dwell_then_walks_the_path() {
        let (service, broker) = service(0.0);
        let delivery = service.create(request("ORD-1")).await.unwrap();
        let t0 = delivery.updated_at;

        assert!(service.scan(t0 + Duration::seconds(4)).await.is_empty());

        let t1 = t0 + Duration::seconds(5);
        assert_eq!(service.scan(t1).await[0].status, DeliveryStatus::PickedUp);
        // Same instant: the new status has not dwelt yet.
        assert!(service.scan(t1).await.is_empty());

        let t2 = t1 + Duration::seconds(5);
        assert_eq!(service.scan(t2).await[0].status, DeliveryStatus::InTransit);
        let t3 = t2 + Duration::seconds(5);
        assert_eq!(service.scan(t3).await[0].status, DeliveryStatus::Delivered);
        assert!(service.scan(t3 + Duration::seconds(60)).await.is_empty());

        let done = service.get(&delivery.id).await.unwrap();
        assert_eq!(done.actual_pickup, Some(t1));
        assert_eq!(done.actual_delivery, Some(t3));
        assert_eq!(done.history.len(), 4);
        assert!(done.history[1..].iter().all(|h| h.note == AUTOMATIC_NOTE));
        assert_eq!(broker.published(topics::DELIVERY_STATUS_ALL).await.len(), 4);
    }

    #[tokio::test]
    async fn certain_loss_ends_in_lost_and_probability_is_read_each_scan() {
        let (service, broker) = service(0.0);
        let delivery = service.create(request("ORD-1")).await.unwrap();
        let mut now = delivery.updated_at;
        for _ in 0..2 {
            now += Duration::seconds(5);
            service.scan(now).await;
        }

        service.loss_probability().set(1.0).unwrap();
        now += Duration::seconds(5);
        assert_eq!(service.scan(now).await[0].status, DeliveryStatus::Lost);
        assert_eq!(broker.published(topics::DELIVERY_LOST).await.len(), 1);
    }

    #[tokio::test]
    async fn report_lost_fails_the_delivery() {
        let (service, broker) = service(0.0);
        let delivery = service.create(request("ORD-1")).await.unwrap();

        let failed = service
            .report_lost(&delivery.id, "van fire")
            .await
            .unwrap();
        assert_eq!(failed.status, DeliveryStatus::Failed);
        assert_eq!(failed.history.last().unwrap().note, "Package lost: van fire");

        let message: DeliveryStatusMessage = broker.published(topics::DELIVERY_FAILED).await[0]
            .decode()
            .unwrap();
        assert_eq!(message.note, "Package lost: van fire");

        assert!(matches!(
            service.report_lost(&delivery.id, "again").await,
            Err(DeliveryError::InvalidTransition { .. })
        ));
        assert!(matches!(
            service.report_lost("DEL-NOPE", "x").await,
            Err(DeliveryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_delivery_is_never_advanced() {
        let (service, _) = service(0.0);
        let delivery = service.create(request("ORD-1")).await.unwrap();

        let cancelled = service
            .cancel_for_order(&delivery.order_number, "changed my mind")
            .await
            .unwrap();
        assert_eq!(cancelled.status, DeliveryStatus::Cancelled);
        assert_eq!(
            cancelled.history.last().unwrap().note,
            "Order cancelled: changed my mind"
        );
        assert!(
            service
                .cancel_for_order(&delivery.order_number, "again")
                .await
                .is_none()
        );

        let later = delivery.updated_at + Duration::seconds(600);
        assert!(service.scan(later).await.is_empty());
        assert_eq!(
            service.get(&delivery.id).await.unwrap().status,
            DeliveryStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn manual_updates_only_move_forward() {
        let (service, _) = service(0.0);
        let delivery = service.create(request("ORD-1")).await.unwrap();

        service
            .update_status(&delivery.id, DeliveryStatus::InTransit, "Depot scan")
            .await
            .unwrap();
        assert!(matches!(
            service
                .update_status(&delivery.id, DeliveryStatus::PickedUp, "late scan")
                .await,
            Err(DeliveryError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_undeliverable_address() {
        let (service, _) = service(0.0);
        let mut bad = request("ORD-1");
        bad.shipping_address.street = "  ".into();
        assert!(matches!(
            service.create(bad).await,
            Err(DeliveryError::UndeliverableAddress)
        ));
    }
}
