//! Folds delivery status events into orders.
//!
//! Events arrive at least once, possibly out of order, and possibly before
//! the order they name has been written. An event for a missing order is
//! retried with backoff in the background and recorded as abandoned when the
//! retries run out. Events that do not apply to their order are dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use chrono::{DateTime, Utc};
use common::CustomerId;
use domain::{DeliveryUpdate, OrderEvent, OrderService, OrderStatus};
use event_store::EventStore;
use messaging::{
    DeliveryEventStatus, DeliveryStatusMessage, EventPublisher, Message, MessageHandler,
    OrderMessage, topics,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SagaError};
use crate::retry::RetryPolicy;
use crate::services::{Notification, NotificationKind, NotificationService};

/// Queue the reconciler consumes.
pub const DELIVERY_STATUS_QUEUE: &str = "store.delivery-status";

/// Binding patterns for [`DELIVERY_STATUS_QUEUE`].
pub const DELIVERY_STATUS_BINDINGS: [&str; 1] = [topics::DELIVERY_STATUS_ALL];

/// Order status a delivery status drives the order to.
///
/// Both ways a parcel can go missing end the order as `LOST`. A cancelled
/// delivery is the echo of an order cancellation and drives nothing.
pub fn order_status_for(status: DeliveryEventStatus) -> Option<OrderStatus> {
    match status {
        DeliveryEventStatus::Created => Some(OrderStatus::Processing),
        DeliveryEventStatus::PendingPickup => Some(OrderStatus::PendingPickup),
        DeliveryEventStatus::PickedUp => Some(OrderStatus::PickedUp),
        DeliveryEventStatus::InTransit => Some(OrderStatus::InTransit),
        DeliveryEventStatus::Delivered => Some(OrderStatus::Delivered),
        DeliveryEventStatus::Lost | DeliveryEventStatus::Failed => Some(OrderStatus::Lost),
        DeliveryEventStatus::Cancelled => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The order moved to a new status.
    Applied(OrderStatus),
    /// The order already had this status; only the audit trail grew.
    Noted(OrderStatus),
    /// The event does not apply to the order.
    Ignored(String),
}

impl ReconcileOutcome {
    fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied(_) => "applied",
            ReconcileOutcome::Noted(_) => "noted",
            ReconcileOutcome::Ignored(_) => "ignored",
        }
    }
}

/// An event given up on after its retries ran out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbandonedEvent {
    pub event: DeliveryStatusMessage,
    pub attempts: u32,
    pub reason: String,
    pub abandoned_at: DateTime<Utc>,
}

/// Applies delivery status events to orders.
///
/// Cloning shares the abandoned-event log.
pub struct DeliveryStatusReconciler<S: EventStore, N> {
    orders: Arc<OrderService<S>>,
    notifier: Arc<N>,
    publisher: Arc<dyn EventPublisher>,
    policy: RetryPolicy,
    abandoned: Arc<Mutex<Vec<AbandonedEvent>>>,
}

impl<S: EventStore, N> Clone for DeliveryStatusReconciler<S, N> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            notifier: self.notifier.clone(),
            publisher: self.publisher.clone(),
            policy: self.policy.clone(),
            abandoned: self.abandoned.clone(),
        }
    }
}

impl<S, N> DeliveryStatusReconciler<S, N>
where
    S: EventStore,
    N: NotificationService,
{
    pub fn new(
        store: S,
        notifier: N,
        publisher: Arc<dyn EventPublisher>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            orders: Arc::new(OrderService::new(store)),
            notifier: Arc::new(notifier),
            publisher,
            policy,
            abandoned: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Events given up on, oldest first.
    pub async fn abandoned(&self) -> Vec<AbandonedEvent> {
        self.abandoned.lock().await.clone()
    }

    /// Reconciles one event, retrying while its order does not exist yet.
    #[tracing::instrument(
        skip(self, event),
        fields(order_number = %event.order_number, delivery_id = %event.delivery_id, status = %event.status)
    )]
    pub async fn on_delivery_event(&self, event: &DeliveryStatusMessage) -> Result<ReconcileOutcome> {
        self.reconcile_with_retry(event, 0).await
    }

    async fn reconcile_with_retry(
        &self,
        event: &DeliveryStatusMessage,
        prior_attempts: u32,
    ) -> Result<ReconcileOutcome> {
        let attempts = AtomicU32::new(prior_attempts);
        let counter = &attempts;
        let result = (move || async move {
            counter.fetch_add(1, Ordering::Relaxed);
            self.attempt(event).await
        })
        .retry(self.policy.backoff_after(prior_attempts))
        .when(SagaError::is_retryable)
        .notify(|err: &SagaError, delay: Duration| {
            debug!(error = %err, ?delay, "order not ready, retrying delivery event");
        })
        .await;

        self.settle(event, result, attempts.load(Ordering::Relaxed))
            .await
    }

    /// One pass through the guards, without retrying.
    pub async fn attempt(&self, event: &DeliveryStatusMessage) -> Result<ReconcileOutcome> {
        let order_number = &event.order_number;
        if self.orders.get(order_number).await?.is_none() {
            return Err(SagaError::NotReady(format!("order {order_number} not found")));
        }

        let status = order_status_for(event.status).ok_or_else(|| {
            SagaError::ForeignEvent(format!("delivery status {} does not drive orders", event.status))
        })?;

        let update = DeliveryUpdate {
            status,
            delivery_id: Some(event.delivery_id.clone()),
            note: event.note.clone(),
        };
        let (order, recorded) = self.orders.reconcile_delivery(order_number, &update).await?;

        let changed = recorded
            .iter()
            .any(|e| matches!(e, OrderEvent::StatusChanged(_)));
        let outcome = if changed {
            ReconcileOutcome::Applied(status)
        } else {
            ReconcileOutcome::Noted(status)
        };

        if changed && status == OrderStatus::Delivered {
            self.announce_completed(event, &order).await;
        }

        if let Some(owner) = order.owner_id() {
            let push = Notification::push(
                owner,
                order_number,
                format!("Order {order_number} is now {status}: {}", event.note),
            );
            self.notify(push).await;
            if changed && let Some(email) = status_email(owner, event, status) {
                self.notify(email).await;
            }
        }

        Ok(outcome)
    }

    async fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifier.send(notification).await {
            warn!(error = %err, "status notification not sent");
        }
    }

    async fn settle(
        &self,
        event: &DeliveryStatusMessage,
        result: Result<ReconcileOutcome>,
        attempts: u32,
    ) -> Result<ReconcileOutcome> {
        match result {
            Ok(outcome) => {
                metrics::counter!("reconciler_events_total", "outcome" => outcome.label())
                    .increment(1);
                info!(
                    order_number = %event.order_number,
                    status = %event.status,
                    outcome = outcome.label(),
                    "delivery event reconciled"
                );
                Ok(outcome)
            }
            Err(SagaError::ForeignEvent(reason)) => {
                metrics::counter!("reconciler_events_total", "outcome" => "ignored").increment(1);
                info!(
                    order_number = %event.order_number,
                    delivery_id = %event.delivery_id,
                    status = %event.status,
                    %reason,
                    "delivery event ignored"
                );
                Ok(ReconcileOutcome::Ignored(reason))
            }
            Err(err) if err.is_retryable() => {
                metrics::counter!("reconciler_events_total", "outcome" => "abandoned").increment(1);
                metrics::counter!("reconciler_abandoned_total").increment(1);
                error!(
                    order_number = %event.order_number,
                    delivery_id = %event.delivery_id,
                    status = %event.status,
                    attempts,
                    error = %err,
                    "delivery event abandoned"
                );
                self.abandoned.lock().await.push(AbandonedEvent {
                    event: event.clone(),
                    attempts,
                    reason: err.to_string(),
                    abandoned_at: Utc::now(),
                });
                Err(err)
            }
            Err(err) => {
                metrics::counter!("reconciler_events_total", "outcome" => "failed").increment(1);
                error!(
                    order_number = %event.order_number,
                    status = %event.status,
                    error = %err,
                    "delivery event failed"
                );
                Err(err)
            }
        }
    }

    async fn announce_completed(&self, event: &DeliveryStatusMessage, order: &domain::Order) {
        let Some(owner) = order.owner_id() else {
            return;
        };
        let payload = OrderMessage {
            order_number: event.order_number.clone(),
            owner_id: owner.clone(),
            status: OrderStatus::Delivered.as_str().to_string(),
            total: order.total(),
            note: format!("Delivered by delivery {}", event.delivery_id),
            timestamp: Utc::now(),
        };
        let published = match Message::new(topics::ORDER_COMPLETED, &payload) {
            Ok(message) => self.publisher.publish(message).await,
            Err(err) => Err(err),
        };
        if let Err(err) = published {
            warn!(error = %err, "order completion not published");
        }
    }
}

/// Email sent when a delivery moves the order to `status`, if any.
fn status_email(
    owner: &CustomerId,
    event: &DeliveryStatusMessage,
    status: OrderStatus,
) -> Option<Notification> {
    let order_number = &event.order_number;
    let (kind, message) = match status {
        OrderStatus::PickedUp | OrderStatus::InTransit | OrderStatus::Delivered => (
            NotificationKind::ShippingUpdate,
            format!(
                "Shipping update for order {order_number}: {status} (delivery {})",
                event.delivery_id
            ),
        ),
        OrderStatus::Lost => (
            NotificationKind::PackageLost,
            format!(
                "The parcel for order {order_number} was lost in transit: {}. A refund is on its way.",
                event.note
            ),
        ),
        _ => return None,
    };
    Some(Notification::email(kind, owner, order_number, message))
}

/// Events are handled in queue order. An event whose order is missing is
/// handed to a background task for its retries, so it never holds up the
/// events behind it.
#[async_trait]
impl<S, N> MessageHandler for DeliveryStatusReconciler<S, N>
where
    S: EventStore + 'static,
    N: NotificationService + 'static,
{
    async fn handle(&self, message: Message) {
        let event: DeliveryStatusMessage = match message.decode() {
            Ok(event) => event,
            Err(err) => {
                warn!(message_id = %message.message_id, error = %err, "undecodable delivery event");
                return;
            }
        };

        match self.attempt(&event).await {
            Err(err) if err.is_retryable() && self.policy.remaining_after(1) > 0 => {
                debug!(order_number = %event.order_number, "order not ready, retrying in background");
                let reconciler = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(reconciler.policy.delay_before_retry(0)).await;
                    let _ = reconciler.reconcile_with_retry(&event, 1).await;
                });
            }
            result => {
                let _ = self.settle(&event, result, 1).await;
            }
        }
    }
}
