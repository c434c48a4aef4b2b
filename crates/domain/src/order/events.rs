//! Order domain events.

use chrono::{DateTime, Utc};
use common::{Address, CustomerId, Money, OrderNumber};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{OrderLine, OrderStatus};

/// Events recorded on an order stream.
///
/// Every event that touches the status also produces one audit-trail row
/// when applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderPlaced(OrderPlacedData),
    /// The saga is about to charge the customer.
    PaymentStarted(PaymentStartedData),
    PaymentSucceeded(PaymentSucceededData),
    PaymentFailed(PaymentFailedData),
    DeliveryRequested(DeliveryRequestedData),
    /// Delivery-driven status change.
    StatusChanged(StatusChangedData),
    /// Audit row without a status change (duplicate delivery event).
    StatusNoted(StatusNotedData),
    OrderCancelled(OrderCancelledData),
    PaymentRefunded(PaymentRefundedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::PaymentStarted(_) => "PaymentStarted",
            OrderEvent::PaymentSucceeded(_) => "PaymentSucceeded",
            OrderEvent::PaymentFailed(_) => "PaymentFailed",
            OrderEvent::DeliveryRequested(_) => "DeliveryRequested",
            OrderEvent::StatusChanged(_) => "StatusChanged",
            OrderEvent::StatusNoted(_) => "StatusNoted",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::PaymentRefunded(_) => "PaymentRefunded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_number: OrderNumber,
    pub owner_id: CustomerId,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method: String,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStartedData {
    pub amount: Money,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSucceededData {
    /// Ledger transaction id, or a `SIM-` reference for simulated payments.
    pub transaction_id: String,
    pub simulated: bool,
    pub note: String,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequestedData {
    pub delivery_id: String,
    pub tracking_number: Option<String>,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Delivery id bound by this change, when the order had none.
    pub delivery_id: Option<String>,
    pub note: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusNotedData {
    pub status: OrderStatus,
    pub note: String,
    pub noted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub reason: String,
    pub cancelled_by: CustomerId,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefundedData {
    pub refund_transaction_id: String,
    pub note: String,
    pub refunded_at: DateTime<Utc>,
}
