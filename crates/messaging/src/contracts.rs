//! Payloads exchanged between components, and their routing keys.
//!
//! Every payload carries the identifiers it concerns, a status, a free-text
//! note and a timestamp.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderNumber, ProductId};
use serde::{Deserialize, Serialize};

/// Routing keys and binding patterns.
pub mod topics {
    pub const ORDER_CREATED: &str = "order.created";
    pub const ORDER_PAID: &str = "order.paid";
    pub const ORDER_CANCELLED: &str = "order.cancelled";
    pub const ORDER_COMPLETED: &str = "order.completed";

    pub const STOCK_RESERVED: &str = "warehouse.stock.reserved";
    pub const STOCK_INSUFFICIENT: &str = "warehouse.stock.insufficient";
    pub const STOCK_DEDUCTED: &str = "warehouse.stock.deducted";

    pub const DELIVERY_STATUS_ALL: &str = "delivery.status.#";
    pub const DELIVERY_LOST: &str = "delivery.status.lost";
    pub const DELIVERY_FAILED: &str = "delivery.status.failed";

    pub const PAYMENT_SUCCESS: &str = "bank.payment.success";
    pub const PAYMENT_FAILURE: &str = "bank.payment.failure";
    pub const REFUND_SUCCESS: &str = "bank.refund.success";
}

/// Order lifecycle notice published by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderMessage {
    pub order_number: OrderNumber,
    pub owner_id: CustomerId,
    /// Order status at publication, e.g. `PAID`.
    pub status: String,
    pub total: Money,
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

/// Stock movement notice published by the inventory engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMessage {
    pub order_number: OrderNumber,
    pub product_id: ProductId,
    pub warehouse_id: Option<String>,
    pub reservation_id: Option<String>,
    pub quantity: u32,
    /// `RESERVED`, `INSUFFICIENT` or `DEDUCTED`.
    pub status: String,
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

/// Status carried by a delivery event.
///
/// `Created` announces a new delivery record; the rest mirror the delivery
/// state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryEventStatus {
    Created,
    PendingPickup,
    PickedUp,
    InTransit,
    Delivered,
    Lost,
    Failed,
    Cancelled,
}

impl DeliveryEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryEventStatus::Created => "CREATED",
            DeliveryEventStatus::PendingPickup => "PENDING_PICKUP",
            DeliveryEventStatus::PickedUp => "PICKED_UP",
            DeliveryEventStatus::InTransit => "IN_TRANSIT",
            DeliveryEventStatus::Delivered => "DELIVERED",
            DeliveryEventStatus::Lost => "LOST",
            DeliveryEventStatus::Failed => "FAILED",
            DeliveryEventStatus::Cancelled => "CANCELLED",
        }
    }

    /// Routing key for this status: `delivery.status.<lowercased status>`.
    pub fn routing_key(&self) -> String {
        format!("delivery.status.{}", self.as_str().to_lowercase())
    }
}

impl std::fmt::Display for DeliveryEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status change published by the delivery lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryStatusMessage {
    pub delivery_id: String,
    pub order_number: OrderNumber,
    pub status: DeliveryEventStatus,
    pub tracking_number: Option<String>,
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

/// Money movement notice published by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankMessage {
    pub transaction_id: String,
    pub order_number: OrderNumber,
    pub owner_id: CustomerId,
    pub amount: Money,
    pub currency: String,
    /// Transaction status, `SUCCESS` or `FAILED`.
    pub status: String,
    /// Original payment for refunds.
    pub original_transaction_id: Option<String>,
    pub note: String,
    pub timestamp: DateTime<Utc>,
}
