use chrono::{DateTime, Utc};
use common::{OrderNumber, ProductId, short_code};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: String,
    pub name: String,
    pub location: String,
}

impl Warehouse {
    pub fn new(id: impl Into<String>, name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: location.into(),
        }
    }
}

/// Stock of one product in one warehouse.
///
/// At rest `available + reserved == total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub warehouse_id: String,
    pub product_id: ProductId,
    pub available: u32,
    pub reserved: u32,
    pub total: u32,
}

impl StockLevel {
    pub(crate) fn empty(warehouse_id: &str, product_id: &ProductId) -> Self {
        Self {
            warehouse_id: warehouse_id.to_string(),
            product_id: product_id.clone(),
            available: 0,
            reserved: 0,
            total: 0,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.available + self.reserved == self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// Units of a product held in one warehouse for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub order_number: OrderNumber,
    pub warehouse_id: String,
    pub product_id: ProductId,
    pub quantity: u32,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_pending(&self) -> bool {
        self.status == ReservationStatus::Pending
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.expires_at <= now
    }
}

/// `RES-<8 hex>`.
pub(crate) fn generate_reservation_id() -> String {
    format!("RES-{}", short_code())
}

/// One line of a reservation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl ReservationLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockAction {
    Restock,
    Reserve,
    Deduct,
    Release,
}

/// A line of the stock movement journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub warehouse_id: String,
    pub product_id: ProductId,
    pub action: StockAction,
    pub quantity: u32,
    /// Reservation or order the movement belongs to.
    pub reference: String,
    pub note: String,
    pub recorded_at: DateTime<Utc>,
}
