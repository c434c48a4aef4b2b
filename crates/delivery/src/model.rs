use chrono::{DateTime, Utc};
use common::{Address, CustomerId, OrderNumber, short_code};
use messaging::DeliveryEventStatus;
use serde::{Deserialize, Serialize};

/// Where a shipment is in its lifecycle.
///
/// Statuses only move forward along
/// `PENDING_PICKUP -> PICKED_UP -> IN_TRANSIT -> DELIVERED | LOST`.
/// `FAILED` and `CANCELLED` can be reached from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    PendingPickup,
    PickedUp,
    InTransit,
    Delivered,
    Lost,
    Failed,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        self.event_status().as_str()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered
                | DeliveryStatus::Lost
                | DeliveryStatus::Failed
                | DeliveryStatus::Cancelled
        )
    }

    /// Position along the forward path; `None` for the off-path failures.
    fn rank(&self) -> Option<u8> {
        match self {
            DeliveryStatus::PendingPickup => Some(0),
            DeliveryStatus::PickedUp => Some(1),
            DeliveryStatus::InTransit => Some(2),
            DeliveryStatus::Delivered | DeliveryStatus::Lost => Some(3),
            DeliveryStatus::Failed | DeliveryStatus::Cancelled => None,
        }
    }

    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }

    pub fn event_status(&self) -> DeliveryEventStatus {
        match self {
            DeliveryStatus::PendingPickup => DeliveryEventStatus::PendingPickup,
            DeliveryStatus::PickedUp => DeliveryEventStatus::PickedUp,
            DeliveryStatus::InTransit => DeliveryEventStatus::InTransit,
            DeliveryStatus::Delivered => DeliveryEventStatus::Delivered,
            DeliveryStatus::Lost => DeliveryEventStatus::Lost,
            DeliveryStatus::Failed => DeliveryEventStatus::Failed,
            DeliveryStatus::Cancelled => DeliveryEventStatus::Cancelled,
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: DeliveryStatus,
    pub note: String,
    pub recorded_at: DateTime<Utc>,
}

/// A shipment for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: String,
    pub order_number: OrderNumber,
    pub owner_id: CustomerId,
    pub status: DeliveryStatus,
    pub tracking_number: String,
    pub carrier: String,
    pub shipping_address: Address,
    pub warehouse_id: Option<String>,
    pub estimated_pickup: DateTime<Utc>,
    pub estimated_delivery: DateTime<Utc>,
    pub actual_pickup: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub history: Vec<StatusHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Moves to `next`, stamping times and appending history.
    ///
    /// Callers check [`DeliveryStatus::can_transition_to`] first.
    pub(crate) fn apply(&mut self, next: DeliveryStatus, note: &str, at: DateTime<Utc>) {
        self.status = next;
        match next {
            DeliveryStatus::PickedUp => self.actual_pickup = Some(at),
            DeliveryStatus::Delivered => self.actual_delivery = Some(at),
            _ => {}
        }
        self.history.push(StatusHistoryEntry {
            status: next,
            note: note.to_string(),
            recorded_at: at,
        });
        self.updated_at = at;
    }
}

/// Request to ship an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub order_number: OrderNumber,
    pub owner_id: CustomerId,
    pub shipping_address: Address,
    pub carrier: Option<String>,
    pub warehouse_id: Option<String>,
    pub notes: Option<String>,
}

/// `DEL-<8 hex>`.
pub(crate) fn generate_delivery_id() -> String {
    format!("DEL-{}", short_code())
}

/// `DEL-<epoch millis>`.
pub(crate) fn generate_tracking_number(now: DateTime<Utc>) -> String {
    format!("DEL-{}", now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeliveryStatus::*;

    #[test]
    fn forward_only_with_absorbing_failures() {
        assert!(PendingPickup.can_transition_to(PickedUp));
        assert!(PendingPickup.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(Delivered));
        assert!(InTransit.can_transition_to(Lost));
        assert!(!InTransit.can_transition_to(PickedUp));
        assert!(!PickedUp.can_transition_to(PickedUp));

        for from in [PendingPickup, PickedUp, InTransit] {
            assert!(from.can_transition_to(Failed));
            assert!(from.can_transition_to(Cancelled));
        }
        for terminal in [Delivered, Lost, Failed, Cancelled] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(Failed));
            assert!(!terminal.can_transition_to(Cancelled));
        }
    }

    #[test]
    fn wire_names() {
        assert_eq!(PendingPickup.as_str(), "PENDING_PICKUP");
        assert_eq!(
            serde_json::to_value(InTransit).unwrap(),
            serde_json::json!("IN_TRANSIT")
        );
        assert_eq!(Lost.event_status().routing_key(), "delivery.status.lost");
    }
}
