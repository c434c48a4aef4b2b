//! Order and payment status.

use serde::{Deserialize, Serialize};

/// Customer-facing status of an order.
///
/// ```text
/// Pending ──► Paid ──► Processing ──► PendingPickup ──► PickedUp ──► InTransit ──► Delivered
///    │                                                                        └──► Lost
///    └──► PaymentFailed
/// any status except Delivered ──► Cancelled
/// ```
///
/// Statuses from `Processing` onward are driven by delivery events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    PaymentFailed,
    Paid,
    Processing,
    PendingPickup,
    PickedUp,
    InTransit,
    Delivered,
    Lost,
    Cancelled,
}

impl OrderStatus {
    /// Returns true once no delivery event may change the status any more.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Lost)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::PaymentFailed => "PAYMENT_FAILED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::PendingPickup => "PENDING_PICKUP",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Lost => "LOST",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the money side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    /// A charge is under way; the order cannot be cancelled until it settles.
    InProgress,
    /// Settled by a real ledger transfer.
    Paid,
    /// Forced success from the demo payment policy; no money moved.
    Simulated,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Returns true if the order has a paid outcome, real or simulated.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Simulated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::InProgress => "IN_PROGRESS",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Simulated => "SIMULATED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Lost.is_terminal());
        assert!(!OrderStatus::Delivered.is_terminal());
        assert!(!OrderStatus::InTransit.is_terminal());
    }

    #[test]
    fn wire_names_match_display() {
        for status in [
            OrderStatus::PaymentFailed,
            OrderStatus::PendingPickup,
            OrderStatus::InTransit,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Simulated).unwrap(),
            "\"SIMULATED\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
    }

    #[test]
    fn settled_payment_statuses() {
        assert!(PaymentStatus::Paid.is_settled());
        assert!(PaymentStatus::Simulated.is_settled());
        assert!(!PaymentStatus::Refunded.is_settled());
        assert!(!PaymentStatus::Failed.is_settled());
        assert!(!PaymentStatus::InProgress.is_settled());
    }
}
