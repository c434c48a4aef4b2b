//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use commands::{DeliveryUpdate, PlaceOrder};
pub use events::{
    DeliveryRequestedData, OrderCancelledData, OrderEvent, OrderPlacedData, PaymentFailedData,
    PaymentRefundedData, PaymentStartedData, PaymentSucceededData, StatusChangedData, StatusNotedData,
};
pub use service::OrderService;
pub use state::{OrderStatus, PaymentStatus};
pub use value_objects::{HistoryEntry, OrderLine};

use common::Money;
use thiserror::Error;

/// Reasons the order aggregate rejects a command.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Order has no items")]
    NoLines,

    #[error("Invalid quantity for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: String },

    #[error("Invalid price for product {product_id} (must be greater than 0)")]
    InvalidPrice { product_id: String },

    #[error("Order total {actual} does not match line totals {expected}")]
    TotalMismatch { expected: Money, actual: Money },

    #[error("Shipping address is incomplete")]
    UndeliverableAddress,

    #[error("Cannot {action} while order is {status}")]
    InvalidTransition {
        status: OrderStatus,
        action: &'static str,
    },

    #[error("Order does not belong to the caller")]
    NotOwner,

    #[error("Order is already cancelled or refunded")]
    AlreadyCancelled,

    #[error("Order has already been delivered")]
    AlreadyDelivered,

    /// A charge for the order is still running.
    #[error("Payment for the order is in progress")]
    PaymentInProgress,

    /// The order reached a final outcome; delivery updates no longer apply.
    #[error("Order is in terminal status {status}")]
    TerminalOrder { status: OrderStatus },

    /// The update names a different delivery than the one bound to the order.
    #[error("Delivery {received} does not match bound delivery {bound}")]
    DeliveryMismatch { bound: String, received: String },

    #[error("Nothing to refund (payment status {payment_status})")]
    NothingToRefund { payment_status: PaymentStatus },
}
