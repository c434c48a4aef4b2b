use common::OrderNumber;
use thiserror::Error;

use crate::DeliveryStatus;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Delivery not found: {0}")]
    NotFound(String),

    #[error("No delivery for order {0}")]
    NoDeliveryForOrder(OrderNumber),

    #[error("Delivery {delivery_id} cannot move from {from} to {to}")]
    InvalidTransition {
        delivery_id: String,
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("Loss probability must be between 0 and 1, got {0}")]
    InvalidProbability(f64),

    #[error("Shipping address is not deliverable")]
    UndeliverableAddress,

    #[error("Messaging error: {0}")]
    Messaging(#[from] messaging::MessagingError),
}

pub type Result<T> = std::result::Result<T, DeliveryError>;
