//! Delivery lifecycle: one shipment per order, advanced over time by a
//! scanner, with parcels in transit occasionally lost.

pub mod engine;
pub mod error;
pub mod listener;
pub mod model;
pub mod probability;
pub mod scanner;

pub use engine::{AUTOMATIC_NOTE, DeliveryConfig, DeliveryService};
pub use error::{DeliveryError, Result};
pub use listener::{ORDER_CANCELLED_BINDINGS, ORDER_CANCELLED_QUEUE, OrderCancellationListener};
pub use model::{Delivery, DeliveryRequest, DeliveryStatus, StatusHistoryEntry};
pub use probability::LossProbability;
pub use scanner::spawn_scanner;
