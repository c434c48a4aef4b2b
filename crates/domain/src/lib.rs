//! Domain layer for the order fulfillment platform.
//!
//! This crate provides:
//! - `Aggregate`/`DomainEvent` traits and the `CommandHandler` that persists
//!   aggregates through the event store
//! - the event-sourced `Order` aggregate whose stream is its audit trail
//! - read access to the product catalog

pub mod aggregate;
pub mod catalog;
pub mod command;
pub mod error;
pub mod order;

pub use aggregate::{Aggregate, DomainEvent};
pub use catalog::{Catalog, InMemoryCatalog, Product};
pub use command::{CommandHandler, CommandResult};
pub use error::DomainError;
pub use order::{
    DeliveryUpdate, HistoryEntry, Order, OrderError, OrderEvent, OrderLine, OrderService,
    OrderStatus, PaymentStatus, PlaceOrder,
};
