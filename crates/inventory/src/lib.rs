//! Inventory reservation engine.
//!
//! Stock is counted per (warehouse, product). An order first reserves units,
//! each line held whole by the first warehouse that can cover it, then either
//! confirms the reservations once paid or releases them.

pub mod engine;
pub mod error;
pub mod listener;
pub mod model;

pub use engine::{Inventory, InventoryConfig};
pub use error::{InventoryError, Result};
pub use listener::{
    ORDER_CANCELLED_BINDINGS, ORDER_CANCELLED_QUEUE, OrderCancellationListener,
    spawn_expiry_sweep,
};
pub use model::{
    AuditEntry, Reservation, ReservationLine, ReservationStatus, StockAction, StockLevel,
    Warehouse,
};
