//! Shared value types for the order fulfillment platform.

pub mod address;
pub mod ids;
pub mod money;

pub use address::Address;
pub use ids::{CustomerId, OrderNumber, ProductId, short_code};
pub use money::Money;
