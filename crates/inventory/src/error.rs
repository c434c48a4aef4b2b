use common::{OrderNumber, ProductId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    /// No single warehouse holds enough of the product.
    #[error("Insufficient stock for product {product_id}: requested {requested}")]
    InsufficientStock { product_id: ProductId, requested: u32 },

    #[error("Quantity must be positive for product {0}")]
    InvalidQuantity(ProductId),

    #[error("Unknown warehouse: {0}")]
    UnknownWarehouse(String),

    #[error("Warehouse already exists: {0}")]
    WarehouseExists(String),

    #[error("No reservations for order {0}")]
    NoReservations(OrderNumber),

    #[error("Messaging error: {0}")]
    Messaging(#[from] messaging::MessagingError),
}

impl InventoryError {
    /// Product the failure concerns, if any.
    pub fn product_id(&self) -> Option<&ProductId> {
        match self {
            InventoryError::InsufficientStock { product_id, .. }
            | InventoryError::InvalidQuantity(product_id) => Some(product_id),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;
