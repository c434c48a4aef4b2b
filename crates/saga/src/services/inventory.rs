//! Inventory collaborator and its adapter for the reservation engine.

use async_trait::async_trait;
use common::{OrderNumber, ProductId};
use inventory::{Inventory, ReservationLine};

use crate::error::SagaError;

/// An item to hold stock for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
}

/// Stock lookups and reservations.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Fails with `InsufficientResource` when any item could not be reserved now.
    async fn check_stock(&self, items: &[ReservationItem]) -> Result<(), SagaError>;

    /// Reserves every item for the order, or none of them.
    ///
    /// Returns the reservation ids.
    async fn reserve(
        &self,
        order_number: &OrderNumber,
        items: &[ReservationItem],
    ) -> Result<Vec<String>, SagaError>;

    /// Deducts the order's reservations from stock.
    async fn confirm(&self, order_number: &OrderNumber) -> Result<(), SagaError>;

    /// Returns the order's pending reservations to available stock.
    async fn release(&self, order_number: &OrderNumber) -> Result<(), SagaError>;
}

fn lines(items: &[ReservationItem]) -> Vec<ReservationLine> {
    items
        .iter()
        .map(|item| ReservationLine::new(item.product_id.clone(), item.quantity))
        .collect()
}

#[async_trait]
impl InventoryService for Inventory {
    async fn check_stock(&self, items: &[ReservationItem]) -> Result<(), SagaError> {
        self.check(&lines(items)).await?;
        Ok(())
    }

    async fn reserve(
        &self,
        order_number: &OrderNumber,
        items: &[ReservationItem],
    ) -> Result<Vec<String>, SagaError> {
        let reservations = Inventory::reserve(self, order_number, &lines(items)).await?;
        Ok(reservations.into_iter().map(|r| r.id).collect())
    }

    async fn confirm(&self, order_number: &OrderNumber) -> Result<(), SagaError> {
        Inventory::confirm(self, order_number).await?;
        Ok(())
    }

    async fn release(&self, order_number: &OrderNumber) -> Result<(), SagaError> {
        Inventory::release(self, order_number).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use inventory::{InventoryConfig, Warehouse};
    use messaging::InMemoryBroker;

    fn item(product: &str, quantity: u32) -> ReservationItem {
        ReservationItem {
            product_id: ProductId::new(product),
            product_name: product.to_string(),
            quantity,
        }
    }

    async fn stocked() -> Inventory {
        let inventory = Inventory::new(InventoryConfig::default(), Arc::new(InMemoryBroker::new()));
        inventory
            .add_warehouse(Warehouse::new("WH-1", "Main", "Sydney"))
            .await
            .unwrap();
        inventory
            .restock("WH-1", &ProductId::new("P-1"), 5)
            .await
            .unwrap();
        inventory
    }

    #[tokio::test]
    async fn shortfall_is_an_insufficient_resource() {
        let inventory = stocked().await;

        inventory.check_stock(&[item("P-1", 5)]).await.unwrap();
        let err = inventory.check_stock(&[item("P-1", 6)]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientResource);
        assert!(err.to_string().contains("P-1"));
    }

    #[tokio::test]
    async fn reserve_then_release_restores_stock() {
        let inventory = stocked().await;
        let order = OrderNumber::new("ORD-1");

        let ids = InventoryService::reserve(&inventory, &order, &[item("P-1", 2)])
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(inventory.available(&ProductId::new("P-1")).await, 3);

        InventoryService::release(&inventory, &order).await.unwrap();
        InventoryService::release(&inventory, &order).await.unwrap();
        assert_eq!(inventory.available(&ProductId::new("P-1")).await, 5);
    }
}
