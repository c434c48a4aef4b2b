//! Shipping collaborator and its adapter for the delivery lifecycle.

use async_trait::async_trait;
use common::{Address, CustomerId, OrderNumber};
use delivery::{DeliveryRequest, DeliveryService};

use crate::error::SagaError;

/// What the shipping service needs to know about an order.
#[derive(Debug, Clone)]
pub struct ShipmentRequest {
    pub order_number: OrderNumber,
    pub owner_id: CustomerId,
    pub shipping_address: Address,
}

/// A delivery created for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentResult {
    pub delivery_id: String,
    pub tracking_number: String,
}

#[async_trait]
pub trait ShippingService: Send + Sync {
    /// Requests a delivery for the order. Asking twice returns the same delivery.
    async fn create_delivery(&self, request: ShipmentRequest) -> Result<ShipmentResult, SagaError>;
}

#[async_trait]
impl ShippingService for DeliveryService {
    async fn create_delivery(&self, request: ShipmentRequest) -> Result<ShipmentResult, SagaError> {
        let delivery = self
            .create(DeliveryRequest {
                order_number: request.order_number,
                owner_id: request.owner_id,
                shipping_address: request.shipping_address,
                carrier: None,
                warehouse_id: None,
                notes: None,
            })
            .await?;
        Ok(ShipmentResult {
            delivery_id: delivery.id,
            tracking_number: delivery.tracking_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use delivery::{DeliveryConfig, LossProbability};
    use messaging::InMemoryBroker;

    fn request(order: &str) -> ShipmentRequest {
        ShipmentRequest {
            order_number: OrderNumber::new(order),
            owner_id: CustomerId::new("alice"),
            shipping_address: Address::new("1 Main St", "Sydney", "NSW", "2000", "Australia"),
        }
    }

    #[tokio::test]
    async fn one_delivery_per_order() {
        let service = DeliveryService::new(
            DeliveryConfig::default(),
            LossProbability::default(),
            Arc::new(InMemoryBroker::new()),
        );

        let first = service.create_delivery(request("ORD-1")).await.unwrap();
        let second = service.create_delivery(request("ORD-1")).await.unwrap();

        assert!(first.delivery_id.starts_with("DEL-"));
        assert_eq!(first, second);
    }
}
